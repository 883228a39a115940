/*
 * This file is part of dvfs-tool.
 *
 * Copyright (C) 2025 dvfs-tool contributors
 *
 * dvfs-tool is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * dvfs-tool is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with dvfs-tool. If not, see <https://www.gnu.org/licenses/>.
 */

//! Fixed-period sampling loop.
//!
//! Ticks follow an absolute schedule (`start + n * period`), so time spent
//! reading sysfs does not accumulate as drift. Cancellation is polled once
//! per tick boundary; a tick that has started always finishes its row.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info};

use crate::discovery::Devices;
use crate::error::{DvfsError, Result};
use crate::logger;
use crate::sink::CsvSink;
use crate::snapshot::SensorSnapshot;
use crate::sysfs::AttrIo;
use crate::watch::LiveView;

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Monotonic clock in nanoseconds (`CLOCK_MONOTONIC`).
pub fn monotonic_ns() -> i64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: clock_gettime only writes into the timespec we pass.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as i64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as i64)
}

/// Period from a user-supplied millisecond count; non-positive means default.
pub fn period_from_ms(ms: i64) -> Duration {
    if ms <= 0 {
        DEFAULT_PERIOD
    } else {
        Duration::from_millis(ms as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub period: Duration,
    /// Stop normally after this many samples.
    pub max_samples: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { period: DEFAULT_PERIOD, max_samples: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: u64,
    pub elapsed: Duration,
}

pub struct SampleScheduler<'a, A: AttrIo + ?Sized> {
    devices: &'a Devices,
    io: &'a A,
    config: SchedulerConfig,
    state: SchedulerState,
}

impl<'a, A: AttrIo + ?Sized> SampleScheduler<'a, A> {
    pub fn new(devices: &'a Devices, io: &'a A, config: SchedulerConfig) -> Self {
        let config = SchedulerConfig {
            period: if config.period.is_zero() { DEFAULT_PERIOD } else { config.period },
            ..config
        };
        Self { devices, io, config, state: SchedulerState::Idle }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn bound_reached(&self, samples: u64) -> bool {
        self.config.max_samples.is_some_and(|max| samples >= max)
    }

    /// Sample until `stop` is set, `max_samples` is reached, or the sink fails.
    ///
    /// Runs once: a scheduler that has left `Idle` refuses to start again.
    pub fn run<W: Write, V: Write>(
        &mut self,
        sink: &mut CsvSink<W>,
        mut view: Option<&mut LiveView<V>>,
        stop: &AtomicBool,
    ) -> Result<RunSummary> {
        if self.state != SchedulerState::Idle {
            return Err(DvfsError::NotIdle);
        }
        self.state = SchedulerState::Running;
        info!("sampling every {:?}", self.config.period);
        logger::log_event("log_start", json!({ "period_ms": self.config.period.as_millis() as u64 }));

        let started = Instant::now();
        let mut next = started;
        let mut prev_ts: Option<i64> = None;
        let mut samples: u64 = 0;

        let result = loop {
            if stop.load(Ordering::SeqCst) || self.bound_reached(samples) {
                break Ok(());
            }
            next += self.config.period;

            let ts = monotonic_ns();
            let dt = prev_ts.map_or(0, |p| ts - p);
            prev_ts = Some(ts);

            let snap = SensorSnapshot::capture(self.devices, self.io, ts);
            if let Err(e) = sink.write_row(&snap, dt) {
                break Err(DvfsError::SinkWrite(e));
            }
            samples += 1;

            if let Some(v) = view.as_deref_mut() {
                if let Err(e) = v.maybe_render(&snap) {
                    debug!("live view write failed: {}", e);
                }
            }

            if self.bound_reached(samples) {
                break Ok(());
            }
            thread::sleep(next.saturating_duration_since(Instant::now()));
        };

        self.state = SchedulerState::Stopped;
        let flushed = sink.flush();
        if let Some(v) = view {
            let _ = v.finish();
        }
        let summary = RunSummary { samples, elapsed: started.elapsed() };
        info!("sampling stopped after {} samples", samples);
        logger::log_event(
            "log_stop",
            json!({ "samples": samples, "ok": result.is_ok(), "elapsed_ms": summary.elapsed.as_millis() as u64 }),
        );
        result?;
        flushed.map_err(DvfsError::SinkWrite)?;
        Ok(summary)
    }
}
