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

//! Pin and unlock as ordered lists of attribute writes.
//!
//! A plan is always printed in full. It is only carried out when the caller
//! passes `apply`; otherwise nothing is written.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::warn;

use crate::config::PlatformProfile;
use crate::discovery::{DeviceRole, Devices, GPU_AVAILABLE_FREQS};
use crate::error::{DvfsError, Result};
use crate::logger;
use crate::sysfs::{AttrIo, AttrValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEntry {
    Write {
        path: PathBuf,
        value: String,
        /// Where the value came from, when it was derived.
        source: Option<String>,
    },
    Skip {
        path: PathBuf,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    pub entries: Vec<PlanEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub applied: bool,
    pub results: Vec<(PathBuf, bool)>,
}

impl WriteOutcome {
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|(_, ok)| *ok)
    }

    /// 0 on success or dry-run, 4 if any write failed.
    pub fn exit_code(&self) -> i32 {
        if self.all_ok() { 0 } else { 4 }
    }

    pub fn result_for(&self, path: &Path) -> Option<bool> {
        self.results.iter().find(|(p, _)| p == path).map(|(_, ok)| *ok)
    }
}

impl WritePlan {
    pub fn write(&mut self, path: PathBuf, value: impl Into<String>, source: Option<&str>) {
        self.entries.push(PlanEntry::Write {
            path,
            value: value.into(),
            source: source.map(str::to_string),
        });
    }

    pub fn skip(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.entries.push(PlanEntry::Skip { path, reason: reason.into() });
    }

    pub fn writes(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Write { path, value, .. } => Some((path.as_path(), value.as_str())),
            PlanEntry::Skip { .. } => None,
        })
    }

    pub fn report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Will write:")?;
        for e in &self.entries {
            match e {
                PlanEntry::Write { path, value, source: Some(src) } => {
                    writeln!(out, "  {} = {} ({})", path.display(), value, src)?
                }
                PlanEntry::Write { path, value, source: None } => {
                    writeln!(out, "  {} = {}", path.display(), value)?
                }
                PlanEntry::Skip { path, reason } => {
                    writeln!(out, "  {} = <skip> ({})", path.display(), reason)?
                }
            }
        }
        Ok(())
    }

    /// Carry out the plan in order when `apply` is set. Each write is tried
    /// once; a failure is recorded and the rest still run.
    pub fn execute<A: AttrIo + ?Sized>(&self, io: &A, apply: bool) -> WriteOutcome {
        if !apply {
            return WriteOutcome::default();
        }
        let mut results = Vec::new();
        for (path, value) in self.writes() {
            let ok = io.write_text(path, value);
            if !ok {
                warn!("write of {:?} to {} failed", value, path.display());
            }
            logger::log_event(
                "sysfs_write",
                json!({ "path": path.display().to_string(), "value": value, "ok": ok }),
            );
            results.push((path.to_path_buf(), ok));
        }
        WriteOutcome { applied: true, results }
    }
}

/// First and last whitespace-separated token of a frequency listing.
pub fn listing_bounds(listing: &str) -> Option<(String, String)> {
    let mut tokens = listing.split_whitespace();
    let first = tokens.next()?;
    let last = tokens.last().unwrap_or(first);
    Some((first.to_string(), last.to_string()))
}

/// Pin CPU and/or GPU to one operating point by writing the same value to
/// the min and max attributes. Only the domains being pinned must have been
/// discovered.
pub fn plan_set(devices: &Devices, cpu_khz: Option<u64>, gpu_hz: Option<u64>) -> Result<WritePlan> {
    if cpu_khz.is_none() && gpu_hz.is_none() {
        return Err(DvfsError::Config("set needs --cpu_khz and/or --gpu_hz".to_string()));
    }
    let mut plan = WritePlan::default();
    if let Some(khz) = cpu_khz {
        let cpu = devices.require(DeviceRole::CpuFreq)?;
        plan.write(cpu.join("scaling_min_freq"), khz.to_string(), None);
        plan.write(cpu.join("scaling_max_freq"), khz.to_string(), None);
    }
    if let Some(hz) = gpu_hz {
        let gpu = devices.require(DeviceRole::GpuFreq)?;
        plan.write(gpu.join("min_freq"), hz.to_string(), None);
        plan.write(gpu.join("max_freq"), hz.to_string(), None);
    }
    Ok(plan)
}

fn present(v: AttrValue) -> Option<String> {
    v.into_option().filter(|s| !s.is_empty())
}

/// Restore the platform's full frequency range and default governors.
pub fn plan_unlock<A: AttrIo + ?Sized>(
    devices: &Devices,
    profile: &PlatformProfile,
    io: &A,
) -> Result<WritePlan> {
    let cpu = devices.require(DeviceRole::CpuFreq)?;
    let gpu = devices.require(DeviceRole::GpuFreq)?;
    let mut plan = WritePlan::default();

    let cpu_listing = present(io.read_text(&cpu.join("scaling_available_frequencies")))
        .and_then(|s| listing_bounds(&s));
    let bounds = [
        ("scaling_min_freq", "cpuinfo_min_freq", cpu_listing.as_ref().map(|b| b.0.clone())),
        ("scaling_max_freq", "cpuinfo_max_freq", cpu_listing.as_ref().map(|b| b.1.clone())),
    ];
    for (target, capability, listed) in bounds {
        let path = cpu.join(target);
        if let Some(v) = present(io.read_text(&cpu.join(capability))) {
            plan.write(path, v, Some(capability));
        } else if let Some(v) = listed {
            plan.write(path, v, Some("scaling_available_frequencies"));
        } else {
            plan.skip(path, format!("{} missing", capability));
        }
    }

    let listing = present(io.read_text(&gpu.join(GPU_AVAILABLE_FREQS))).and_then(|s| listing_bounds(&s));
    let (gpu_min, gpu_max, source) = match listing {
        Some((lo, hi)) => (lo, hi, GPU_AVAILABLE_FREQS),
        None => (
            present(io.read_text(&gpu.join("min_freq")))
                .unwrap_or_else(|| profile.gpu_fallback_min_hz.to_string()),
            present(io.read_text(&gpu.join("max_freq")))
                .unwrap_or_else(|| profile.gpu_fallback_max_hz.to_string()),
            "current bounds or profile fallback",
        ),
    };
    plan.write(gpu.join("min_freq"), gpu_min, Some(source));
    plan.write(gpu.join("max_freq"), gpu_max, Some(source));

    let gov = gpu.join("governor");
    if io.exists(&gov) {
        plan.write(gov, profile.gpu_default_governor.clone(), None);
    } else {
        plan.skip(gov, "no governor file");
    }
    if let Some(name) = &profile.cpu_default_governor {
        let gov = cpu.join("scaling_governor");
        if io.exists(&gov) {
            plan.write(gov, name.clone(), None);
        } else {
            plan.skip(gov, "no governor file");
        }
    }
    Ok(plan)
}
