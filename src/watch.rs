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

//! Four-line status block redrawn in place on the terminal.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;

use crate::discovery::ThermalSlot;
use crate::snapshot::SensorSnapshot;
use crate::sysfs::AttrValue;

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(200);
const BLOCK_LINES: u16 = 4;

/// Milli-degrees to degrees with one decimal, or `NA`.
pub fn fmt_temp_c(raw: &AttrValue) -> String {
    match raw.as_deref().and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(mc) => format!("{:.1}", mc as f64 / 1000.0),
        None => "NA".to_string(),
    }
}

pub fn status_lines(snap: &SensorSnapshot) -> [String; 4] {
    let c = &snap.cpu;
    let g = &snap.gpu;
    let f = &snap.fan;
    let temps: Vec<String> = ThermalSlot::ALL
        .iter()
        .map(|s| format!("{} {}C", s.name().to_uppercase(), fmt_temp_c(snap.temp(*s))))
        .collect();
    [
        format!(
            "CPUfreq: cur={} min={} max={} gov={}",
            c.cur.or("NA"), c.min.or("NA"), c.max.or("NA"), c.governor.or("NA")
        ),
        format!(
            "GPUfreq: cur={} min={} max={} gov={}",
            g.cur.or("NA"), g.min.or("NA"), g.max.or("NA"), g.governor.or("NA")
        ),
        format!(
            "FAN: cur_state={}/{} pwm={}",
            f.cur_state.or("NA"), f.max_state.or("NA"), f.pwm.or("NA")
        ),
        format!("Temps: {}", temps.join(" | ")),
    ]
}

/// Throttled renderer. Owned by the sampler; nothing else writes to `out`.
pub struct LiveView<W: Write> {
    out: W,
    min_interval_ns: i64,
    last_render_ns: Option<i64>,
    drawn: bool,
}

impl<W: Write> LiveView<W> {
    pub fn new(out: W, min_interval: Duration) -> Self {
        let min_interval = if min_interval.is_zero() { DEFAULT_WATCH_INTERVAL } else { min_interval };
        Self {
            out,
            min_interval_ns: min_interval.as_nanos().min(i64::MAX as u128) as i64,
            last_render_ns: None,
            drawn: false,
        }
    }

    /// Redraw if the minimum interval has passed since the last redraw.
    /// Returns whether anything was drawn.
    pub fn maybe_render(&mut self, snap: &SensorSnapshot) -> io::Result<bool> {
        if let Some(last) = self.last_render_ns {
            if snap.ts_ns.saturating_sub(last) < self.min_interval_ns {
                return Ok(false);
            }
        }
        self.last_render_ns = Some(snap.ts_ns);
        self.render(snap)?;
        Ok(true)
    }

    pub fn render(&mut self, snap: &SensorSnapshot) -> io::Result<()> {
        if self.drawn {
            queue!(self.out, MoveUp(BLOCK_LINES))?;
        }
        for line in status_lines(snap) {
            queue!(
                self.out,
                Clear(ClearType::CurrentLine),
                MoveToColumn(0),
                Print(line),
                Print("\n")
            )?;
        }
        self.drawn = true;
        self.out.flush()
    }

    /// Leave the cursor below the block.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.drawn {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
