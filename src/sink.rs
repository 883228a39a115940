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

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::discovery::ThermalSlot;
use crate::error::{DvfsError, Result};
use crate::snapshot::SensorSnapshot;

pub const CSV_HEADER: &str = "ts_ns,dt_ns,\
cpu_khz,cpu_min_khz,cpu_max_khz,cpu_governor,\
gpu_hz,gpu_min_hz,gpu_max_hz,gpu_governor,\
fan_cur_state,fan_max_state,fan_pwm,\
temp_cpu_mC,temp_gpu_mC,temp_soc0_mC,temp_soc1_mC,temp_soc2_mC,temp_tj_mC";

/// Rows between explicit flushes.
pub const FLUSH_EVERY: u64 = 10;

/// Render one row. Absent values are empty fields; values never hold commas
/// so nothing is quoted.
pub fn format_row(snap: &SensorSnapshot, dt_ns: i64) -> String {
    let mut fields: Vec<&str> = Vec::with_capacity(17);
    for f in [&snap.cpu, &snap.gpu] {
        fields.extend([f.cur.or_empty(), f.min.or_empty(), f.max.or_empty(), f.governor.or_empty()]);
    }
    fields.extend([
        snap.fan.cur_state.or_empty(),
        snap.fan.max_state.or_empty(),
        snap.fan.pwm.or_empty(),
    ]);
    fields.extend(ThermalSlot::ALL.iter().map(|s| snap.temp(*s).or_empty()));
    format!("{},{},{}", snap.ts_ns, dt_ns, fields.join(","))
}

/// Append-only CSV writer for one run.
pub struct CsvSink<W: Write> {
    out: BufWriter<W>,
    rows: u64,
}

impl CsvSink<File> {
    /// Create (truncating) the output file and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let open_err = |source| DvfsError::SinkOpen { path: path.to_path_buf(), source };
        let f = File::create(path).map_err(open_err)?;
        CsvSink::new(f).map_err(open_err)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> io::Result<Self> {
        let mut out = BufWriter::new(inner);
        writeln!(out, "{}", CSV_HEADER)?;
        out.flush()?;
        Ok(Self { out, rows: 0 })
    }

    pub fn write_row(&mut self, snap: &SensorSnapshot, dt_ns: i64) -> io::Result<()> {
        writeln!(self.out, "{}", format_row(snap, dt_ns))?;
        self.rows += 1;
        if self.rows % FLUSH_EVERY == 0 {
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}
