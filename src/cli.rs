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

//! Command Line Interface

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dvfs-tool")]
#[command(version)]
#[command(about = "Jetson DVFS probe, pin/unlock and sysfs sampling logger")]
#[command(long_about = "Jetson DVFS probe, pin/unlock and sysfs sampling logger

Finds the CPU cpufreq policy, the GPU devfreq node, the pwm-fan cooling
device and the named thermal zones, then reads or pins them.

EXAMPLES:
    dvfs-tool probe
    dvfs-tool log --out run.csv --period_ms 50
    dvfs-tool log --watch --watch_ms 250
    sudo dvfs-tool set --cpu_khz 1344000 --gpu_hz 612000000 --apply
    sudo dvfs-tool unlock --apply

ENVIRONMENT VARIABLES:
    DVFS_LOG=debug         Diagnostic log filter (stderr)

FILES:
    ~/.config/dvfs-tool/profile.json      Platform profile
    /etc/dvfs-tool/profile.json           System-wide platform profile")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Platform profile JSON (roots and name keywords)
    #[arg(long, global = true, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Treat this directory as / for every sysfs path
    #[arg(long = "sysfs-root", global = true, value_name = "DIR")]
    pub sysfs_root: Option<PathBuf>,

    /// Append JSON event records (writes, run start/stop) to this file
    #[arg(long = "event-log", global = true, value_name = "PATH")]
    pub event_log: Option<PathBuf>,

    /// Debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show discovered directories and their raw attributes
    Probe,

    /// Sample every tracked attribute to CSV until Ctrl-C
    Log {
        /// Output CSV (truncated)
        #[arg(long, default_value = "run.csv")]
        out: PathBuf,

        /// Sampling period in milliseconds; non-positive means 100
        #[arg(long = "period_ms", default_value_t = 100, allow_negative_numbers = true)]
        period_ms: i64,

        /// Redraw a live status block on stderr
        #[arg(long)]
        watch: bool,

        /// Minimum live view redraw interval in milliseconds; non-positive means 200
        #[arg(long = "watch_ms", default_value_t = 200, allow_negative_numbers = true)]
        watch_ms: i64,

        /// Stop after this many samples
        #[arg(long)]
        count: Option<u64>,
    },

    /// Pin CPU and/or GPU to one frequency (dry-run unless --apply)
    #[command(group(ArgGroup::new("target").required(true).multiple(true).args(["cpu_khz", "gpu_hz"])))]
    Set {
        /// CPU frequency in kHz
        #[arg(long = "cpu_khz")]
        cpu_khz: Option<u64>,

        /// GPU frequency in Hz
        #[arg(long = "gpu_hz")]
        gpu_hz: Option<u64>,

        /// Actually write to sysfs
        #[arg(long)]
        apply: bool,
    },

    /// Restore full frequency ranges and default governors (dry-run unless --apply)
    Unlock {
        /// Actually write to sysfs
        #[arg(long)]
        apply: bool,
    },
}
