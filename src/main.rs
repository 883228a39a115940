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

use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use dvfs_tool::cli::{Cli, Commands};
use dvfs_tool::commands::{self, LogOptions};
use dvfs_tool::config::PlatformProfile;
use dvfs_tool::error::DvfsError;
use dvfs_tool::logger;
use dvfs_tool::sysfs::Sysfs;

/// Raised by SIGINT/SIGTERM; polled by the sampler between ticks.
static STOP: AtomicBool = AtomicBool::new(false);

fn main() {
    let cli = Cli::parse();
    logger::init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            e.downcast_ref::<DvfsError>().map_or(1, DvfsError::exit_code)
        }
    };
    logger::close_event_log();
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    if let Some(path) = &cli.event_log {
        logger::open_event_log(path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
    }

    let mut profile = PlatformProfile::load(cli.profile.as_deref())?;
    if let Some(root) = &cli.sysfs_root {
        profile = profile.rebased(root);
    }
    let io = Sysfs;
    let mut stdout = io::stdout().lock();

    let code = match cli.command {
        Commands::Probe => {
            commands::probe(&profile, &io, &mut stdout)?;
            0
        }
        Commands::Log { out, period_ms, watch, watch_ms, count } => {
            if let Err(e) = ctrlc::set_handler(|| STOP.store(true, Ordering::SeqCst)) {
                warn!("Failed to set signal handler: {}. Stop with SIGKILL.", e);
            }
            let opts = LogOptions::from_ms(out, period_ms, watch.then_some(watch_ms), count);
            let summary = commands::run_log(&profile, &io, &opts, &STOP, &mut io::stderr())?;
            info!("{} samples in {:?}", summary.samples, summary.elapsed);
            0
        }
        Commands::Set { cpu_khz, gpu_hz, apply } => {
            commands::run_set(&profile, &io, cpu_khz, gpu_hz, apply, &mut stdout)?
        }
        Commands::Unlock { apply } => commands::run_unlock(&profile, &io, apply, &mut stdout)?,
    };
    Ok(code)
}
