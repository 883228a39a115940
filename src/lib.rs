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

//! dvfs-tool - DVFS probe, pin/unlock and sampling logger for Jetson-class SoCs
//!
//! This library locates the cpufreq, devfreq, fan and thermal sysfs nodes,
//! reads and writes their attributes, and samples them at a fixed period
//! into CSV.

pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logger;
pub mod plan;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod sysfs;
pub mod watch;

#[cfg(test)]
pub mod test_utils;
