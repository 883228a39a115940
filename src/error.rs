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

//! Errors that end an operation. Unreadable attributes and failed writes are
//! not errors here; see [`crate::sysfs`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::discovery::DeviceRole;

pub type Result<T> = std::result::Result<T, DvfsError>;

#[derive(Error, Debug)]
pub enum DvfsError {
    #[error("Failed to discover {role} sysfs dir. Run: dvfs-tool probe")]
    Discovery { role: DeviceRole },

    #[error("Failed to open {path}: {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write sample row: {0}")]
    SinkWrite(#[source] io::Error),

    #[error("Sampler has already run")]
    NotIdle,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DvfsError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DvfsError::Discovery { .. } => 3,
            DvfsError::Config(_) | DvfsError::JsonParse(_) => 2,
            DvfsError::SinkOpen { .. }
            | DvfsError::SinkWrite(_)
            | DvfsError::NotIdle
            | DvfsError::Io(_) => 1,
        }
    }
}
