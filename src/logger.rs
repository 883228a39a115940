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

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `DVFS_LOG=debug`.
pub const LOG_ENV: &str = "DVFS_LOG";

lazy_static! {
    static ref EVENT_FILE: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Diagnostics to stderr. `DVFS_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

/// Open the JSON-lines event log, appending.
pub fn open_event_log(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    let mut guard = match EVENT_FILE.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(f);
    Ok(())
}

pub fn close_event_log() {
    let mut guard = match EVENT_FILE.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
}

/// Record one event. No-op until [`open_event_log`] succeeded.
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Ok(mut guard) = EVENT_FILE.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_event_log_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("events.json");
        open_event_log(&path).unwrap();
        log_event("sysfs_write", json!({ "path": "/x/min_freq", "value": "306000000", "ok": true }));
        log_event("log_stop", json!({ "samples": 3 }));
        close_event_log();
        log_event("dropped", json!({}));

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "sysfs_write");
        assert_eq!(lines[0]["data"]["ok"], true);
        assert_eq!(lines[1]["data"]["samples"], 3);
        assert!(lines[1]["ts_ms"].as_u64().is_some());
    }

    #[test]
    #[serial]
    fn test_log_event_without_file_is_noop() {
        close_event_log();
        log_event("nothing", json!({ "a": 1 }));
    }
}
