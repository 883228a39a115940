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

//! Small-value text I/O against sysfs pseudo-files.
//!
//! Reads retry a few times on `EAGAIN` and otherwise give up immediately;
//! writes are single-shot. Neither ever returns an error: failure is an
//! [`AttrValue::Absent`] read or a `false` write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Total read attempts when the kernel reports the resource as temporarily unavailable.
pub const READ_ATTEMPTS: u32 = 3;
/// Pause between retried reads.
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(1);
/// Upper bound on bytes taken from one attribute per attempt.
pub const MAX_READ_BYTES: u64 = 4095;

/// One attribute read at one instant.
///
/// `Absent` covers a missing file, a permission error and exhausted retries
/// alike; the cause is not recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AttrValue {
    Present(String),
    #[default]
    Absent,
}

impl AttrValue {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            AttrValue::Present(s) => Some(s.as_str()),
            AttrValue::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, AttrValue::Present(_))
    }

    /// Text for a CSV field: the raw value, or an empty field.
    pub fn or_empty(&self) -> &str {
        self.as_deref().unwrap_or("")
    }

    pub fn or(&self, fallback: &'static str) -> &str {
        self.as_deref().unwrap_or(fallback)
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            AttrValue::Present(s) => Some(s),
            AttrValue::Absent => None,
        }
    }
}

impl From<Option<String>> for AttrValue {
    fn from(v: Option<String>) -> Self {
        match v {
            Some(s) => AttrValue::Present(s),
            None => AttrValue::Absent,
        }
    }
}

/// Strip trailing spaces, tabs and line terminators; everything else is kept verbatim.
pub fn trim_tail(s: &str) -> &str {
    s.trim_end_matches([' ', '\t', '\n', '\r'])
}

fn is_transient(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EAGAIN) || e.kind() == io::ErrorKind::WouldBlock
}

fn read_once(path: &Path) -> io::Result<String> {
    let mut buf = Vec::with_capacity(64);
    File::open(path)?.take(MAX_READ_BYTES).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Drive `attempt` until it succeeds, fails for a non-transient reason, or
/// [`READ_ATTEMPTS`] are used up.
pub(crate) fn read_with_retry<F>(mut attempt: F) -> AttrValue
where
    F: FnMut() -> io::Result<String>,
{
    for n in 1..=READ_ATTEMPTS {
        match attempt() {
            Ok(raw) => return AttrValue::Present(trim_tail(&raw).to_string()),
            Err(e) if is_transient(&e) => {
                if n < READ_ATTEMPTS {
                    thread::sleep(READ_RETRY_DELAY);
                }
            }
            Err(_) => return AttrValue::Absent,
        }
    }
    AttrValue::Absent
}

/// Read one attribute, trimmed at the tail.
pub fn read_text<P: AsRef<Path>>(path: P) -> AttrValue {
    let path = path.as_ref();
    read_with_retry(|| read_once(path))
}

/// Terminate `value` with exactly one newline unless it already ends in one.
pub fn with_newline(value: &str) -> String {
    let mut v = value.to_string();
    if !v.ends_with('\n') {
        v.push('\n');
    }
    v
}

/// Write one attribute. True only when every byte went out in a single write.
pub fn write_text<P: AsRef<Path>>(path: P, value: &str) -> bool {
    let Ok(mut f) = OpenOptions::new().write(true).truncate(true).open(path.as_ref()) else {
        return false;
    };
    let v = with_newline(value);
    matches!(f.write(v.as_bytes()), Ok(n) if n == v.len())
}

/// Directory children of `root` in native enumeration order. A missing or
/// unreadable root yields nothing.
pub fn list_dirs<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root.as_ref()) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect()
}

/// Access to a pseudo-file tree. Discovery, sampling and the write plans
/// all go through this so they can run against a fake tree.
#[cfg_attr(test, mockall::automock)]
pub trait AttrIo {
    fn read_text(&self, path: &Path) -> AttrValue;
    fn write_text(&self, path: &Path, value: &str) -> bool;
    fn exists(&self, path: &Path) -> bool;
    fn list_dirs(&self, root: &Path) -> Vec<PathBuf>;
}

/// The live filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sysfs;

impl AttrIo for Sysfs {
    fn read_text(&self, path: &Path) -> AttrValue {
        read_text(path)
    }

    fn write_text(&self, path: &Path, value: &str) -> bool {
        write_text(path, value)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dirs(&self, root: &Path) -> Vec<PathBuf> {
        list_dirs(root)
    }
}

/// Final path component as text, or empty.
pub fn file_name_str(p: &Path) -> &str {
    p.file_name().and_then(|s| s.to_str()).unwrap_or("")
}
