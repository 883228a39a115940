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

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DvfsError, Result};

/// Thermal-zone keyword variants, one list per logged temperature column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermalKeywords {
    pub cpu: Vec<String>,
    pub gpu: Vec<String>,
    pub soc0: Vec<String>,
    pub soc1: Vec<String>,
    pub soc2: Vec<String>,
    pub tj: Vec<String>,
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

impl Default for ThermalKeywords {
    fn default() -> Self {
        Self {
            cpu: strings(&["cpu-thermal", "CPU-therm", "cpu", "CPU"]),
            gpu: strings(&["gpu-thermal", "GPU-therm", "gpu", "ga10b", "GPU"]),
            soc0: strings(&["soc0-thermal", "SOC0", "soc0"]),
            soc1: strings(&["soc1-thermal", "SOC1", "soc1"]),
            soc2: strings(&["soc2-thermal", "SOC2", "soc2"]),
            tj: strings(&["tj-thermal", "TJ", "tj"]),
        }
    }
}

/// Where the DVFS, fan and thermal attributes live on a given board, and
/// the names used to tell them apart. Defaults describe a Jetson Orin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformProfile {
    pub cpufreq_root: PathBuf,
    pub cpu_legacy_dir: PathBuf,
    pub devfreq_root: PathBuf,
    pub thermal_root: PathBuf,
    pub fan_hwmon_root: PathBuf,
    /// Devfreq names preferred for the GPU role.
    pub gpu_keywords: Vec<String>,
    /// Devfreq names never taken as the GPU (codec and vision engines).
    pub gpu_excluded_keywords: Vec<String>,
    pub fan_keyword: String,
    pub fan_pwm_attr: String,
    pub thermal_zones: ThermalKeywords,
    pub gpu_default_governor: String,
    pub cpu_default_governor: Option<String>,
    pub gpu_fallback_min_hz: u64,
    pub gpu_fallback_max_hz: u64,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self {
            cpufreq_root: PathBuf::from("/sys/devices/system/cpu/cpufreq"),
            cpu_legacy_dir: PathBuf::from("/sys/devices/system/cpu/cpu0/cpufreq"),
            devfreq_root: PathBuf::from("/sys/class/devfreq"),
            thermal_root: PathBuf::from("/sys/class/thermal"),
            fan_hwmon_root: PathBuf::from("/sys/devices/platform/pwm-fan/hwmon"),
            gpu_keywords: strings(&["ga10b", "gpu"]),
            gpu_excluded_keywords: strings(&["nvjpg", "nvenc", "nvdec", "vic", "se"]),
            fan_keyword: "pwm-fan".to_string(),
            fan_pwm_attr: "pwm1".to_string(),
            thermal_zones: ThermalKeywords::default(),
            gpu_default_governor: "nvhost_podgov".to_string(),
            cpu_default_governor: None,
            gpu_fallback_min_hz: 306_000_000,
            gpu_fallback_max_hz: 1_020_000_000,
        }
    }
}

fn rebase(root: &Path, p: &Path) -> PathBuf {
    root.join(p.strip_prefix("/").unwrap_or(p))
}

impl PlatformProfile {
    /// Same profile with every sysfs root moved under `root`, e.g. a copied
    /// `/sys` tree.
    pub fn rebased(&self, root: &Path) -> Self {
        Self {
            cpufreq_root: rebase(root, &self.cpufreq_root),
            cpu_legacy_dir: rebase(root, &self.cpu_legacy_dir),
            devfreq_root: rebase(root, &self.devfreq_root),
            thermal_root: rebase(root, &self.thermal_root),
            fan_hwmon_root: rebase(root, &self.fan_hwmon_root),
            ..self.clone()
        }
    }

    /// Load from an explicit file, else the first profile found on the
    /// lookup path, else the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return load_profile_file(p);
        }
        for p in [config_path(), system_config_path()] {
            if p.exists() {
                debug!("loading platform profile from {}", p.display());
                return load_profile_file(&p);
            }
        }
        Ok(Self::default())
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("dvfs-tool").join("profile.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("dvfs-tool")
            .join("profile.json");
    }
    system_config_path()
}

pub fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/dvfs-tool/profile.json")
}

pub fn load_profile_file(path: &Path) -> Result<PlatformProfile> {
    let data = fs::read_to_string(path)
        .map_err(|e| DvfsError::Config(format!("{}: {}", path.display(), e)))?;
    let profile: PlatformProfile = serde_json::from_str(&data)?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn is_safe_keyword(s: &str) -> bool {
    if s.is_empty() || s.len() > 64 {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub fn validate_profile(p: &PlatformProfile) -> Result<()> {
    let roots = [
        ("cpufreq_root", &p.cpufreq_root),
        ("cpu_legacy_dir", &p.cpu_legacy_dir),
        ("devfreq_root", &p.devfreq_root),
        ("thermal_root", &p.thermal_root),
        ("fan_hwmon_root", &p.fan_hwmon_root),
    ];
    for (name, root) in roots {
        if root.as_os_str().is_empty() {
            return Err(DvfsError::Config(format!("{} must not be empty", name)));
        }
    }

    let t = &p.thermal_zones;
    let lists = [
        ("gpu_keywords", &p.gpu_keywords),
        ("gpu_excluded_keywords", &p.gpu_excluded_keywords),
        ("thermal_zones.cpu", &t.cpu),
        ("thermal_zones.gpu", &t.gpu),
        ("thermal_zones.soc0", &t.soc0),
        ("thermal_zones.soc1", &t.soc1),
        ("thermal_zones.soc2", &t.soc2),
        ("thermal_zones.tj", &t.tj),
    ];
    for (name, list) in lists {
        if let Some(bad) = list.iter().find(|k| !is_safe_keyword(k)) {
            return Err(DvfsError::Config(format!("invalid keyword {:?} in {}", bad, name)));
        }
    }

    let names = [
        ("fan_keyword", Some(&p.fan_keyword)),
        ("fan_pwm_attr", Some(&p.fan_pwm_attr)),
        ("gpu_default_governor", Some(&p.gpu_default_governor)),
        ("cpu_default_governor", p.cpu_default_governor.as_ref()),
    ];
    for (name, value) in names {
        if let Some(v) = value {
            if !is_safe_keyword(v) {
                return Err(DvfsError::Config(format!("invalid value {:?} for {}", v, name)));
            }
        }
    }

    if p.gpu_fallback_min_hz == 0 || p.gpu_fallback_min_hz > p.gpu_fallback_max_hz {
        return Err(DvfsError::Config(
            "gpu_fallback_min_hz must be non-zero and <= gpu_fallback_max_hz".to_string(),
        ));
    }
    Ok(())
}
