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

//! Locate the cpufreq policy, GPU devfreq node, fan cooling device, fan
//! hwmon node and named thermal zones.
//!
//! Every search walks its root in the filesystem's own enumeration order and
//! takes the first candidate that qualifies. That order is unspecified, so on
//! a board with several qualifying entries the winner may differ between
//! kernels. Discovery only reads.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::PlatformProfile;
use crate::error::{DvfsError, Result};
use crate::sysfs::{file_name_str, AttrIo, AttrValue};

pub const CPU_CUR_FREQ: &str = "scaling_cur_freq";
pub const GPU_CUR_FREQ: &str = "cur_freq";
pub const GPU_AVAILABLE_FREQS: &str = "available_frequencies";

/// Temperature columns of the sample log, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThermalSlot {
    Cpu,
    Gpu,
    Soc0,
    Soc1,
    Soc2,
    Tj,
}

impl ThermalSlot {
    pub const ALL: [ThermalSlot; 6] = [
        ThermalSlot::Cpu,
        ThermalSlot::Gpu,
        ThermalSlot::Soc0,
        ThermalSlot::Soc1,
        ThermalSlot::Soc2,
        ThermalSlot::Tj,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ThermalSlot::Cpu => "cpu",
            ThermalSlot::Gpu => "gpu",
            ThermalSlot::Soc0 => "soc0",
            ThermalSlot::Soc1 => "soc1",
            ThermalSlot::Soc2 => "soc2",
            ThermalSlot::Tj => "tj",
        }
    }

    pub fn keywords(self, profile: &PlatformProfile) -> &[String] {
        let t = &profile.thermal_zones;
        match self {
            ThermalSlot::Cpu => &t.cpu,
            ThermalSlot::Gpu => &t.gpu,
            ThermalSlot::Soc0 => &t.soc0,
            ThermalSlot::Soc1 => &t.soc1,
            ThermalSlot::Soc2 => &t.soc2,
            ThermalSlot::Tj => &t.tj,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    CpuFreq,
    GpuFreq,
    Fan,
    FanPwm,
    ThermalZone(ThermalSlot),
}

impl DeviceRole {
    /// Short key used in the pre-run listing, e.g. `tz_soc1`.
    pub fn key(&self) -> String {
        match self {
            DeviceRole::CpuFreq => "cpu_dir".to_string(),
            DeviceRole::GpuFreq => "gpu_dir".to_string(),
            DeviceRole::Fan => "fan_cd".to_string(),
            DeviceRole::FanPwm => "fan_hwmon".to_string(),
            DeviceRole::ThermalZone(slot) => format!("tz_{}", slot.name()),
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::CpuFreq => write!(f, "CPU cpufreq"),
            DeviceRole::GpuFreq => write!(f, "GPU devfreq"),
            DeviceRole::Fan => write!(f, "fan cooling_device"),
            DeviceRole::FanPwm => write!(f, "fan hwmon"),
            DeviceRole::ThermalZone(slot) => write!(f, "{} thermal_zone", slot.name()),
        }
    }
}

/// Directory resolved for one role. `NotFound` is final for the run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceLocation {
    Found(PathBuf),
    #[default]
    NotFound,
}

impl DeviceLocation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DeviceLocation::Found(p) => Some(p),
            DeviceLocation::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, DeviceLocation::Found(_))
    }

    /// Path of attribute `name` under this directory.
    pub fn attr(&self, name: &str) -> Option<PathBuf> {
        self.path().map(|p| p.join(name))
    }

    /// Read attribute `name`; absent when the role itself is unresolved.
    pub fn read<A: AttrIo + ?Sized>(&self, io: &A, name: &str) -> AttrValue {
        match self.attr(name) {
            Some(p) => io.read_text(&p),
            None => AttrValue::Absent,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DeviceLocation::Found(p) => p.display().to_string(),
            DeviceLocation::NotFound => "NOT_FOUND".to_string(),
        }
    }
}

impl From<Option<PathBuf>> for DeviceLocation {
    fn from(p: Option<PathBuf>) -> Self {
        match p {
            Some(p) => DeviceLocation::Found(p),
            None => DeviceLocation::NotFound,
        }
    }
}

/// Every role resolved once at startup. Read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Devices {
    pub cpu: DeviceLocation,
    pub gpu: DeviceLocation,
    pub fan: DeviceLocation,
    pub fan_pwm: DeviceLocation,
    pub fan_pwm_attr: String,
    pub zones: [DeviceLocation; 6],
}

impl Devices {
    pub fn zone(&self, slot: ThermalSlot) -> &DeviceLocation {
        &self.zones[slot.index()]
    }

    pub fn location(&self, role: DeviceRole) -> &DeviceLocation {
        match role {
            DeviceRole::CpuFreq => &self.cpu,
            DeviceRole::GpuFreq => &self.gpu,
            DeviceRole::Fan => &self.fan,
            DeviceRole::FanPwm => &self.fan_pwm,
            DeviceRole::ThermalZone(slot) => self.zone(slot),
        }
    }

    /// Directory for a role the caller cannot do without.
    pub fn require(&self, role: DeviceRole) -> Result<&Path> {
        self.location(role)
            .path()
            .ok_or(DvfsError::Discovery { role })
    }

    pub fn roles(&self) -> Vec<(DeviceRole, &DeviceLocation)> {
        let mut out = vec![
            (DeviceRole::CpuFreq, &self.cpu),
            (DeviceRole::GpuFreq, &self.gpu),
            (DeviceRole::Fan, &self.fan),
            (DeviceRole::FanPwm, &self.fan_pwm),
        ];
        for slot in ThermalSlot::ALL {
            out.push((DeviceRole::ThermalZone(slot), self.zone(slot)));
        }
        out
    }
}

pub struct Discovery<'a, A: AttrIo + ?Sized> {
    profile: &'a PlatformProfile,
    io: &'a A,
}

impl<'a, A: AttrIo + ?Sized> Discovery<'a, A> {
    pub fn new(profile: &'a PlatformProfile, io: &'a A) -> Self {
        Self { profile, io }
    }

    fn has_attrs(&self, dir: &Path, names: &[&str]) -> bool {
        names.iter().all(|n| self.io.exists(&dir.join(n)))
    }

    /// First `policy*` directory exposing `scaling_cur_freq`, else the legacy
    /// `cpu0/cpufreq` directory if it exposes the same attribute.
    pub fn find_cpu_policy_dir(&self) -> Option<PathBuf> {
        let found = self
            .io
            .list_dirs(&self.profile.cpufreq_root)
            .into_iter()
            .find(|d| file_name_str(d).starts_with("policy") && self.has_attrs(d, &[CPU_CUR_FREQ]));
        if found.is_some() {
            return found;
        }
        let legacy = &self.profile.cpu_legacy_dir;
        if self.has_attrs(legacy, &[CPU_CUR_FREQ]) {
            debug!("cpufreq: falling back to {}", legacy.display());
            return Some(legacy.clone());
        }
        None
    }

    fn is_excluded_engine(&self, name: &str) -> bool {
        self.profile
            .gpu_excluded_keywords
            .iter()
            .any(|k| name.contains(k.as_str()))
    }

    fn is_gpu_like(&self, name: &str) -> bool {
        self.profile.gpu_keywords.iter().any(|k| name.contains(k.as_str()))
    }

    /// Devfreq node of the GPU.
    ///
    /// Several engines on the reference board pass the attribute check, so a
    /// GPU-like name is tried first and any remaining node only second. The
    /// two passes must stay separate.
    pub fn find_gpu_devfreq_dir(&self) -> Option<PathBuf> {
        let required = [GPU_CUR_FREQ, GPU_AVAILABLE_FREQS];
        let candidates: Vec<PathBuf> = self
            .io
            .list_dirs(&self.profile.devfreq_root)
            .into_iter()
            .filter(|d| {
                let excluded = self.is_excluded_engine(file_name_str(d));
                if excluded {
                    debug!("devfreq: skipping engine {}", d.display());
                }
                !excluded
            })
            .collect();

        if let Some(d) = candidates
            .iter()
            .find(|d| self.is_gpu_like(file_name_str(d)) && self.has_attrs(d, &required))
        {
            return Some(d.clone());
        }
        let fallback = candidates.into_iter().find(|d| self.has_attrs(d, &required));
        if let Some(d) = &fallback {
            debug!("devfreq: no GPU-named node, using {}", d.display());
        }
        fallback
    }

    /// First `cooling_device*` whose `type` names the fan.
    pub fn find_fan_cooling_device(&self) -> Option<PathBuf> {
        let keyword = self.profile.fan_keyword.as_str();
        self.io
            .list_dirs(&self.profile.thermal_root)
            .into_iter()
            .filter(|d| file_name_str(d).starts_with("cooling_device"))
            .find(|d| {
                self.io
                    .read_text(&d.join("type"))
                    .as_deref()
                    .is_some_and(|t| t.contains(keyword))
            })
    }

    /// First `hwmon*` node of the fan driver that exposes the duty attribute.
    pub fn find_fan_pwm_dir(&self) -> Option<PathBuf> {
        let attr = self.profile.fan_pwm_attr.as_str();
        self.io
            .list_dirs(&self.profile.fan_hwmon_root)
            .into_iter()
            .find(|d| file_name_str(d).starts_with("hwmon") && self.has_attrs(d, &[attr]))
    }

    /// First `thermal_zone*` whose `type` contains any of `keywords`.
    pub fn find_thermal_zone(&self, keywords: &[String]) -> Option<PathBuf> {
        for d in self.io.list_dirs(&self.profile.thermal_root) {
            if !file_name_str(&d).contains("thermal_zone") {
                continue;
            }
            let AttrValue::Present(ty) = self.io.read_text(&d.join("type")) else {
                continue;
            };
            if keywords.iter().any(|k| ty.contains(k.as_str())) {
                return Some(d);
            }
        }
        None
    }

    pub fn discover_all(&self) -> Devices {
        let zones = ThermalSlot::ALL
            .map(|slot| DeviceLocation::from(self.find_thermal_zone(slot.keywords(self.profile))));
        let devices = Devices {
            cpu: self.find_cpu_policy_dir().into(),
            gpu: self.find_gpu_devfreq_dir().into(),
            fan: self.find_fan_cooling_device().into(),
            fan_pwm: self.find_fan_pwm_dir().into(),
            fan_pwm_attr: self.profile.fan_pwm_attr.clone(),
            zones,
        };
        for (role, loc) in devices.roles() {
            debug!("discovered {}: {}", role, loc.describe());
        }
        devices
    }
}

/// Resolve every role against `io` using `profile`.
pub fn discover<A: AttrIo + ?Sized>(profile: &PlatformProfile, io: &A) -> Devices {
    Discovery::new(profile, io).discover_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::Sysfs;
    use crate::test_utils::FakeSysfs;

    #[test]
    fn test_cpu_policy_preferred_over_legacy() {
        let fake = FakeSysfs::new();
        fake.cpu_policy("policy0", "729600");
        fake.cpu_legacy("1344000");
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_cpu_policy_dir(), Some(fake.profile.cpufreq_root.join("policy0")));
    }

    #[test]
    fn test_cpu_policy_without_cur_freq_falls_back_to_legacy() {
        let fake = FakeSysfs::new();
        fake.mkdir(&fake.profile.cpufreq_root.join("policy0"));
        fake.mkdir(&fake.profile.cpufreq_root.join("ondemand"));
        fake.cpu_legacy("1344000");
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_cpu_policy_dir(), Some(fake.profile.cpu_legacy_dir.clone()));
    }

    #[test]
    fn test_cpu_not_found() {
        let fake = FakeSysfs::new();
        fake.mkdir(&fake.profile.cpu_legacy_dir);
        assert_eq!(Discovery::new(&fake.profile, &Sysfs).find_cpu_policy_dir(), None);
    }

    #[test]
    fn test_gpu_named_node_beats_neutral_and_excluded() {
        let fake = FakeSysfs::new();
        fake.devfreq("15340000.vic", true);
        fake.devfreq("13e40000.dla", true);
        fake.devfreq("17000000.gpu", true);
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_gpu_devfreq_dir(), Some(fake.profile.devfreq_root.join("17000000.gpu")));
    }

    #[test]
    fn test_gpu_falls_back_to_neutral_node() {
        let fake = FakeSysfs::new();
        fake.devfreq("13e40000.dla", true);
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_gpu_devfreq_dir(), Some(fake.profile.devfreq_root.join("13e40000.dla")));
    }

    #[test]
    fn test_gpu_requires_both_attributes() {
        let fake = FakeSysfs::new();
        fake.devfreq("17000000.gpu", false);
        fake.devfreq("15480000.nvdec", true);
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_gpu_devfreq_dir(), None);
    }

    #[test]
    fn test_gpu_keywords_come_from_profile() {
        let mut fake = FakeSysfs::new();
        fake.profile.gpu_keywords = vec!["gv11b".to_string()];
        fake.devfreq("13e40000.dla", true);
        fake.devfreq("17000000.gv11b", true);
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_gpu_devfreq_dir(), Some(fake.profile.devfreq_root.join("17000000.gv11b")));
    }

    #[test]
    fn test_fan_cooling_device_matched_by_type() {
        let fake = FakeSysfs::new();
        fake.cooling_device("cooling_device0", "cpufreq-cpu0", "0", "10");
        fake.cooling_device("cooling_device1", "pwm-fan", "2", "10");
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(
            d.find_fan_cooling_device(),
            Some(fake.profile.thermal_root.join("cooling_device1"))
        );
    }

    #[test]
    fn test_fan_pwm_dir_needs_attr() {
        let fake = FakeSysfs::new();
        fake.mkdir(&fake.profile.fan_hwmon_root.join("hwmon0"));
        fake.fan_hwmon("hwmon3", "128");
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(d.find_fan_pwm_dir(), Some(fake.profile.fan_hwmon_root.join("hwmon3")));
    }

    #[test]
    fn test_thermal_zone_keyword_variants() {
        let fake = FakeSysfs::new();
        fake.thermal_zone("thermal_zone0", "CPU-therm", "45000");
        fake.thermal_zone("thermal_zone1", "Tboard_tegra", "40000");
        fake.cooling_device("cooling_device0", "cpu-cooling", "0", "1");
        let d = Discovery::new(&fake.profile, &Sysfs);
        assert_eq!(
            d.find_thermal_zone(ThermalSlot::Cpu.keywords(&fake.profile)),
            Some(fake.profile.thermal_root.join("thermal_zone0"))
        );
        assert_eq!(d.find_thermal_zone(ThermalSlot::Soc2.keywords(&fake.profile)), None);
        assert_eq!(d.find_thermal_zone(&[]), None);
    }

    #[test]
    fn test_discover_all_missing_roots() {
        let fake = FakeSysfs::new();
        let devices = discover(&fake.profile, &Sysfs);
        assert!(devices.roles().iter().all(|(_, loc)| !loc.is_found()));
        assert!(matches!(
            devices.require(DeviceRole::CpuFreq),
            Err(DvfsError::Discovery { role: DeviceRole::CpuFreq })
        ));
    }

    #[test]
    fn test_discover_all_jetson_tree() {
        let fake = FakeSysfs::jetson();
        let devices = discover(&fake.profile, &Sysfs);
        assert_eq!(devices.cpu, DeviceLocation::Found(fake.profile.cpufreq_root.join("policy0")));
        assert_eq!(devices.gpu, DeviceLocation::Found(fake.profile.devfreq_root.join("17000000.gpu")));
        assert!(devices.fan.is_found());
        assert!(devices.fan_pwm.is_found());
        for slot in ThermalSlot::ALL {
            assert!(devices.zone(slot).is_found(), "zone {}", slot.name());
        }
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let fake = FakeSysfs::jetson();
        assert_eq!(discover(&fake.profile, &Sysfs), discover(&fake.profile, &Sysfs));
    }
}
