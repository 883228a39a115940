/*
 * Test utilities for dvfs-tool
 *
 * Builds throwaway sysfs trees under a temp dir, with a platform profile
 * rebased onto them, so discovery and sampling run against real files.
 */

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::PlatformProfile;

pub struct FakeSysfs {
    pub dir: TempDir,
    pub profile: PlatformProfile,
}

impl FakeSysfs {
    /// Empty tree: the profile points into the temp dir but no roots exist yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let profile = PlatformProfile::default().rebased(dir.path());
        Self { dir, profile }
    }

    /// CPU policy0, GPU plus two other devfreq engines, a pwm-fan cooling
    /// device with its hwmon node, and all six thermal zones.
    pub fn jetson() -> Self {
        let fake = Self::new();
        fake.cpu_policy("policy0", "1344000");
        fake.devfreq("15340000.vic", true);
        fake.devfreq("13e40000.dla", true);
        fake.devfreq("17000000.gpu", true);
        fake.cooling_device("cooling_device0", "pwm-fan", "3", "10");
        fake.fan_hwmon("hwmon1", "96");
        let zones = [
            ("thermal_zone0", "cpu-thermal", "45000"),
            ("thermal_zone1", "gpu-thermal", "62500"),
            ("thermal_zone2", "soc0-thermal", "44000"),
            ("thermal_zone3", "soc1-thermal", "43500"),
            ("thermal_zone4", "soc2-thermal", "44500"),
            ("thermal_zone5", "tj-thermal", "62750"),
        ];
        for (name, ty, temp) in zones {
            fake.thermal_zone(name, ty, temp);
        }
        fake
    }

    pub fn mkdir(&self, p: &Path) {
        fs::create_dir_all(p).expect("mkdir");
    }

    pub fn write(&self, p: &Path, value: &str) {
        if let Some(parent) = p.parent() {
            self.mkdir(parent);
        }
        fs::write(p, value).expect("write attr");
    }

    pub fn read(&self, p: &Path) -> String {
        fs::read_to_string(p).expect("read attr")
    }

    pub fn cpu_policy(&self, name: &str, cur_khz: &str) -> PathBuf {
        let d = self.profile.cpufreq_root.join(name);
        self.write(&d.join("scaling_cur_freq"), &format!("{}\n", cur_khz));
        self.write(&d.join("scaling_min_freq"), "115200\n");
        self.write(&d.join("scaling_max_freq"), "1728000\n");
        self.write(&d.join("scaling_governor"), "schedutil\n");
        self.write(&d.join("cpuinfo_min_freq"), "115200\n");
        self.write(&d.join("cpuinfo_max_freq"), "1728000\n");
        self.write(&d.join("scaling_available_frequencies"), "115200 729600 1344000 1728000 \n");
        d
    }

    pub fn cpu_legacy(&self, cur_khz: &str) -> PathBuf {
        let d = self.profile.cpu_legacy_dir.clone();
        self.write(&d.join("scaling_cur_freq"), &format!("{}\n", cur_khz));
        d
    }

    /// Devfreq node with `cur_freq`, optionally `available_frequencies`, and
    /// the min/max/governor attributes.
    pub fn devfreq(&self, name: &str, with_available: bool) -> PathBuf {
        let d = self.profile.devfreq_root.join(name);
        self.write(&d.join("cur_freq"), "612000000\n");
        self.write(&d.join("min_freq"), "306000000\n");
        self.write(&d.join("max_freq"), "1020000000\n");
        self.write(&d.join("governor"), "nvhost_podgov\n");
        if with_available {
            self.write(&d.join("available_frequencies"), "306000000 612000000 918000000 1020000000\n");
        }
        d
    }

    pub fn cooling_device(&self, name: &str, ty: &str, cur: &str, max: &str) -> PathBuf {
        let d = self.profile.thermal_root.join(name);
        self.write(&d.join("type"), &format!("{}\n", ty));
        self.write(&d.join("cur_state"), &format!("{}\n", cur));
        self.write(&d.join("max_state"), &format!("{}\n", max));
        d
    }

    pub fn fan_hwmon(&self, name: &str, pwm: &str) -> PathBuf {
        let d = self.profile.fan_hwmon_root.join(name);
        self.write(&d.join(&self.profile.fan_pwm_attr), &format!("{}\n", pwm));
        d
    }

    pub fn thermal_zone(&self, name: &str, ty: &str, temp: &str) -> PathBuf {
        let d = self.profile.thermal_root.join(name);
        self.write(&d.join("type"), &format!("{}\n", ty));
        self.write(&d.join("temp"), &format!("{}\n", temp));
        d
    }
}
