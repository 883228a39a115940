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

//! The four subcommands. Each writes its report to the given stream and
//! returns the process exit code or a [`DvfsError`].

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::config::PlatformProfile;
use crate::discovery::{discover, DeviceRole, Devices, ThermalSlot, CPU_CUR_FREQ, GPU_CUR_FREQ};
use crate::error::{DvfsError, Result};
use crate::plan::{plan_set, plan_unlock, WriteOutcome, WritePlan};
use crate::scheduler::{period_from_ms, RunSummary, SampleScheduler, SchedulerConfig};
use crate::sink::CsvSink;
use crate::sysfs::{file_name_str, AttrIo, AttrValue};
use crate::watch::{LiveView, DEFAULT_WATCH_INTERVAL};

const PROBE_ZONE_LIMIT: usize = 12;
const DRY_RUN_NOTE: &str = "Dry-run (no sysfs writes). Add --apply to actually write.";

fn print_kv<W: Write + ?Sized>(out: &mut W, key: &str, v: &AttrValue) -> io::Result<()> {
    writeln!(out, "{}: {}", key, v.or("<N/A>"))
}

/// Discovery-only diagnostic. Never fails on missing hardware.
pub fn probe<A: AttrIo + ?Sized, W: Write + ?Sized>(
    profile: &PlatformProfile,
    io: &A,
    out: &mut W,
) -> io::Result<()> {
    let devices = discover(profile, io);
    writeln!(out, "=== dvfs-tool probe ===")?;

    writeln!(out, "\n[CPU cpufreq]")?;
    match devices.cpu.path() {
        None => writeln!(out, "cpu cpufreq dir not found.")?,
        Some(d) => {
            writeln!(out, "dir: {}", d.display())?;
            for (key, attr) in [
                ("scaling_governor", "scaling_governor"),
                ("scaling_cur_freq(kHz)", CPU_CUR_FREQ),
                ("scaling_min_freq(kHz)", "scaling_min_freq"),
                ("scaling_max_freq(kHz)", "scaling_max_freq"),
                ("available_frequencies(kHz)", "scaling_available_frequencies"),
                ("cpuinfo_min_freq(kHz)", "cpuinfo_min_freq"),
                ("cpuinfo_max_freq(kHz)", "cpuinfo_max_freq"),
            ] {
                print_kv(out, key, &io.read_text(&d.join(attr)))?;
            }
        }
    }

    writeln!(out, "\n[GPU devfreq]")?;
    match devices.gpu.path() {
        None => {
            writeln!(out, "gpu devfreq dir not found under {}.", profile.devfreq_root.display())?;
            writeln!(out, "Try: ls {}", profile.devfreq_root.display())?;
        }
        Some(d) => {
            writeln!(out, "dir: {}", d.display())?;
            for (key, attr) in [
                ("cur_freq(Hz)", GPU_CUR_FREQ),
                ("min_freq(Hz)", "min_freq"),
                ("max_freq(Hz)", "max_freq"),
                ("available_frequencies(Hz)", "available_frequencies"),
                ("governor", "governor"),
            ] {
                print_kv(out, key, &io.read_text(&d.join(attr)))?;
            }
        }
    }

    writeln!(out, "\n[FAN cooling_device]")?;
    match devices.fan.path() {
        None => writeln!(out, "{} cooling_device not found.", profile.fan_keyword)?,
        Some(d) => {
            writeln!(out, "dir: {}", d.display())?;
            for attr in ["type", "cur_state", "max_state"] {
                print_kv(out, attr, &io.read_text(&d.join(attr)))?;
            }
        }
    }
    if let Some(pwm) = devices.fan_pwm.attr(&devices.fan_pwm_attr) {
        print_kv(out, &format!("{} ({})", devices.fan_pwm_attr, pwm.display()), &io.read_text(&pwm))?;
    }

    writeln!(out, "\n[Thermal roles]")?;
    for slot in ThermalSlot::ALL {
        writeln!(out, "{}: {}", slot.name(), devices.zone(slot).describe())?;
    }

    writeln!(out, "\n[Temps (thermal_zone, first {})]", PROBE_ZONE_LIMIT)?;
    if !io.exists(&profile.thermal_root) {
        writeln!(out, "No {}", profile.thermal_root.display())?;
        return Ok(());
    }
    let mut shown = 0;
    for d in io.list_dirs(&profile.thermal_root) {
        if shown >= PROBE_ZONE_LIMIT {
            break;
        }
        let name = file_name_str(&d);
        if !name.contains("thermal_zone") {
            continue;
        }
        if let (AttrValue::Present(ty), AttrValue::Present(temp)) =
            (io.read_text(&d.join("type")), io.read_text(&d.join("temp")))
        {
            writeln!(out, "{}  type={}  temp={}", name, ty, temp)?;
            shown += 1;
        }
    }
    Ok(())
}

/// Options of the `log` subcommand, already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub out: PathBuf,
    pub period: Duration,
    /// Live view redraw interval, when watching.
    pub watch: Option<Duration>,
    pub max_samples: Option<u64>,
}

impl LogOptions {
    /// Non-positive millisecond values fall back to the defaults.
    pub fn from_ms(out: PathBuf, period_ms: i64, watch_ms: Option<i64>, max_samples: Option<u64>) -> Self {
        Self {
            out,
            period: period_from_ms(period_ms),
            watch: watch_ms.map(|ms| {
                if ms > 0 { Duration::from_millis(ms as u64) } else { DEFAULT_WATCH_INTERVAL }
            }),
            max_samples,
        }
    }
}

/// Discover, open the CSV and sample until `stop` is raised.
///
/// `status` receives the pre-run report, the live view when watching, and
/// the final "Stopped." line.
pub fn run_log<A: AttrIo + ?Sized, W: Write>(
    profile: &PlatformProfile,
    io: &A,
    opts: &LogOptions,
    stop: &AtomicBool,
    status: &mut W,
) -> Result<RunSummary> {
    let devices = discover(profile, io);
    devices.require(DeviceRole::CpuFreq)?;
    devices.require(DeviceRole::GpuFreq)?;

    let mut sink = CsvSink::create(&opts.out)?;

    match opts.watch {
        Some(w) => writeln!(
            status,
            "Logging to {} period={}ms (watch={}ms)",
            opts.out.display(),
            opts.period.as_millis(),
            w.as_millis()
        )?,
        None => {
            writeln!(status, "Logging to {} period={}ms", opts.out.display(), opts.period.as_millis())?;
            for (role, loc) in devices.roles() {
                writeln!(status, "{}={}", role.key(), loc.describe())?;
            }
        }
    }

    let config = SchedulerConfig { period: opts.period, max_samples: opts.max_samples };
    let mut scheduler = SampleScheduler::new(&devices, io, config);
    let summary = match opts.watch {
        Some(interval) => {
            let mut view = LiveView::new(&mut *status, interval);
            scheduler.run(&mut sink, Some(&mut view), stop)?
        }
        None => scheduler.run(&mut sink, None::<&mut LiveView<io::Sink>>, stop)?,
    };
    writeln!(status, "Stopped.")?;
    Ok(summary)
}

fn print_dirs<W: Write + ?Sized>(devices: &Devices, out: &mut W) -> io::Result<()> {
    if let Some(d) = devices.cpu.path() {
        writeln!(out, "CPU dir: {}", d.display())?;
    }
    if let Some(d) = devices.gpu.path() {
        writeln!(out, "GPU dir: {}", d.display())?;
    }
    Ok(())
}

fn report_and_execute<A: AttrIo + ?Sized, W: Write + ?Sized>(
    plan: &WritePlan,
    io: &A,
    apply: bool,
    out: &mut W,
) -> io::Result<WriteOutcome> {
    plan.report(out)?;
    let outcome = plan.execute(io, apply);
    if !outcome.applied {
        writeln!(out, "{}", DRY_RUN_NOTE)?;
        return Ok(outcome);
    }
    writeln!(out, "Applied.")?;
    for (path, ok) in &outcome.results {
        writeln!(out, "  {}: {}", path.display(), if *ok { "ok" } else { "FAILED" })?;
    }
    Ok(outcome)
}

fn read_at<A: AttrIo + ?Sized>(io: &A, dir: &Path, attr: &str) -> AttrValue {
    io.read_text(&dir.join(attr))
}

/// Pin CPU and/or GPU. Returns 0, or 4 when an applied write failed.
pub fn run_set<A: AttrIo + ?Sized, W: Write + ?Sized>(
    profile: &PlatformProfile,
    io: &A,
    cpu_khz: Option<u64>,
    gpu_hz: Option<u64>,
    apply: bool,
    out: &mut W,
) -> Result<i32> {
    let devices = discover(profile, io);
    let plan = plan_set(&devices, cpu_khz, gpu_hz)?;
    print_dirs(&devices, out)?;
    let outcome = report_and_execute(&plan, io, apply, out)?;
    if !outcome.applied {
        return Ok(0);
    }

    if cpu_khz.is_some() {
        if let Some(cpu) = devices.cpu.path() {
            print_kv(out, "CPU cur(kHz)", &read_at(io, cpu, CPU_CUR_FREQ))?;
        }
    }
    if gpu_hz.is_some() {
        if let Some(gpu) = devices.gpu.path() {
            print_kv(out, "GPU cur(Hz)", &read_at(io, gpu, GPU_CUR_FREQ))?;
            writeln!(
                out,
                "GPU min/max: {}/{}",
                read_at(io, gpu, "min_freq").or("<N/A>"),
                read_at(io, gpu, "max_freq").or("<N/A>")
            )?;
        }
    }
    Ok(outcome.exit_code())
}

/// Restore full frequency ranges and default governors.
pub fn run_unlock<A: AttrIo + ?Sized, W: Write + ?Sized>(
    profile: &PlatformProfile,
    io: &A,
    apply: bool,
    out: &mut W,
) -> Result<i32> {
    let devices = discover(profile, io);
    let plan = plan_unlock(&devices, profile, io)?;
    print_dirs(&devices, out)?;
    let outcome = report_and_execute(&plan, io, apply, out)?;
    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CSV_HEADER;
    use crate::sysfs::Sysfs;
    use crate::test_utils::FakeSysfs;
    use serial_test::serial;
    use std::fs;

    fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_probe_full_tree() {
        let fake = FakeSysfs::jetson();
        let mut out = Vec::new();
        probe(&fake.profile, &Sysfs, &mut out).unwrap();
        let s = text(out);
        assert!(s.starts_with("=== dvfs-tool probe ===\n"));
        assert!(s.contains("scaling_cur_freq(kHz): 1344000\n"));
        assert!(s.contains("17000000.gpu"));
        assert!(s.contains("governor: nvhost_podgov\n"));
        assert!(s.contains("max_state: 10\n"));
        assert!(s.contains("pwm1 ("));
        assert!(s.contains("thermal_zone1  type=gpu-thermal  temp=62500\n"));
        assert!(s.contains("tj: "));
        assert!(!s.contains("NOT_FOUND"));
    }

    #[test]
    fn test_probe_missing_everything() {
        let fake = FakeSysfs::new();
        let mut out = Vec::new();
        probe(&fake.profile, &Sysfs, &mut out).unwrap();
        let s = text(out);
        assert!(s.contains("cpu cpufreq dir not found."));
        assert!(s.contains("gpu devfreq dir not found under"));
        assert!(s.contains("pwm-fan cooling_device not found."));
        assert!(s.contains("cpu: NOT_FOUND"));
        assert!(s.contains("No "));
    }

    #[test]
    fn test_probe_marks_missing_attrs() {
        let fake = FakeSysfs::jetson();
        let cpu = fake.profile.cpufreq_root.join("policy0");
        fs::remove_file(cpu.join("cpuinfo_min_freq")).unwrap();
        let mut out = Vec::new();
        probe(&fake.profile, &Sysfs, &mut out).unwrap();
        assert!(text(out).contains("cpuinfo_min_freq(kHz): <N/A>\n"));
    }

    #[test]
    fn test_set_dry_run_leaves_tree_untouched() {
        let fake = FakeSysfs::jetson();
        let cpu = fake.profile.cpufreq_root.join("policy0");
        let mut out = Vec::new();
        let code = run_set(&fake.profile, &Sysfs, Some(729_600), Some(612_000_000), false, &mut out).unwrap();
        assert_eq!(code, 0);
        assert_eq!(fake.read(&cpu.join("scaling_min_freq")), "115200\n");
        let s = text(out);
        assert!(s.contains("Will write:"));
        assert!(s.contains(DRY_RUN_NOTE));
        assert!(!s.contains("Applied."));
    }

    #[test]
    #[serial]
    fn test_set_apply_writes_and_reads_back() {
        let fake = FakeSysfs::jetson();
        let gpu = fake.profile.devfreq_root.join("17000000.gpu");
        let mut out = Vec::new();
        let code = run_set(&fake.profile, &Sysfs, None, Some(918_000_000), true, &mut out).unwrap();
        assert_eq!(code, 0);
        assert_eq!(fake.read(&gpu.join("min_freq")), "918000000\n");
        assert_eq!(fake.read(&gpu.join("max_freq")), "918000000\n");
        let s = text(out);
        assert!(s.contains("Applied."));
        assert!(s.contains("GPU min/max: 918000000/918000000\n"));
        assert!(!s.contains("CPU cur(kHz)"));
    }

    #[test]
    fn test_set_requires_pinned_domain() {
        let fake = FakeSysfs::new();
        fake.cpu_policy("policy0", "729600");
        let mut out = Vec::new();
        let err = run_set(&fake.profile, &Sysfs, None, Some(1), false, &mut out).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(run_set(&fake.profile, &Sysfs, Some(729_600), None, false, &mut Vec::<u8>::new()).unwrap(), 0);
    }

    #[test]
    #[serial]
    fn test_unlock_apply() {
        let fake = FakeSysfs::jetson();
        let cpu = fake.profile.cpufreq_root.join("policy0");
        let gpu = fake.profile.devfreq_root.join("17000000.gpu");
        fake.write(&cpu.join("scaling_max_freq"), "729600\n");
        fake.write(&gpu.join("max_freq"), "612000000\n");
        let mut out = Vec::new();
        assert_eq!(run_unlock(&fake.profile, &Sysfs, true, &mut out).unwrap(), 0);
        assert_eq!(fake.read(&cpu.join("scaling_max_freq")), "1728000\n");
        assert_eq!(fake.read(&gpu.join("max_freq")), "1020000000\n");
        assert_eq!(fake.read(&gpu.join("governor")), "nvhost_podgov\n");
    }

    #[test]
    fn test_log_options_clamp() {
        let o = LogOptions::from_ms(PathBuf::from("run.csv"), -5, Some(0), None);
        assert_eq!(o.period, Duration::from_millis(100));
        assert_eq!(o.watch, Some(DEFAULT_WATCH_INTERVAL));
        let o = LogOptions::from_ms(PathBuf::from("run.csv"), 0, Some(-30), None);
        assert_eq!(o.watch, Some(Duration::from_millis(200)));
        let o = LogOptions::from_ms(PathBuf::from("run.csv"), 20, None, Some(3));
        assert_eq!(o.period, Duration::from_millis(20));
        assert_eq!(o.watch, None);
    }

    #[test]
    #[serial]
    fn test_run_log_bounded() {
        let fake = FakeSysfs::jetson();
        fs::remove_dir_all(fake.profile.fan_hwmon_root.join("hwmon1")).unwrap();
        let csv = fake.dir.path().join("run.csv");
        let opts = LogOptions::from_ms(csv.clone(), 2, None, Some(3));
        let stop = AtomicBool::new(false);
        let mut status = Vec::new();
        let summary = run_log(&fake.profile, &Sysfs, &opts, &stop, &mut status).unwrap();
        assert_eq!(summary.samples, 3);

        let s = text(status);
        assert!(s.contains("fan_hwmon=NOT_FOUND\n"));
        assert!(s.contains("tz_tj="));
        assert!(s.ends_with("Stopped.\n"));

        let body = fs::read_to_string(&csv).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(lines.count(), 3);
    }

    #[test]
    #[serial]
    fn test_run_log_watch_renders_to_status() {
        let fake = FakeSysfs::jetson();
        let csv = fake.dir.path().join("watch.csv");
        let opts = LogOptions::from_ms(csv, 2, Some(1), Some(2));
        let stop = AtomicBool::new(false);
        let mut status = Vec::new();
        run_log(&fake.profile, &Sysfs, &opts, &stop, &mut status).unwrap();
        let s = text(status);
        assert!(s.contains("(watch=1ms)"));
        assert!(s.contains("Temps: CPU 45.0C | GPU 62.5C"));
        assert!(!s.contains("cpu_dir="));
    }

    #[test]
    fn test_run_log_discovery_and_sink_errors() {
        let fake = FakeSysfs::new();
        fake.cpu_policy("policy0", "729600");
        let opts = LogOptions::from_ms(fake.dir.path().join("x.csv"), 1, None, Some(1));
        let err = run_log(&fake.profile, &Sysfs, &opts, &AtomicBool::new(false), &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, DvfsError::Discovery { role: DeviceRole::GpuFreq }));
        assert!(!fake.dir.path().join("x.csv").exists());

        fake.devfreq("17000000.gpu", true);
        let opts = LogOptions::from_ms(fake.dir.path().join("missing/dir/x.csv"), 1, None, Some(1));
        let err = run_log(&fake.profile, &Sysfs, &opts, &AtomicBool::new(false), &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, DvfsError::SinkOpen { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
