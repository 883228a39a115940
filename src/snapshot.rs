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

//! One point-in-time reading of every tracked attribute.
//!
//! Values stay as raw trimmed text. Each attribute is read once and on its
//! own; the kernel may change any of them between two reads of the same
//! snapshot.

use crate::discovery::{Devices, ThermalSlot};
use crate::sysfs::{AttrIo, AttrValue};

/// Current, min, max and governor of one frequency domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreqReading {
    pub cur: AttrValue,
    pub min: AttrValue,
    pub max: AttrValue,
    pub governor: AttrValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanReading {
    pub cur_state: AttrValue,
    pub max_state: AttrValue,
    pub pwm: AttrValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    /// Monotonic clock, nanoseconds.
    pub ts_ns: i64,
    /// CPU values in kHz.
    pub cpu: FreqReading,
    /// GPU values in Hz.
    pub gpu: FreqReading,
    pub fan: FanReading,
    /// Milli-degrees Celsius, indexed by [`ThermalSlot::index`].
    pub temps: [AttrValue; 6],
}

impl SensorSnapshot {
    /// Read everything `devices` resolved. Unresolved roles and failed reads
    /// leave their fields absent; nothing here aborts.
    pub fn capture<A: AttrIo + ?Sized>(devices: &Devices, io: &A, ts_ns: i64) -> Self {
        let cpu = FreqReading {
            cur: devices.cpu.read(io, "scaling_cur_freq"),
            min: devices.cpu.read(io, "scaling_min_freq"),
            max: devices.cpu.read(io, "scaling_max_freq"),
            governor: devices.cpu.read(io, "scaling_governor"),
        };
        let gpu = FreqReading {
            cur: devices.gpu.read(io, "cur_freq"),
            min: devices.gpu.read(io, "min_freq"),
            max: devices.gpu.read(io, "max_freq"),
            governor: devices.gpu.read(io, "governor"),
        };
        let fan = FanReading {
            cur_state: devices.fan.read(io, "cur_state"),
            max_state: devices.fan.read(io, "max_state"),
            pwm: devices.fan_pwm.read(io, &devices.fan_pwm_attr),
        };
        let temps = ThermalSlot::ALL.map(|slot| devices.zone(slot).read(io, "temp"));
        Self { ts_ns, cpu, gpu, fan, temps }
    }

    pub fn temp(&self, slot: ThermalSlot) -> &AttrValue {
        &self.temps[slot.index()]
    }
}
