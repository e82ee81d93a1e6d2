use std::{fmt, sync::Arc};

use super::{
    cpu::{ClockSpeedCollector, CpuLoadCollector, ModelNameCollector},
    disk::UsedSpaceCollector,
    ram::{MemoryCollector, SwapCollector},
    thermal::CpuTemperatureCollector,
    uptime::UptimeCollector,
    voltage::VoltageCollector,
};
use crate::core::host::{HostSource, SystemHost};

/// Key published next to `CPUTemperature`.
pub const TEMP_UNIT_KEY: &str = "TempUnit";
pub const TEMP_UNIT: &str = "C";

/// Every metric the probe knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    CpuLoad,
    CpuTemperature,
    UsedSpace,
    Voltage,
    ClockSpeed,
    Swap,
    Memory,
    Uptime,
    ModelName,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::CpuLoad,
        Metric::CpuTemperature,
        Metric::UsedSpace,
        Metric::Voltage,
        Metric::ClockSpeed,
        Metric::Swap,
        Metric::Memory,
        Metric::Uptime,
        Metric::ModelName,
    ];

    /// Name of the enable flag in the `[metrics]` section.
    pub fn config_name(self) -> &'static str {
        match self {
            Metric::CpuLoad => "cpu_load",
            Metric::CpuTemperature => "cpu_temp",
            Metric::UsedSpace => "used_space",
            Metric::Voltage => "voltage",
            Metric::ClockSpeed => "sys_clock_speed",
            Metric::Swap => "swap",
            Metric::Memory => "memory",
            Metric::Uptime => "uptime",
            Metric::ModelName => "model_name",
        }
    }

    /// JSON key in the published snapshot.
    pub fn key(self) -> &'static str {
        match self {
            Metric::CpuLoad => "CPULoad",
            Metric::CpuTemperature => "CPUTemperature",
            Metric::UsedSpace => "UsedSpace",
            Metric::Voltage => "Voltage",
            Metric::ClockSpeed => "ClockSpeed",
            Metric::Swap => "UsedSwap",
            Metric::Memory => "UsedMemory",
            Metric::Uptime => "UptimeDays",
            Metric::ModelName => "ModelName",
        }
    }

    /// Every key this metric contributes when it is available.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Metric::CpuTemperature => &["CPUTemperature", TEMP_UNIT_KEY],
            Metric::CpuLoad => &["CPULoad"],
            Metric::UsedSpace => &["UsedSpace"],
            Metric::Voltage => &["Voltage"],
            Metric::ClockSpeed => &["ClockSpeed"],
            Metric::Swap => &["UsedSwap"],
            Metric::Memory => &["UsedMemory"],
            Metric::Uptime => &["UptimeDays"],
            Metric::ModelName => &["ModelName"],
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// One reader per metric, all sharing the same host.
pub struct Collectors {
    pub cpu_load: CpuLoadCollector,
    pub cpu_temperature: CpuTemperatureCollector,
    pub used_space: UsedSpaceCollector,
    pub voltage: VoltageCollector,
    pub clock_speed: ClockSpeedCollector,
    pub swap: SwapCollector,
    pub memory: MemoryCollector,
    pub uptime: UptimeCollector,
    pub model_name: ModelNameCollector,
}

impl Collectors {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        Collectors {
            cpu_load: CpuLoadCollector::new(host.clone()),
            cpu_temperature: CpuTemperatureCollector::new(host.clone()),
            used_space: UsedSpaceCollector::new(host.clone()),
            voltage: VoltageCollector::new(host.clone()),
            clock_speed: ClockSpeedCollector::new(host.clone()),
            swap: SwapCollector::new(host.clone()),
            memory: MemoryCollector::new(host.clone()),
            uptime: UptimeCollector::new(host.clone()),
            model_name: ModelNameCollector::new(host),
        }
    }

    /// Readers bound to the local machine.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemHost::new()))
    }
}
