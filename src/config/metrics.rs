//! Which metrics are collected, and what to do with missing sensors.

use serde::{Deserialize, Serialize};

use crate::core::collectors::Metric;

/// What the snapshot assembler does with a reading that is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailablePolicy {
    /// Publish `0.0` under the metric key, as older consumers expect.
    #[default]
    Zero,
    /// Leave the key out of the snapshot.
    Omit,
}

/// `[metrics]` section: one enable flag per metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub cpu_load: bool,
    pub cpu_temp: bool,
    pub used_space: bool,
    pub voltage: bool,
    pub sys_clock_speed: bool,
    pub swap: bool,
    pub memory: bool,
    pub uptime: bool,
    /// Board model string from `/proc/cpuinfo`. Off unless asked for.
    pub model_name: bool,

    pub unavailable: UnavailablePolicy,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            cpu_load: true,
            cpu_temp: true,
            used_space: true,
            voltage: true,
            sys_clock_speed: true,
            swap: true,
            memory: true,
            uptime: true,
            model_name: false,
            unavailable: UnavailablePolicy::default(),
        }
    }
}

impl MetricsConfig {
    /// Configuration with every flag off. Mostly useful for tests.
    pub fn none() -> Self {
        MetricsConfig {
            cpu_load: false,
            cpu_temp: false,
            used_space: false,
            voltage: false,
            sys_clock_speed: false,
            swap: false,
            memory: false,
            uptime: false,
            model_name: false,
            unavailable: UnavailablePolicy::default(),
        }
    }

    /// Configuration with exactly `metrics` enabled.
    pub fn only(metrics: &[Metric]) -> Self {
        let mut config = Self::none();
        for metric in metrics {
            config.set(*metric, true);
        }
        config
    }

    pub fn is_enabled(&self, metric: Metric) -> bool {
        match metric {
            Metric::CpuLoad => self.cpu_load,
            Metric::CpuTemperature => self.cpu_temp,
            Metric::UsedSpace => self.used_space,
            Metric::Voltage => self.voltage,
            Metric::ClockSpeed => self.sys_clock_speed,
            Metric::Swap => self.swap,
            Metric::Memory => self.memory,
            Metric::Uptime => self.uptime,
            Metric::ModelName => self.model_name,
        }
    }

    pub fn set(&mut self, metric: Metric, enabled: bool) {
        let flag = match metric {
            Metric::CpuLoad => &mut self.cpu_load,
            Metric::CpuTemperature => &mut self.cpu_temp,
            Metric::UsedSpace => &mut self.used_space,
            Metric::Voltage => &mut self.voltage,
            Metric::ClockSpeed => &mut self.sys_clock_speed,
            Metric::Swap => &mut self.swap,
            Metric::Memory => &mut self.memory,
            Metric::Uptime => &mut self.uptime,
            Metric::ModelName => &mut self.model_name,
        };
        *flag = enabled;
    }

    /// Enabled metrics in snapshot order.
    pub fn enabled_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.is_enabled(*m))
            .collect()
    }

    /// Enabled metrics by their configuration names.
    pub fn enabled_names(&self) -> Vec<&'static str> {
        self.enabled_metrics()
            .into_iter()
            .map(Metric::config_name)
            .collect()
    }
}
