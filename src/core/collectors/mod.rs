//! Sensor readers.
//!
//! One collector per published metric. Each implements [`DataProducer`] and
//! reads the host exclusively through [`HostSource`](crate::core::host::HostSource).

/// CPU load, clock speed and board model.
pub mod cpu;

/// Root filesystem usage via `statvfs`.
pub mod disk;

pub mod error;

/// Memory and swap usage from `free -t`.
pub mod ram;

/// Metric identities and the collector set.
pub mod registry;

/// CPU temperature from `/sys/class/thermal`.
pub mod thermal;

pub mod traits;

pub mod types;

/// Days since boot.
pub mod uptime;

/// Core voltage via `vcgencmd`.
pub mod voltage;

pub use cpu::{ClockSpeedCollector, CpuLoadCollector, ModelNameCollector};
pub use disk::UsedSpaceCollector;
pub use error::CollectorError;
pub use ram::{FreeSummary, MemoryCollector, SwapCollector};
pub use registry::{Collectors, Metric};
pub use thermal::CpuTemperatureCollector;
pub use traits::DataProducer;
pub use types::{CollectorResult, Reading};
pub use uptime::UptimeCollector;
pub use voltage::VoltageCollector;
