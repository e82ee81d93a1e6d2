use std::sync::Arc;

use tracing::debug;

use super::{
    traits::DataProducer,
    types::{percent, round_to, CollectorResult},
};
use crate::core::host::HostSource;

/// Used/total pair from one row of `free -t`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageRow {
    /// `total` column, in whatever unit `free` printed.
    pub total: f64,
    /// `used` column, same unit as `total`.
    pub used: f64,
}

impl UsageRow {
    /// Used share in percent, `None` if the total is zero.
    pub fn used_percent(&self) -> Option<f64> {
        percent(self.used, self.total)
    }
}

/// The memory and swap rows of `free -t`.
///
/// ```text
///                total        used        free      shared  buff/cache   available
/// Mem:         3884812      512340     2710236       33512      662236     3244288
/// Swap:         102396           0      102396
/// Total:       3987208      512340     2812632
/// ```
///
/// Rows are picked by position (second and third line) and columns by
/// index, so translated row labels do not matter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FreeSummary {
    /// Second line (`Mem:`), `None` if missing or unparsable.
    pub memory: Option<UsageRow>,
    /// Third line (`Swap:`), `None` if missing or unparsable.
    pub swap: Option<UsageRow>,
}

fn parse_row(line: Option<&str>) -> Option<UsageRow> {
    let fields: Vec<&str> = line?.split_whitespace().collect();
    let number = |idx: usize| -> Option<f64> {
        fields
            .get(idx)?
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    Some(UsageRow {
        total: number(1)?,
        used: number(2)?,
    })
}

impl FreeSummary {
    pub fn parse(output: &str) -> Self {
        let mut lines = output.lines().skip(1);
        FreeSummary {
            memory: parse_row(lines.next()),
            swap: parse_row(lines.next()),
        }
    }
}

async fn read_free(host: &dyn HostSource) -> FreeSummary {
    match host.run_command("free", &["-t"]).await {
        Ok(output) if output.success => FreeSummary::parse(&output.stdout),
        Ok(_) => {
            debug!("free exited unsuccessfully");
            FreeSummary::default()
        }
        Err(e) => {
            debug!("Cannot run free: {}", e);
            FreeSummary::default()
        }
    }
}

/// Memory usage in percent, rounded to an integer. Missing data gives 0.
pub fn memory_percent(summary: &FreeSummary) -> u8 {
    summary
        .memory
        .and_then(|row| row.used_percent())
        .map(|p| p.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

/// Swap usage in percent with one decimal. Missing data or no swap gives 0.
pub fn swap_percent(summary: &FreeSummary) -> f64 {
    summary
        .swap
        .and_then(|row| row.used_percent())
        .map(|p| round_to(p, 1))
        .unwrap_or(0.0)
}

/// `UsedMemory`: share of RAM in use from `free -t`, whole percent.
pub struct MemoryCollector {
    host: Arc<dyn HostSource>,
}

impl MemoryCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        MemoryCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for MemoryCollector {
    type Output = u8;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        Ok(memory_percent(&read_free(self.host.as_ref()).await))
    }
}

/// `UsedSwap`: share of swap in use from `free -t`, one decimal.
///
/// Hosts without swap report 0.
pub struct SwapCollector {
    host: Arc<dyn HostSource>,
}

impl SwapCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        SwapCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for SwapCollector {
    type Output = f64;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        Ok(swap_percent(&read_free(self.host.as_ref()).await))
    }
}
