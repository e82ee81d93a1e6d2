use std::sync::Arc;

use tracing::trace;

use super::{
    traits::DataProducer,
    types::{CollectorResult, Reading},
};
use crate::core::host::{file_name, HostSource};

pub const THERMAL_ROOT: &str = "/sys/class/thermal";

/// Converts a sysfs `temp` value (millidegrees Celsius) to whole degrees.
///
/// The fractional part is truncated, so `48312` becomes `48.0`.
pub fn parse_millidegrees(content: &str) -> Option<f64> {
    let milli = content.trim().parse::<i64>().ok()?;
    Some((milli / 1000) as f64)
}

/// `CPUTemperature`: reading of the last thermal zone, in °C.
///
/// Zones are visited in name order and the last one with a readable,
/// numeric `temp` file wins. Hosts without thermal zones (most VMs and
/// containers) report `Unavailable`.
pub struct CpuTemperatureCollector {
    host: Arc<dyn HostSource>,
    /// Directory holding `thermal_zone*` entries, `/sys/class/thermal` by default.
    root: String,
}

impl CpuTemperatureCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        Self::with_root(host, THERMAL_ROOT)
    }

    pub fn with_root(host: Arc<dyn HostSource>, root: impl Into<String>) -> Self {
        CpuTemperatureCollector {
            host,
            root: root.into(),
        }
    }
}

#[async_trait::async_trait]
impl DataProducer for CpuTemperatureCollector {
    type Output = Reading<f64>;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let mut zones = match self.host.list_dir(&self.root).await {
            Ok(entries) => entries
                .into_iter()
                .filter(|name| name.starts_with("thermal_zone"))
                .collect::<Vec<_>>(),
            Err(e) => {
                return Ok(Reading::unavailable(format!(
                    "cannot list {}: {}",
                    self.root, e
                )))
            }
        };
        zones.sort();

        let mut last = None;
        for zone in &zones {
            let path = format!("{}/{}/temp", self.root, zone);
            match self.host.read_to_string(&path).await {
                Ok(content) => match parse_millidegrees(&content) {
                    Some(degrees) => {
                        trace!(zone = %zone, degrees, "Thermal zone read");
                        last = Some(degrees);
                    }
                    None => trace!(zone = %zone, "Unparsable {} value", file_name(&path)),
                },
                Err(e) => trace!(zone = %zone, "Cannot read {}: {}", path, e),
            }
        }

        Ok(match last {
            Some(degrees) => Reading::Available(degrees),
            None if zones.is_empty() => Reading::unavailable("no thermal zones"),
            None => Reading::unavailable("no readable thermal zone"),
        })
    }
}
