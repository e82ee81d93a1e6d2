use std::sync::Arc;

use super::{
    traits::DataProducer,
    types::{CollectorResult, Reading},
};
use crate::core::host::HostSource;

/// Parses `vcgencmd measure_volts` output such as `volt=1.2000V`.
pub fn parse_volts(output: &str) -> Option<f64> {
    let (_, value) = output.trim().split_once('=')?;
    let value = value.trim();
    let number = value.strip_suffix(['V', 'v']).unwrap_or(value);
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `Voltage`: core voltage reported by the VideoCore firmware.
///
/// Only Raspberry Pi firmware ships `vcgencmd`; elsewhere this is
/// `Unavailable`.
pub struct VoltageCollector {
    host: Arc<dyn HostSource>,
}

impl VoltageCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        VoltageCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for VoltageCollector {
    type Output = Reading<f64>;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let output = match self.host.run_command("vcgencmd", &["measure_volts"]).await {
            Ok(output) => output,
            Err(e) => return Ok(Reading::unavailable(format!("vcgencmd: {}", e))),
        };

        if !output.success {
            return Ok(Reading::unavailable("vcgencmd exited unsuccessfully"));
        }

        Ok(match parse_volts(&output.stdout) {
            Some(volts) => Reading::Available(volts),
            None => Reading::unavailable(format!(
                "unexpected vcgencmd output: {:?}",
                output.stdout.trim()
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::{testing::FakeHost, CommandOutput};

    #[test]
    fn test_parse_volts() {
        assert_eq!(parse_volts("volt=1.2000V\n"), Some(1.2));
        assert_eq!(parse_volts("volt=0.8563V"), Some(0.8563));
        assert_eq!(parse_volts("volt=1.35"), Some(1.35));
    }

    #[test]
    fn test_parse_volts_invalid() {
        assert_eq!(parse_volts(""), None);
        assert_eq!(parse_volts("1.2V"), None);
        assert_eq!(parse_volts("volt=V"), None);
        assert_eq!(parse_volts("error=2 error_msg=\"Command not registered\""), None);
    }

    #[tokio::test]
    async fn test_voltage_collector() {
        let host = FakeHost::new()
            .with_command("vcgencmd measure_volts", CommandOutput::ok("volt=1.2000V\n"));

        let reading = VoltageCollector::new(Arc::new(host)).produce().await.unwrap();
        assert_eq!(reading, Reading::Available(1.2));
    }

    #[tokio::test]
    async fn test_missing_vcgencmd_is_unavailable() {
        let reading = VoltageCollector::new(Arc::new(FakeHost::new()))
            .produce()
            .await
            .unwrap();
        assert!(!reading.is_available());
    }

    #[tokio::test]
    async fn test_failing_vcgencmd_is_unavailable() {
        let host = FakeHost::new().with_command("vcgencmd measure_volts", CommandOutput::failed());

        let reading = VoltageCollector::new(Arc::new(host)).produce().await.unwrap();
        assert_eq!(
            reading,
            Reading::unavailable("vcgencmd exited unsuccessfully")
        );
    }
}
