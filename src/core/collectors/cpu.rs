use std::sync::Arc;

use tracing::{debug, trace};

use super::{
    error::CollectorError,
    traits::DataProducer,
    types::{round_to, CollectorResult},
};
use crate::core::host::HostSource;

const LOAD_AVERAGE_MARKER: &str = "load average:";
pub const CPU_FREQ_PATH: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Extracts the one-minute load average from `uptime` output.
///
/// ```text
///  10:02:11 up 3 days,  1:04,  2 users,  load average: 0.52, 0.58, 0.59
/// ```
///
/// Some locales print the value with a decimal comma (`0,52, 0,58, 0,59`),
/// so the first field is the text before `", "` with commas turned into dots.
pub fn parse_load_average(output: &str) -> CollectorResult<f64> {
    let (_, rest) = output
        .split_once(LOAD_AVERAGE_MARKER)
        .ok_or_else(|| CollectorError::InvalidFormat {
            location: "uptime".to_string(),
            reason: format!("missing '{}'", LOAD_AVERAGE_MARKER),
        })?;

    let first = rest.split(", ").next().unwrap_or_default();
    let normalized: String = first
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    normalized
        .parse::<f64>()
        .map_err(|_| CollectorError::ParseError {
            metric: "load_average".to_string(),
            location: "uptime".to_string(),
            reason: format!("invalid value: {:?}", first.trim()),
        })
}

/// Load average as a percentage of the available cores, one decimal.
pub fn cpu_load_percent(load: f64, cores: usize) -> f64 {
    round_to(load / cores.max(1) as f64 * 100.0, 1)
}

/// `CPULoad`: one-minute load average relative to the logical core count.
pub struct CpuLoadCollector {
    host: Arc<dyn HostSource>,
}

impl CpuLoadCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        CpuLoadCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for CpuLoadCollector {
    type Output = f64;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let output = self
            .host
            .run_command("uptime", &[])
            .await
            .map_err(|source| CollectorError::CommandExecution {
                command: "uptime".to_string(),
                source,
            })?;

        if !output.success {
            return Err(CollectorError::CommandFailed {
                command: "uptime".to_string(),
            });
        }

        let load = parse_load_average(&output.stdout)?;
        let cores = self.host.logical_cpus();
        let percent = cpu_load_percent(load, cores);

        trace!(load, cores, percent, "CPU load computed");
        Ok(percent)
    }
}

/// Parses `scaling_cur_freq` (kHz) into whole MHz.
///
/// Ties round to even, like `printf "%.0f"`: 600500 kHz is 600 MHz.
pub fn parse_clock_speed(content: &str) -> CollectorResult<u32> {
    let khz = content
        .trim()
        .parse::<f64>()
        .map_err(|_| CollectorError::ParseError {
            metric: "scaling_cur_freq".to_string(),
            location: CPU_FREQ_PATH.to_string(),
            reason: format!("invalid value: {:?}", content.trim()),
        })?;

    if !khz.is_finite() || khz < 0.0 {
        return Err(CollectorError::InvalidFormat {
            location: CPU_FREQ_PATH.to_string(),
            reason: format!("frequency out of range: {}", khz),
        });
    }

    Ok((khz / 1000.0).round_ties_even() as u32)
}

/// `ClockSpeed`: current frequency of cpu0 in MHz.
pub struct ClockSpeedCollector {
    host: Arc<dyn HostSource>,
}

impl ClockSpeedCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        ClockSpeedCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for ClockSpeedCollector {
    type Output = u32;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let content = self
            .host
            .read_to_string(CPU_FREQ_PATH)
            .await
            .map_err(|source| CollectorError::FileRead {
                path: CPU_FREQ_PATH.to_string(),
                source,
            })?;

        parse_clock_speed(&content)
    }
}

/// Value of the first `/proc/cpuinfo` line mentioning `Model`.
///
/// Raspberry Pi kernels expose `Model : Raspberry Pi 4 Model B Rev 1.4`.
/// Most x86 hosts have no such line and yield an empty string.
pub fn parse_model_name(cpuinfo: &str) -> String {
    cpuinfo
        .lines()
        .find(|line| line.contains("Model"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}

/// `ModelName`: board model string, empty when unknown.
pub struct ModelNameCollector {
    host: Arc<dyn HostSource>,
}

impl ModelNameCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        ModelNameCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for ModelNameCollector {
    type Output = String;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        match self.host.read_to_string(CPUINFO_PATH).await {
            Ok(content) => Ok(parse_model_name(&content)),
            Err(e) => {
                debug!("Cannot read {}: {}", CPUINFO_PATH, e);
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::{testing::FakeHost, CommandOutput};

    const UPTIME_OUTPUT: &str =
        " 10:02:11 up 3 days,  1:04,  2 users,  load average: 1.00, 0.50, 0.25\n";

    #[test]
    fn test_parse_load_average() {
        assert_eq!(parse_load_average(UPTIME_OUTPUT).unwrap(), 1.0);
    }

    #[test]
    fn test_parse_load_average_with_decimal_comma() {
        let output = " 10:02:11 up 1 day,  2 users,  load average: 0,52, 0,58, 0,59";
        assert_eq!(parse_load_average(output).unwrap(), 0.52);
    }

    #[test]
    fn test_parse_load_average_busybox_format() {
        let output = " 10:02:11 up 1 day,  0:01,  load average: 2.10, 1.00, 0.40";
        assert_eq!(parse_load_average(output).unwrap(), 2.1);
    }

    #[test]
    fn test_parse_load_average_missing_marker() {
        let err = parse_load_average("garbage").unwrap_err();
        assert!(matches!(err, CollectorError::InvalidFormat { .. }));
    }

    #[test]
    fn test_parse_load_average_invalid_value() {
        let err = parse_load_average("load average: n/a").unwrap_err();
        assert!(matches!(err, CollectorError::ParseError { .. }));
    }

    #[test]
    fn test_cpu_load_percent() {
        assert_eq!(cpu_load_percent(1.0, 4), 25.0);
        assert_eq!(cpu_load_percent(1.0, 3), 33.3);
        assert_eq!(cpu_load_percent(0.5, 0), 50.0);
    }

    #[tokio::test]
    async fn test_cpu_load_collector() {
        let host = FakeHost::new()
            .with_command("uptime", CommandOutput::ok(UPTIME_OUTPUT))
            .with_cpus(4);

        let load = CpuLoadCollector::new(Arc::new(host)).produce().await.unwrap();
        assert_eq!(load, 25.0);
    }

    #[tokio::test]
    async fn test_cpu_load_collector_missing_command_is_fatal() {
        let err = CpuLoadCollector::new(Arc::new(FakeHost::new()))
            .produce()
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::CommandExecution { .. }));
    }

    #[tokio::test]
    async fn test_cpu_load_collector_failed_command_is_fatal() {
        let host = FakeHost::new().with_command("uptime", CommandOutput::failed());
        let err = CpuLoadCollector::new(Arc::new(host))
            .produce()
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::CommandFailed { .. }));
    }

    #[test]
    fn test_parse_clock_speed() {
        assert_eq!(parse_clock_speed("1500000\n").unwrap(), 1500);
        assert_eq!(parse_clock_speed("600500").unwrap(), 600);
        assert_eq!(parse_clock_speed("601500").unwrap(), 602);
        assert_eq!(parse_clock_speed("600501").unwrap(), 601);
        assert_eq!(parse_clock_speed("799499").unwrap(), 799);
    }

    #[test]
    fn test_parse_clock_speed_invalid() {
        assert!(parse_clock_speed("").is_err());
        assert!(parse_clock_speed("fast").is_err());
        assert!(parse_clock_speed("-1").is_err());
    }

    #[tokio::test]
    async fn test_clock_speed_collector_missing_file_is_fatal() {
        let err = ClockSpeedCollector::new(Arc::new(FakeHost::new()))
            .produce()
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::FileRead { .. }));
    }

    #[tokio::test]
    async fn test_clock_speed_collector() {
        let host = FakeHost::new().with_file(CPU_FREQ_PATH, "1800000\n");
        let mhz = ClockSpeedCollector::new(Arc::new(host))
            .produce()
            .await
            .unwrap();
        assert_eq!(mhz, 1800);
    }

    #[test]
    fn test_parse_model_name_raspberry_pi() {
        let cpuinfo = "processor\t: 0\nBogoMIPS\t: 108.00\n\
                       Hardware\t: BCM2835\nRevision\t: c03114\n\
                       Model\t\t: Raspberry Pi 4 Model B Rev 1.4\n";
        assert_eq!(parse_model_name(cpuinfo), "Raspberry Pi 4 Model B Rev 1.4");
    }

    #[test]
    fn test_parse_model_name_absent() {
        let cpuinfo = "processor\t: 0\nmodel name\t: Intel(R) Core(TM) i7\n";
        assert_eq!(parse_model_name(cpuinfo), "");
    }

    #[tokio::test]
    async fn test_model_name_collector_unreadable_is_empty() {
        let name = ModelNameCollector::new(Arc::new(FakeHost::new()))
            .produce()
            .await
            .unwrap();
        assert!(name.is_empty());
    }
}
