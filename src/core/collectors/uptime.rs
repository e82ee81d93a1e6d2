use std::sync::Arc;

use super::{error::CollectorError, traits::DataProducer, types::CollectorResult};
use crate::core::host::HostSource;

pub const PROC_UPTIME: &str = "/proc/uptime";
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Whole days since boot from `/proc/uptime`.
///
/// The file holds two values, uptime and accumulated idle time, both in
/// seconds: `123456.78 987654.32`. Only the first one is used.
pub fn uptime_days(content: &str) -> CollectorResult<u64> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| CollectorError::InvalidFormat {
            location: PROC_UPTIME.to_string(),
            reason: "Expected at least 1 field".to_string(),
        })?;

    let seconds = first
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| CollectorError::ParseError {
            metric: "uptime_seconds".to_string(),
            location: PROC_UPTIME.to_string(),
            reason: format!("invalid value: {}", first),
        })?;

    Ok((seconds / SECONDS_PER_DAY).floor() as u64)
}

/// `UptimeDays`: whole days since boot, read from `/proc/uptime`.
pub struct UptimeCollector {
    host: Arc<dyn HostSource>,
}

impl UptimeCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        UptimeCollector { host }
    }
}

#[async_trait::async_trait]
impl DataProducer for UptimeCollector {
    type Output = u64;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let content = self
            .host
            .read_to_string(PROC_UPTIME)
            .await
            .map_err(|source| CollectorError::FileRead {
                path: PROC_UPTIME.to_string(),
                source,
            })?;

        uptime_days(&content)
    }
}
