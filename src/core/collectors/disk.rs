use std::sync::Arc;

use super::{error::CollectorError, traits::DataProducer, types::CollectorResult};
use crate::core::host::{FsStats, HostSource};

pub const ROOT_MOUNT: &str = "/";

/// Percentage of the filesystem not available to unprivileged users,
/// truncated to an integer. A zero-sized filesystem reports 0.
pub fn used_space_percent(stats: &FsStats) -> u8 {
    if stats.total_bytes == 0 {
        return 0;
    }
    let free = stats.available_bytes as f64 / stats.total_bytes as f64 * 100.0;
    (100.0 - free).clamp(0.0, 100.0) as u8
}

/// `UsedSpace`: usage of the root filesystem.
pub struct UsedSpaceCollector {
    host: Arc<dyn HostSource>,
    /// Mount point passed to `statvfs`.
    mount: String,
}

impl UsedSpaceCollector {
    pub fn new(host: Arc<dyn HostSource>) -> Self {
        UsedSpaceCollector {
            host,
            mount: ROOT_MOUNT.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl DataProducer for UsedSpaceCollector {
    type Output = u8;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let stats = self
            .host
            .fs_stats(&self.mount)
            .await
            .map_err(|e| CollectorError::SystemCall {
                syscall: format!("statvfs({})", self.mount),
                reason: e.to_string(),
            })?;

        Ok(used_space_percent(&stats))
    }
}
