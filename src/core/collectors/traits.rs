use super::types::CollectorResult;

/// Contract shared by every sensor reader.
///
/// A producer performs whatever host access it needs through its
/// `HostSource` and returns one normalized value. Hard failures are
/// `CollectorError`s; sensors that may be absent wrap their output in
/// `Reading`.
#[async_trait::async_trait]
pub trait DataProducer: Send + Sync + 'static {
    /// The normalized value this reader returns.
    type Output: Send + Sync + 'static;

    async fn produce(&self) -> CollectorResult<Self::Output>;
}
