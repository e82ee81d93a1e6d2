//! One-shot run: wait, collect, serialize, publish.
//!
//! ```text
//! startup delay ──> SnapshotAssembler ──> JSON ──> Publisher (once)
//! ```
//!
//! Every error is fatal for the run and is returned to the caller after
//! being logged. Nothing is retried.

use std::sync::Arc;

use sysprobe_mqtt::TransferError;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use super::{
    collectors::{CollectorError, Collectors},
    snapshot::SnapshotAssembler,
};
use crate::config::{metrics::MetricsConfig, StartupDelay};

/// Sends one serialized snapshot somewhere.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransferError>;
}

/// Publishes through a fresh MQTT session per call.
pub struct MqttPublisher {
    config: sysprobe_mqtt::Config,
}

impl MqttPublisher {
    pub fn new(config: sysprobe_mqtt::Config) -> Self {
        MqttPublisher { config }
    }
}

#[async_trait::async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransferError> {
        sysprobe_mqtt::publish_once(&self.config, topic, payload).await
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Metric collection failed: {0}")]
    Collect(#[from] CollectorError),

    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    Publish(#[from] TransferError),
}

/// What a successful run sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub topic: String,
    pub bytes: usize,
    pub keys: usize,
}

pub struct Executor {
    publisher: Arc<dyn Publisher>,
    collectors: Collectors,
    metrics: MetricsConfig,
    delay: StartupDelay,
    topic: String,
}

impl Executor {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        collectors: Collectors,
        metrics: MetricsConfig,
        topic: impl Into<String>,
    ) -> Self {
        Executor {
            publisher,
            collectors,
            metrics,
            delay: StartupDelay::default(),
            topic: topic.into(),
        }
    }

    pub fn with_delay(mut self, delay: StartupDelay) -> Self {
        self.delay = delay;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Runs the whole pipeline exactly once.
    #[instrument(skip(self), fields(topic = %self.topic))]
    pub async fn run_once(&self) -> Result<PublishReport, RunError> {
        let delay = self.delay.sample();
        if !delay.is_zero() {
            info!("Delaying start by {:.2}s", delay.as_secs_f64());
            sleep(delay).await;
        }

        let report = self.collect_and_publish().await;
        if let Err(e) = &report {
            error!("{}", e);
        }
        report
    }

    async fn collect_and_publish(&self) -> Result<PublishReport, RunError> {
        let sample = SnapshotAssembler::new(&self.collectors, &self.metrics)
            .assemble()
            .await?;

        let payload = sample.to_payload()?;
        let report = PublishReport {
            topic: self.topic.clone(),
            bytes: payload.len(),
            keys: sample.len(),
        };
        debug!(payload = %String::from_utf8_lossy(&payload), "Publishing snapshot");

        self.publisher.publish(&self.topic, payload).await?;

        info!(
            keys = report.keys,
            bytes = report.bytes,
            "Snapshot published to {}",
            report.topic
        );
        Ok(report)
    }
}

/// Configured delay in human-readable form, for the startup log.
pub fn describe_delay(delay: &StartupDelay) -> String {
    match *delay {
        StartupDelay::Fixed(secs) => format!("{}s", secs),
        StartupDelay::Range { min, max } => format!("random {}s..{}s", min, max),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tracing_test::traced_test;

    use super::*;
    use crate::core::{
        collectors::Metric,
        host::{testing::FakeHost, CommandOutput},
    };

    #[derive(Default)]
    struct MockPublisher {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait::async_trait]
    impl Publisher for MockPublisher {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransferError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    /// Refuses every publish and counts the attempts.
    #[derive(Default)]
    struct RefusingPublisher {
        attempts: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Publisher for RefusingPublisher {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), TransferError> {
            *self.attempts.lock().unwrap() += 1;
            Err(TransferError::ConnectionRefused("BadUserNamePassword".into()))
        }
    }

    fn host() -> FakeHost {
        FakeHost::new()
            .with_command("uptime", CommandOutput::ok("load average: 0.50, 0.40, 0.30"))
            .with_fs(1000, 250)
            .with_cpus(2)
    }

    fn executor(publisher: Arc<dyn Publisher>, metrics: MetricsConfig) -> Executor {
        Executor::new(
            publisher,
            Collectors::new(Arc::new(host())),
            metrics,
            "masoko/pi4",
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn test_run_once_publishes_single_snapshot() {
        let publisher = Arc::new(MockPublisher::default());
        let metrics = MetricsConfig::only(&[Metric::CpuLoad, Metric::UsedSpace]);

        let report = executor(publisher.clone(), metrics).run_once().await.unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (topic, payload) = &published[0];
        assert_eq!(topic, "masoko/pi4");
        assert_eq!(payload.as_slice(), br#"{"CPULoad":25.0,"UsedSpace":75}"#);

        assert_eq!(
            report,
            PublishReport {
                topic: "masoko/pi4".into(),
                bytes: payload.len(),
                keys: 2,
            }
        );
        assert!(logs_contain("Snapshot published to masoko/pi4"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_retried() {
        let publisher = Arc::new(RefusingPublisher::default());
        let metrics = MetricsConfig::only(&[Metric::UsedSpace]);

        let err = executor(publisher.clone(), metrics)
            .run_once()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Publish(TransferError::ConnectionRefused(_))
        ));
        assert_eq!(*publisher.attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_collection_failure_publishes_nothing() {
        let publisher = Arc::new(MockPublisher::default());
        let metrics = MetricsConfig::only(&[Metric::UsedSpace, Metric::Uptime]);

        let err = executor(publisher.clone(), metrics)
            .run_once()
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Collect(CollectorError::FileRead { .. })));
        assert!(publisher.published.lock().unwrap().is_empty());
        assert!(logs_contain("Metric collection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_delay_is_honoured() {
        let publisher = Arc::new(MockPublisher::default());
        let metrics = MetricsConfig::only(&[Metric::UsedSpace]);
        let executor =
            executor(publisher.clone(), metrics).with_delay(StartupDelay::Fixed(5.0));

        let start = tokio::time::Instant::now();
        executor.run_once().await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_still_published() {
        let publisher = Arc::new(MockPublisher::default());

        let report = executor(publisher.clone(), MetricsConfig::none())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.keys, 0);
        assert_eq!(publisher.published.lock().unwrap()[0].1, b"{}".to_vec());
    }

    #[test]
    fn test_describe_delay() {
        assert_eq!(describe_delay(&StartupDelay::Fixed(2.5)), "2.5s");
        assert_eq!(
            describe_delay(&StartupDelay::Range { min: 0.0, max: 15.0 }),
            "random 0s..15s"
        );
    }
}
