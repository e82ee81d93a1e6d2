//! Snapshot assembly and serialization.
//!
//! The assembler visits the enabled metrics in a fixed order, runs the
//! matching reader and stores the value under its published key. Optional
//! sensors that report [`Reading::Unavailable`] are resolved by the
//! configured [`UnavailablePolicy`]; any reader error aborts assembly.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::collectors::{
    registry::{TEMP_UNIT, TEMP_UNIT_KEY},
    CollectorError, CollectorResult, Collectors, DataProducer, Metric, Reading,
};
use crate::config::metrics::{MetricsConfig, UnavailablePolicy};

/// A single JSON value in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float(f64),
    Integer(u64),
    Text(String),
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        MetricValue::Integer(value.into())
    }
}

impl From<u8> for MetricValue {
    fn from(value: u8) -> Self {
        MetricValue::Integer(value.into())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

/// Key/value pairs published in one message. Sorted by key so the payload
/// is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSample(BTreeMap<&'static str, MetricValue>);

impl MetricSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<MetricValue>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON object, e.g. `{"CPULoad":12.5,"UsedSpace":41}`.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Builds a [`MetricSample`] from the enabled metrics.
pub struct SnapshotAssembler<'a> {
    collectors: &'a Collectors,
    config: &'a MetricsConfig,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(collectors: &'a Collectors, config: &'a MetricsConfig) -> Self {
        SnapshotAssembler { collectors, config }
    }

    #[instrument(skip(self), fields(policy = ?self.config.unavailable))]
    pub async fn assemble(&self) -> CollectorResult<MetricSample> {
        let mut sample = MetricSample::new();

        for metric in self.config.enabled_metrics() {
            self.collect_into(metric, &mut sample)
                .await
                .inspect_err(|e| warn!(metric = %metric, "Reader failed: {}", e))?;
        }

        debug!(keys = sample.len(), "Snapshot assembled");
        Ok(sample)
    }

    async fn collect_into(&self, metric: Metric, sample: &mut MetricSample) -> CollectorResult<()> {
        let c = self.collectors;
        match metric {
            Metric::CpuLoad => {
                let percent = finite(metric, c.cpu_load.produce().await?)?;
                sample.insert(metric.key(), percent)
            }
            Metric::UsedSpace => sample.insert(metric.key(), c.used_space.produce().await?),
            Metric::ClockSpeed => sample.insert(metric.key(), c.clock_speed.produce().await?),
            Metric::Swap => {
                let percent = finite(metric, c.swap.produce().await?)?;
                sample.insert(metric.key(), percent)
            }
            Metric::Memory => sample.insert(metric.key(), c.memory.produce().await?),
            Metric::Uptime => sample.insert(metric.key(), c.uptime.produce().await?),
            Metric::ModelName => sample.insert(metric.key(), c.model_name.produce().await?),
            Metric::Voltage => {
                let reading = c.voltage.produce().await?;
                if let Some(volts) = self.resolve(metric, reading) {
                    sample.insert(metric.key(), volts);
                }
            }
            Metric::CpuTemperature => {
                let reading = c.cpu_temperature.produce().await?;
                if let Some(degrees) = self.resolve(metric, reading) {
                    sample.insert(metric.key(), degrees);
                    sample.insert(TEMP_UNIT_KEY, TEMP_UNIT);
                }
            }
        }
        Ok(())
    }

    /// Applies the unavailable policy. `None` means the metric's keys are
    /// left out.
    fn resolve(&self, metric: Metric, reading: Reading<f64>) -> Option<f64> {
        let reason = match reading {
            Reading::Available(value) if value.is_finite() => return Some(value),
            Reading::Available(value) => format!("non-finite value {}", value),
            Reading::Unavailable(reason) => reason,
        };

        match self.config.unavailable {
            UnavailablePolicy::Zero => {
                warn!(metric = %metric, "Sensor unavailable ({}), publishing 0", reason);
                Some(0.0)
            }
            UnavailablePolicy::Omit => {
                warn!(metric = %metric, "Sensor unavailable ({}), omitting", reason);
                None
            }
        }
    }
}

fn finite(metric: Metric, value: f64) -> CollectorResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CollectorError::InvalidFormat {
            location: metric.config_name().to_string(),
            reason: format!("non-finite value {}", value),
        })
    }
}
