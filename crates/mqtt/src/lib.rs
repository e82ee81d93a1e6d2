//! # sysprobe-mqtt: one-shot MQTT publishing
//!
//! A small transport crate built on top of `rumqttc`. Unlike a long-running
//! client it owns exactly one connection for exactly one message:
//!
//! ```text
//! open ──> CONNECT/CONNACK ──> PUBLISH (QoS 1) ──> PUBACK ──> DISCONNECT
//! ```
//!
//! Every failure along the way (refused connection, rejected credentials,
//! timeout) is returned to the caller as a [`TransferError`]. Nothing is
//! retried and nothing is buffered.
//!
//! # Quick Start
//!
//! ```ignore
//! use sysprobe_mqtt::{publish_once, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> sysprobe_mqtt::Result<()> {
//!     let config = Config {
//!         host: "mqtt.example.com".into(),
//!         topic_prefix: "devices".into(),
//!         ..Default::default()
//!     };
//!     let topic = config.topic_for("raspberrypi");
//!     publish_once(&config, &topic, br#"{"CPULoad":12.5}"#.to_vec()).await
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! host = "mqtt.example.com"
//! port = 1883
//! user = "probe"
//! password = "secret"
//! topic_prefix = "devices"
//! connection_timeout = 10
//!
//! [tls]
//! ca_cert_path = "/etc/mqtt/ca.pem"
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::ClientBuilder;
pub use config::{Config, TlsConfig};
pub use error::TransferError;
pub use session::{publish_once, MqttSession};

/// Result type for MQTT operations.
pub type Result<T> = std::result::Result<T, TransferError>;
