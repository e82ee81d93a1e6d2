//! Error type for the one-shot MQTT session.
//!
//! # Error Categories
//!
//! **Configuration** (fail before any network traffic):
//! - `ConfigError`: validator rejected the settings
//! - `ClientSetup`: TLS files missing or malformed
//! - `InvalidMetadata`: empty topic or wildcard in the publish topic
//!
//! **Runtime** (fatal for the run, never retried):
//! - `ConnectionRefused`: broker answered CONNACK with a refusal code
//! - `ClientConnection`: network-level failure (refused socket, TLS, EOF)
//! - `ClientTransfer`: the request could not be queued to the event loop
//! - `Timeout`: connect or acknowledgement took longer than configured

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Topic is empty or contains wildcard characters.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Client could not be built (usually TLS certificate problems).
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// Request could not be handed to the event loop.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// Connection to the broker failed or was lost.
    ///
    /// Boxed to keep the enum small.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// Broker rejected CONNECT (bad credentials, not authorized, ...).
    #[error("Connection refused by broker: {0}")]
    ConnectionRefused(String),

    /// A session stage did not complete within `connection_timeout`.
    #[error("Timed out after {secs}s while {stage}")]
    Timeout { stage: &'static str, secs: u64 },

    /// File I/O error (TLS certificate loading).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        match err {
            rumqttc::ConnectionError::ConnectionRefused(code) => {
                TransferError::ConnectionRefused(format!("{:?}", code))
            }
            other => TransferError::ClientConnection(Box::new(other)),
        }
    }
}
