//! MQTT client builder.
//!
//! Wraps rumqttc's `MqttOptions` construction: credentials, keep-alive,
//! client id and the TCP/TLS transport. The builder is consumed by
//! [`ClientBuilder::build`], which returns the `AsyncClient` used to queue
//! requests and the `EventLoop` that actually talks to the broker.
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::new("probe", "localhost", 1883)
//!     .credentials("user", "password")
//!     .build()?;
//! ```

use std::{fs, time::Duration};

use rumqttc::{AsyncClient, EventLoop, MqttOptions, TlsConfiguration, Transport};
use validator::Validate;

use super::{
    config::{Config, TlsConfig},
    error::TransferError,
};

/// One publish plus one disconnect never need more room than this.
const REQUEST_CHANNEL_CAPACITY: usize = 4;

pub struct ClientBuilder {
    opts: MqttOptions,
    tls_config: Option<TlsConfig>,
}

impl ClientBuilder {
    /// Creates a builder for a plain TCP connection with a clean session.
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_clean_session(true);
        Self {
            opts,
            tls_config: None,
        }
    }

    /// Creates a builder from validated configuration.
    ///
    /// An empty `client_id` is replaced by a random UUID so that a fleet of
    /// probes never collides on the broker.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;

        let client_id = if config.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.client_id.clone()
        };

        let mut builder = Self::new(client_id, config.host.clone(), config.port)
            .keep_alive(config.keep_alive);

        if config.has_credentials() {
            builder = builder.credentials(config.user.clone(), config.password.clone());
        }

        builder.tls_config = config.tls.clone().filter(TlsConfig::is_enabled);

        Ok(builder)
    }

    /// Mutual TLS with client certificate and key.
    pub fn with_tls(
        mut self,
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        self.tls_config = Some(TlsConfig::new(
            ca_cert_path,
            client_cert_path,
            client_key_path,
        ));
        self
    }

    /// TLS verifying the broker only.
    pub fn with_tls_ca_only(mut self, ca_cert_path: impl Into<String>) -> Self {
        self.tls_config = Some(TlsConfig::with_ca_only(ca_cert_path));
        self
    }

    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    /// Username and password sent in the CONNECT packet.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.set_credentials(username, password);
        self
    }

    pub fn client_id(&self) -> String {
        self.opts.client_id()
    }

    fn load_file(path: &str) -> Result<Vec<u8>, TransferError> {
        Ok(fs::read(path)?)
    }

    fn build_tls_transport(tls_config: &TlsConfig) -> Result<Transport, TransferError> {
        tls_config
            .validate_config()
            .map_err(|e| TransferError::ClientSetup(format!("Invalid TLS configuration: {}", e)))?;

        let ca_path = tls_config
            .ca_cert_path
            .as_deref()
            .ok_or_else(|| TransferError::ClientSetup("TLS configuration is not set".into()))?;
        let ca = Self::load_file(ca_path)?;

        let client_auth = match (&tls_config.client_cert_path, &tls_config.client_key_path) {
            (Some(cert), Some(key)) => Some((Self::load_file(cert)?, Self::load_file(key)?)),
            _ => None,
        };

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            client_auth,
            alpn: None,
        }))
    }

    /// Builds the client and its event loop. No network traffic happens
    /// until the event loop is polled.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let transport = match &self.tls_config {
            Some(tls) => Self::build_tls_transport(tls)?,
            None => Transport::Tcp,
        };

        let mut opts = self.opts;
        opts.set_transport(transport);

        Ok(AsyncClient::new(opts, REQUEST_CHANNEL_CAPACITY))
    }
}
