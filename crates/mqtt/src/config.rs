//! Broker connection configuration.
//!
//! All fields carry `validator` rules and `#[serde(default)]`, so a TOML
//! section only needs to name what differs from the defaults:
//!
//! ```toml
//! host = "mqtt.home.local"
//! user = "probe"
//! password = "secret"
//! topic_prefix = "masoko"
//! ```
//!
//! Credentials are passed through to the broker untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// MQTT connection settings for a single publish.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port (1883 plain, 8883 TLS).
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Username sent in CONNECT. Empty disables authentication.
    pub user: String,

    /// Password sent in CONNECT.
    pub password: String,

    /// Prefix of the publish topic; the hostname is appended as the last level.
    #[validate(custom(function = "validate_topic_prefix"))]
    pub topic_prefix: String,

    /// MQTT client identifier. Empty means a random UUID per run.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Upper bound, in seconds, for connecting and for waiting on the PUBACK.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Whether the broker should retain the snapshot.
    pub retain: bool,

    /// Optional TLS transport. Absent means plain TCP.
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 1883,
            user: String::new(),
            password: String::new(),
            topic_prefix: "masoko".to_string(),
            client_id: String::new(),
            keep_alive: 30,
            connection_timeout: 10,
            retain: false,
            tls: None,
        }
    }
}

impl Config {
    /// Builds the publish topic `<topic_prefix>/<hostname>`.
    ///
    /// A trailing slash on the prefix is ignored; an empty prefix yields the
    /// bare hostname.
    pub fn topic_for(&self, hostname: &str) -> String {
        let prefix = self.topic_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            hostname.to_string()
        } else {
            format!("{}/{}", prefix, hostname)
        }
    }

    /// True when a username is configured.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }
}

/// Rejects wildcard characters, which are never valid in a publish topic.
fn validate_topic_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.contains(['+', '#']) {
        return Err(ValidationError::new("invalid_topic_prefix")
            .with_message("Topic prefix must not contain '+' or '#'".into()));
    }
    if prefix.len() > 255 {
        return Err(ValidationError::new("invalid_topic_prefix")
            .with_message("Topic prefix must not exceed 255 characters".into()));
    }
    Ok(())
}

/// TLS certificate paths. Files are checked when the client is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// CA certificate (PEM) used to verify the broker.
    pub ca_cert_path: Option<String>,

    /// Client certificate (PEM) for mutual TLS.
    pub client_cert_path: Option<String>,

    /// Client private key (PEM, unencrypted) for mutual TLS.
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    /// TLS with mutual authentication.
    pub fn new(
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: Some(client_cert_path.into()),
            client_key_path: Some(client_key_path.into()),
        }
    }

    /// TLS with server verification only.
    pub fn with_ca_only(ca_cert_path: impl Into<String>) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: None,
            client_key_path: None,
        }
    }

    pub fn has_client_auth(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.ca_cert_path.is_some()
    }

    /// Checks that the CA file exists and that client auth is either fully
    /// configured or absent.
    pub fn validate_config(&self) -> Result<(), ValidationError> {
        let ca = self.ca_cert_path.as_deref().ok_or_else(|| {
            ValidationError::new("missing_ca_cert")
                .with_message("CA certificate path is required".into())
        })?;
        validate_file_path(ca)?;

        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => {
                validate_file_path(cert)?;
                validate_file_path(key)?;
            }
            (None, None) => {}
            _ => {
                return Err(ValidationError::new("incomplete_client_auth").with_message(
                    "Both client certificate and key must be provided or neither".into(),
                ));
            }
        }

        Ok(())
    }
}

fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    let path_obj = Path::new(path);
    if !path_obj.is_file() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {}", path).into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 1883);
        assert!(!config.retain);
        assert!(!config.has_credentials());
    }

    #[test]
    fn topic_is_prefix_slash_hostname() {
        let config = Config {
            topic_prefix: "masoko".into(),
            ..Default::default()
        };
        assert_eq!(config.topic_for("raspberrypi"), "masoko/raspberrypi");
    }

    #[test]
    fn topic_ignores_trailing_slash_and_empty_prefix() {
        let mut config = Config {
            topic_prefix: "home/probes/".into(),
            ..Default::default()
        };
        assert_eq!(config.topic_for("pi4"), "home/probes/pi4");

        config.topic_prefix = String::new();
        assert_eq!(config.topic_for("pi4"), "pi4");
    }

    #[test]
    fn wildcard_prefix_is_rejected() {
        let config = Config {
            topic_prefix: "devices/+".into(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("topic_prefix"));
    }

    #[test]
    fn empty_host_and_zero_port_are_rejected() {
        let config = Config {
            host: String::new(),
            port: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("host"));
        assert!(fields.contains_key("port"));
    }

    #[test]
    fn deserializes_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            host = "broker.local"
            user = "probe"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 1883);
        assert!(config.has_credentials());
        assert!(config.tls.is_none());
    }

    #[test]
    fn tls_requires_existing_ca() {
        let tls = TlsConfig::with_ca_only("/nonexistent/ca.pem");
        assert!(tls.is_enabled());
        assert!(tls.validate_config().is_err());
    }

    #[test]
    fn tls_rejects_partial_client_auth() {
        let mut ca = tempfile::NamedTempFile::new().unwrap();
        ca.write_all(b"ca").unwrap();

        let tls = TlsConfig {
            ca_cert_path: Some(ca.path().to_string_lossy().into_owned()),
            client_cert_path: Some("/tmp/client.crt".into()),
            client_key_path: None,
        };
        assert!(!tls.has_client_auth());
        let err = tls.validate_config().unwrap_err();
        assert_eq!(err.code, "incomplete_client_auth");
    }

    #[test]
    fn tls_ca_only_with_existing_file_is_valid() {
        let mut ca = tempfile::NamedTempFile::new().unwrap();
        ca.write_all(b"ca").unwrap();

        let tls = TlsConfig::with_ca_only(ca.path().to_string_lossy());
        assert!(tls.validate_config().is_ok());
    }
}
