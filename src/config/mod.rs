//! Application configuration loading and validation.
//!
//! The top-level `Config` aggregates the startup delay, host identity
//! override, metric enable flags, broker connection and logging settings.
//! It is loaded once before the logger is initialized and stays immutable
//! for the rest of the run.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use self::{logger::LoggerConfig, metrics::MetricsConfig};

pub mod logger;
pub mod metrics;

/// Timestamped stderr output used before the tracing subscriber exists.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// RFC 3339 UTC timestamp for the `print_*` macros.
#[doc(hidden)]
pub fn early_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SYSPROBE_CONFIG";

/// Fallback configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sysprobe/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Upper bound for `random_delay`, one day.
pub const MAX_DELAY_SECS: f64 = 86_400.0;

/// Pre-publish sleep used to spread a fleet of probes started by the same
/// schedule.
///
/// ```toml
/// random_delay = 2.5                      # fixed seconds
/// random_delay = { min = 0.0, max = 15 }  # uniform in [min, max)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartupDelay {
    Fixed(f64),
    Range { min: f64, max: f64 },
}

impl Default for StartupDelay {
    fn default() -> Self {
        StartupDelay::Fixed(0.0)
    }
}

impl StartupDelay {
    /// Picks the delay for this run.
    pub fn sample(&self) -> Duration {
        let secs = match *self {
            StartupDelay::Fixed(secs) => secs,
            StartupDelay::Range { min, max } if max > min => rand::rng().random_range(min..max),
            StartupDelay::Range { min, .. } => min,
        };
        Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS)).unwrap_or_default()
    }
}

fn validate_delay(delay: &StartupDelay) -> Result<(), ValidationError> {
    let in_bounds = |secs: f64| (0.0..=MAX_DELAY_SECS).contains(&secs);
    let valid = match *delay {
        StartupDelay::Fixed(secs) => in_bounds(secs),
        StartupDelay::Range { min, max } => in_bounds(min) && in_bounds(max) && min <= max,
    };
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_delay");
        err.message = Some(
            format!(
                "Delay must be between 0 and {}s and min must not exceed max",
                MAX_DELAY_SECS
            )
            .into(),
        );
        Err(err)
    }
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone)]
#[serde(default)]
pub struct Config {
    /// Sleep before collecting anything.
    #[validate(custom(function = "validate_delay"))]
    pub random_delay: StartupDelay,

    /// Hostname used in the topic. `"auto"` resolves the machine hostname.
    #[validate(length(min = 1, message = "Hostname must not be empty, use \"auto\""))]
    pub hostname: String,

    /// Which metrics end up in the snapshot.
    pub metrics: MetricsConfig,

    /// Broker connection.
    #[validate(nested)]
    pub mqtt: sysprobe_mqtt::Config,

    /// Logging subsystem.
    #[validate(nested)]
    pub logger: LoggerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            random_delay: StartupDelay::default(),
            hostname: "auto".to_string(),
            metrics: MetricsConfig::default(),
            mqtt: sysprobe_mqtt::Config::default(),
            logger: LoggerConfig::default(),
        }
    }
}

impl Config {
    /// Locates and loads the configuration file.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load(&config_path)
    }

    /// `SYSPROBE_CONFIG` first, then `/etc/sysprobe/config.toml`.
    fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Ok(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Ok(fallback.to_path_buf());
        }

        Err(ConfigError::Config(format!(
            "No configuration file found, set {} or create {}",
            CONFIG_ENV, DEFAULT_CONFIG_PATH
        )))
    }

    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "Configuration file does not exist: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        Self::parse(&config_str)
    }

    /// Parses and validates TOML text.
    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}
