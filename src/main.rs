use std::{
    process::{self, ExitCode},
    sync::{Arc, OnceLock},
};

use sysprobe::{
    config::Config,
    core::{
        collectors::{Collectors, Metric},
        executor::{describe_delay, Executor, MqttPublisher},
        host::HostIdentity,
    },
    logger::LoggerManager,
    print_error,
};
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

fn log_metrics_table(cfg: &Config) {
    let name_width = Metric::ALL
        .iter()
        .map(|m| m.config_name().len())
        .max()
        .unwrap_or(10)
        .max("Metric".len());
    let key_width = Metric::ALL
        .iter()
        .map(|m| m.key().len())
        .max()
        .unwrap_or(10)
        .max("Key".len());

    info!(
        "{:<nw$} | {:<kw$} | Status",
        "Metric",
        "Key",
        nw = name_width,
        kw = key_width
    );
    info!("{}-+-{}-+-{}", "-".repeat(name_width), "-".repeat(key_width), "-".repeat(8));

    for metric in Metric::ALL {
        let status = if cfg.metrics.is_enabled(metric) {
            "ENABLED"
        } else {
            "DISABLED"
        };
        info!(
            "{:<nw$} | {:<kw$} | {}",
            metric.config_name(),
            metric.key(),
            status,
            nw = name_width,
            kw = key_width
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cfg = config();

    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });

    info!("Starting sysprobe version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!(
        host = %cfg.mqtt.host,
        port = cfg.mqtt.port,
        tls = cfg.mqtt.tls.as_ref().is_some_and(|t| t.is_enabled()),
        client_auth = cfg.mqtt.tls.as_ref().is_some_and(|t| t.has_client_auth()),
        "Broker"
    );
    log_metrics_table(cfg);
    info!("Enabled metrics: [{}]", cfg.metrics.enabled_names().join(", "));

    let identity = match HostIdentity::resolve(&cfg.hostname) {
        Ok(identity) => identity,
        Err(e) => {
            error!("Failed to resolve hostname: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let executor = Executor::new(
        Arc::new(MqttPublisher::new(cfg.mqtt.clone())),
        Collectors::system(),
        cfg.metrics.clone(),
        cfg.mqtt.topic_for(identity.hostname()),
    )
    .with_delay(cfg.random_delay.clone());
    info!(
        "Publishing to {} (startup delay: {})",
        executor.topic(),
        describe_delay(&cfg.random_delay)
    );

    match executor.run_once().await {
        Ok(report) => {
            debug!(?report, "Run finished");
            ExitCode::SUCCESS
        }
        // Already logged by the executor.
        Err(_) => ExitCode::FAILURE,
    }
}
