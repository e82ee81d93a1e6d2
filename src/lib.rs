//! sysprobe: one-shot host metrics probe publishing to MQTT
//!
//! Each invocation reads a handful of operating-system and hardware
//! sensors (load, temperature, voltage, disk, memory, swap, clock speed,
//! uptime), assembles them into one JSON object and publishes it with QoS 1
//! to `<topic_prefix>/<hostname>`. It is meant to be started by a timer; an
//! optional random startup delay keeps a fleet from publishing at the same
//! instant.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with `validator` rules: metric flags,
//!   startup delay, hostname override, broker and logger settings.
//!
//! * `core`: Runtime components:
//!   - `host`: the `HostSource` seam over files, commands and `statvfs`
//!   - `collectors`: one reader per metric
//!   - `snapshot`: assembly into a `MetricSample` and JSON serialization
//!   - `executor`: delay, collect, publish once
//!
//! * `logger`: `tracing` subscriber setup: console (stderr) in compact,
//!   pretty or JSON format, plus optional systemd journald.
//!
//! The MQTT session itself lives in the `sysprobe-mqtt` workspace crate.

pub mod config;
pub mod core;
pub mod logger;
