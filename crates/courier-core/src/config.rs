//! Configuration loading and typed config structures for Courier.
//!
//! The canonical configuration lives in `courier-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and parses the file. Every
//! field has a default, so an empty file (or no file) is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `courier-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CourierConfig {
    /// Location store settings (staleness, queue sizes).
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Per-connection WebSocket session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CourierConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener:
    /// - `COURIER_HOST` overrides `http.host`
    /// - `COURIER_PORT` overrides `http.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.http.apply_env_overrides();
        Ok(config)
    }
}

/// Location store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackingConfig {
    /// Seconds without a report after which an entity counts as stale.
    /// Zero falls back to the default of five minutes.
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,

    /// Seconds between staleness sweeps of the tracked-entity map.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Depth of the incoming-sample queue.
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,

    /// Depth of the register/unregister queues.
    #[serde(default = "default_control_queue_capacity")]
    pub control_queue_capacity: usize,

    /// Depth of each subscriber's outbound queue.
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,

    /// Milliseconds a subscribe/unsubscribe call may wait for queue admission.
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,
}

impl TrackingConfig {
    /// Effective stale timeout.
    pub const fn stale_timeout(&self) -> Duration {
        if self.stale_timeout_secs == 0 {
            Duration::from_secs(default_stale_timeout_secs())
        } else {
            Duration::from_secs(self.stale_timeout_secs)
        }
    }

    /// Effective sweep interval (at least one second).
    pub const fn sweep_interval(&self) -> Duration {
        if self.sweep_interval_secs == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(self.sweep_interval_secs)
        }
    }

    /// Admission timeout for subscribe/unsubscribe (at least one
    /// millisecond).
    pub const fn control_timeout(&self) -> Duration {
        if self.control_timeout_ms == 0 {
            Duration::from_millis(1)
        } else {
            Duration::from_millis(self.control_timeout_ms)
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stale_timeout_secs: default_stale_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            ingest_queue_capacity: default_ingest_queue_capacity(),
            control_queue_capacity: default_control_queue_capacity(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
            control_timeout_ms: default_control_timeout_ms(),
        }
    }
}

/// WebSocket session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Seconds of outbound silence before a ping is sent.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Seconds without any inbound frame (pongs included) before the
    /// connection is considered dead.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds a single frame write may take.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl SessionConfig {
    /// Heartbeat interval (at least one second).
    pub const fn heartbeat_interval(&self) -> Duration {
        if self.heartbeat_interval_secs == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(self.heartbeat_interval_secs)
        }
    }

    /// Inbound idle window (at least one second).
    pub const fn idle_timeout(&self) -> Duration {
        if self.idle_timeout_secs == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(self.idle_timeout_secs)
        }
    }

    /// Per-write deadline (at least one second).
    pub const fn write_timeout(&self) -> Duration {
        if self.write_timeout_secs == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(self.write_timeout_secs)
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl HttpConfig {
    /// Override the listener address with environment variables when set.
    ///
    /// An unparseable `COURIER_PORT` is ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COURIER_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("COURIER_PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            self.port = port;
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_stale_timeout_secs() -> u64 {
    300
}

const fn default_sweep_interval_secs() -> u64 {
    30
}

const fn default_ingest_queue_capacity() -> usize {
    256
}

const fn default_control_queue_capacity() -> usize {
    32
}

const fn default_subscriber_queue_capacity() -> usize {
    256
}

const fn default_control_timeout_ms() -> u64 {
    1_000
}

const fn default_heartbeat_interval_secs() -> u64 {
    54
}

const fn default_idle_timeout_secs() -> u64 {
    60
}

const fn default_write_timeout_secs() -> u64 {
    10
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    String::from("info")
}
