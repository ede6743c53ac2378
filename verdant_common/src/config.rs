//! Configuration loading traits and types.
//!
//! Every section of [`VerdantConfig`] has defaults, so an empty file (or a
//! missing one, at the binary's discretion) yields a runnable configuration.
//!
//! # Usage
//!
//! ```rust,no_run
//! use verdant_common::config::{ConfigError, ConfigLoader, VerdantConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = VerdantConfig::load(Path::new("verdant.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_DATA_DIR, DEFAULT_ENVIRONMENT_RECORD_INTERVAL_S, DEFAULT_GROUP_AVERAGE_WINDOW,
    DEFAULT_IOT_INTERVAL_S, DEFAULT_LOAD_TIMEOUT_S, DEFAULT_NETWORK_INTERVAL_S,
    DEFAULT_PROBE_ADDRESS, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_RESOURCE_INTERVAL_S,
    DEFAULT_SETUP_POLL_MS, DEFAULT_SNAPSHOT_INTERVAL_MS, DEFAULT_TICK_MS,
    DEFAULT_UPGRADE_INTERVAL_S,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common fields shared by every Verdant binary.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "verdant-chamber-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier, shown in logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "verdant".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where reference data, snapshots and history live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

/// Polling cadences and wait policies.
///
/// The boot wait (`setup_poll_ms`) is unbounded; only reconfiguration
/// teardown has a deadline (`load_timeout_s`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: u64,
    pub snapshot_interval_ms: u64,
    pub environment_record_interval_s: u64,
    pub setup_poll_ms: u64,
    pub load_timeout_s: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            snapshot_interval_ms: DEFAULT_SNAPSHOT_INTERVAL_MS,
            environment_record_interval_s: DEFAULT_ENVIRONMENT_RECORD_INTERVAL_S,
            setup_poll_ms: DEFAULT_SETUP_POLL_MS,
            load_timeout_s: DEFAULT_LOAD_TIMEOUT_S,
        }
    }
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    pub fn environment_record_interval(&self) -> Duration {
        Duration::from_secs(self.environment_record_interval_s)
    }

    pub fn setup_poll(&self) -> Duration {
        Duration::from_millis(self.setup_poll_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("tick_ms", self.tick_ms),
            ("snapshot_interval_ms", self.snapshot_interval_ms),
            (
                "environment_record_interval_s",
                self.environment_record_interval_s,
            ),
            ("setup_poll_ms", self.setup_poll_ms),
            ("load_timeout_s", self.load_timeout_s),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "timing.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Sensor merge policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Group samples kept before the rolling average is reseeded.
    pub group_average_window: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            group_average_window: DEFAULT_GROUP_AVERAGE_WINDOW,
        }
    }
}

/// Hardware access options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Run peripherals against simulated hardware.
    pub simulate: bool,
}

/// Housekeeping actors started alongside the recipe engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    /// `host:port` probed for connectivity.
    pub probe_address: String,
    pub probe_timeout_ms: u64,
    pub network_interval_s: u64,
    pub iot_interval_s: u64,
    pub resource_interval_s: u64,
    pub upgrade_interval_s: u64,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            probe_address: DEFAULT_PROBE_ADDRESS.to_string(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            network_interval_s: DEFAULT_NETWORK_INTERVAL_S,
            iot_interval_s: DEFAULT_IOT_INTERVAL_S,
            resource_interval_s: DEFAULT_RESOURCE_INTERVAL_S,
            upgrade_interval_s: DEFAULT_UPGRADE_INTERVAL_S,
        }
    }
}

impl SatelliteConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_address.is_empty() {
            return Err(ConfigError::ValidationError(
                "satellites.probe_address cannot be empty".to_string(),
            ));
        }
        let fields = [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("network_interval_s", self.network_interval_s),
            ("iot_interval_s", self.iot_interval_s),
            ("resource_interval_s", self.resource_interval_s),
            ("upgrade_interval_s", self.upgrade_interval_s),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "satellites.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration of the chamber controller.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "verdant-chamber-01"
///
/// [storage]
/// data_dir = "/var/lib/verdant"
///
/// [timing]
/// load_timeout_s = 10
///
/// [aggregation]
/// group_average_window = 20
///
/// [hardware]
/// simulate = true
///
/// [satellites]
/// probe_address = "1.1.1.1:53"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdantConfig {
    pub shared: SharedConfig,
    pub storage: StorageConfig,
    pub timing: TimingConfig,
    pub aggregation: AggregationConfig,
    pub hardware: HardwareConfig,
    pub satellites: SatelliteConfig,
}

impl VerdantConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for an empty service name,
    /// a zero interval or a zero aggregation window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.timing.validate()?;
        self.satellites.validate()?;
        if self.aggregation.group_average_window == 0 {
            return Err(ConfigError::ValidationError(
                "aggregation.group_average_window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
