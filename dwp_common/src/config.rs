//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for the poller and the device list it consumes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dwp_common::config::{ConfigLoader, ConfigError, PollerConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = PollerConfig::load(Path::new("dwp_poll.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    CYCLE_END_THRESHOLD, CYCLE_START_THRESHOLD, CYCLE_TIMEOUT_SECS, DEFAULT_DATABASE_PATH,
    DEFAULT_DEVICES_FILE, DEFAULT_READER, GOOD_VALUE_MAX, GOOD_VALUE_MIN, MAX_BUFFER_SIZE, MODBUS_PORT,
    MODBUS_TIMEOUT_MS, MODBUS_UNIT_ID, POLL_INTERVAL_MS, PRUNE_INTERVAL_TICKS, SERVICE_NAME,
    STATS_INTERVAL_TICKS, STORE_WRITE_ATTEMPTS,
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
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "dwp-poll-hall-a"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    SERVICE_NAME.to_string()
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid or the file
///   cannot be read
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

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Poller sections ────────────────────────────────────────────────

/// `[poll]` section: scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSection {
    /// Fixed sleep between ticks [ms].
    pub interval_ms: u64,
    /// Ticks between pruning passes.
    pub prune_interval_ticks: u64,
    /// Ticks between per-device statistics reports.
    pub stats_interval_ticks: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_ms: POLL_INTERVAL_MS,
            prune_interval_ticks: PRUNE_INTERVAL_TICKS,
            stats_interval_ticks: STATS_INTERVAL_TICKS,
        }
    }
}

impl PollSection {
    /// Tick interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Which Modbus register table holds the sensor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Input registers (function 0x04).
    #[default]
    Input,
    /// Holding registers (function 0x03).
    Holding,
}

/// `[modbus]` section: field-bus access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModbusSection {
    /// TCP port of every controller.
    pub port: u16,
    /// Unit identifier.
    pub unit_id: u8,
    /// Connect/read timeout [ms].
    pub timeout_ms: u64,
    /// Register table to read from.
    pub register_kind: RegisterKind,
    /// Reader backend: `"modbus-tcp"` or `"simulation"`.
    pub reader: String,
}

impl Default for ModbusSection {
    fn default() -> Self {
        Self {
            port: MODBUS_PORT,
            unit_id: MODBUS_UNIT_ID,
            timeout_ms: MODBUS_TIMEOUT_MS,
            register_kind: RegisterKind::Input,
            reader: DEFAULT_READER.to_string(),
        }
    }
}

impl ModbusSection {
    /// Read timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[cycle]` section: detector thresholds and validation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleSection {
    /// Either sensor at or above this value starts a cycle.
    pub start_threshold: i16,
    /// Both sensors at or below this value end a cycle.
    pub end_threshold: i16,
    /// Lowest valid peak (inclusive).
    pub good_value_min: i16,
    /// Highest valid peak (inclusive).
    pub good_value_max: i16,
    /// Active cycles older than this are discarded [s].
    pub timeout_secs: u64,
    /// Active cycles with more samples than this are discarded.
    pub max_buffer_size: usize,
}

impl Default for CycleSection {
    fn default() -> Self {
        Self {
            start_threshold: CYCLE_START_THRESHOLD,
            end_threshold: CYCLE_END_THRESHOLD,
            good_value_min: GOOD_VALUE_MIN,
            good_value_max: GOOD_VALUE_MAX,
            timeout_secs: CYCLE_TIMEOUT_SECS,
            max_buffer_size: MAX_BUFFER_SIZE,
        }
    }
}

impl CycleSection {
    /// Cycle timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[store]` section: count record persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// SQLite database file.
    pub path: PathBuf,
    /// Write attempts per validated cycle.
    pub write_attempts: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            write_attempts: STORE_WRITE_ATTEMPTS,
        }
    }
}

/// Poller service configuration, loaded from `dwp_poll.toml`.
///
/// Every section is optional; omitted values fall back to
/// [`crate::consts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Shared service settings.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Scheduler timing.
    #[serde(default)]
    pub poll: PollSection,
    /// Field-bus access.
    #[serde(default)]
    pub modbus: ModbusSection,
    /// Cycle detection and validation.
    #[serde(default)]
    pub cycle: CycleSection,
    /// Count record persistence.
    #[serde(default)]
    pub store: StoreSection,
    /// Device list file, relative to the config file unless absolute.
    #[serde(default = "default_devices_file")]
    pub devices_file: PathBuf,
}

fn default_devices_file() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICES_FILE)
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            poll: PollSection::default(),
            modbus: ModbusSection::default(),
            cycle: CycleSection::default(),
            store: StoreSection::default(),
            devices_file: default_devices_file(),
        }
    }
}

impl PollerConfig {
    /// Validate the poller configuration.
    ///
    /// # Validation Rules
    /// 1. `service_name` not empty
    /// 2. `poll.interval_ms` > 0, `poll.prune_interval_ticks` > 0,
    ///    `poll.stats_interval_ticks` > 0
    /// 3. `modbus.timeout_ms` > 0, `modbus.reader` not empty
    /// 4. `cycle.end_threshold` < `cycle.start_threshold`
    /// 5. `cycle.good_value_min` <= `cycle.good_value_max`
    /// 6. `cycle.timeout_secs` > 0, `cycle.max_buffer_size` > 0
    /// 7. `store.write_attempts` > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.poll.interval_ms == 0 {
            return Err(invalid("poll.interval_ms must be greater than 0"));
        }
        if self.poll.prune_interval_ticks == 0 {
            return Err(invalid("poll.prune_interval_ticks must be greater than 0"));
        }
        if self.poll.stats_interval_ticks == 0 {
            return Err(invalid("poll.stats_interval_ticks must be greater than 0"));
        }
        if self.modbus.timeout_ms == 0 {
            return Err(invalid("modbus.timeout_ms must be greater than 0"));
        }
        if self.modbus.reader.trim().is_empty() {
            return Err(invalid("modbus.reader cannot be empty"));
        }

        let cycle = &self.cycle;
        if cycle.end_threshold >= cycle.start_threshold {
            return Err(ConfigError::ValidationError(format!(
                "cycle.end_threshold ({}) must be below cycle.start_threshold ({})",
                cycle.end_threshold, cycle.start_threshold
            )));
        }
        if cycle.good_value_min > cycle.good_value_max {
            return Err(ConfigError::ValidationError(format!(
                "cycle.good_value_min ({}) exceeds cycle.good_value_max ({})",
                cycle.good_value_min, cycle.good_value_max
            )));
        }
        if cycle.timeout_secs == 0 {
            return Err(invalid("cycle.timeout_secs must be greater than 0"));
        }
        if cycle.max_buffer_size == 0 {
            return Err(invalid("cycle.max_buffer_size must be greater than 0"));
        }

        if self.store.write_attempts == 0 {
            return Err(invalid("store.write_attempts must be greater than 0"));
        }

        Ok(())
    }

    /// Resolve `devices_file` against the directory of the config file.
    pub fn devices_path(&self, config_path: &Path) -> PathBuf {
        resolve_path(config_path.parent().unwrap_or(Path::new(".")), &self.devices_file)
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

/// Resolve a possibly relative path against a base directory.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, expected) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed: TestWrapper = toml::from_str(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, expected);
        }
    }

    #[test]
    fn test_log_level_maps_to_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Trace), tracing::Level::TRACE);
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "  ".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = PollerConfig::load(Path::new("/nonexistent/path/dwp_poll.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = PollerConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = PollerConfig::load(file.path()).unwrap();

        assert_eq!(config.shared.service_name, SERVICE_NAME);
        assert_eq!(config.poll.interval_ms, POLL_INTERVAL_MS);
        assert_eq!(config.modbus.port, MODBUS_PORT);
        assert_eq!(config.modbus.register_kind, RegisterKind::Input);
        assert_eq!(config.cycle, CycleSection::default());
        assert_eq!(config.store.write_attempts, STORE_WRITE_ATTEMPTS);
        assert_eq!(config.devices_file, PathBuf::from(DEFAULT_DEVICES_FILE));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: PollerConfig = toml::from_str(
            r#"
[cycle]
good_value_max = 40

[modbus]
register_kind = "holding"
"#,
        )
        .unwrap();

        assert_eq!(config.cycle.good_value_max, 40);
        assert_eq!(config.cycle.good_value_min, GOOD_VALUE_MIN);
        assert_eq!(config.modbus.register_kind, RegisterKind::Holding);
        assert_eq!(config.modbus.unit_id, MODBUS_UNIT_ID);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<PollerConfig, _> = toml::from_str("[poll]\ninterval = 5\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut config = PollerConfig::default();
        config.cycle.good_value_min = 50;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("good_value_min")
        ));
    }

    #[test]
    fn test_validate_rejects_end_threshold_at_start() {
        let mut config = PollerConfig::default();
        config.cycle.end_threshold = config.cycle.start_threshold;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = PollerConfig::default();
        config.poll.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PollerConfig::default();
        config.cycle.max_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = PollerConfig::default();
        config.store.write_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_devices_path_relative_to_config() {
        let config = PollerConfig::default();
        assert_eq!(
            config.devices_path(Path::new("/etc/dwp/dwp_poll.toml")),
            PathBuf::from("/etc/dwp/devices.toml")
        );

        let config = PollerConfig {
            devices_file: PathBuf::from("/srv/devices.toml"),
            ..PollerConfig::default()
        };
        assert_eq!(
            config.devices_path(Path::new("/etc/dwp/dwp_poll.toml")),
            PathBuf::from("/srv/devices.toml")
        );
    }
}
