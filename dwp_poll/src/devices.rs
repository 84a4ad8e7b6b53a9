//! Active device sources.

use crate::error::PollError;
use dwp_common::config::ConfigLoader;
use dwp_common::device::{Device, DevicesFile};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Supplies the currently active devices.
///
/// Consulted at startup and again on every pruning pass, so edits to the
/// underlying list are picked up without a restart.
pub trait DeviceSource {
    /// Active devices in configuration order.
    ///
    /// # Errors
    /// `PollError::Config` if the list cannot be read.
    fn active_devices(&self) -> Result<Vec<Device>, PollError>;
}

/// Device list read from a `devices.toml` file on every call.
#[derive(Debug, Clone)]
pub struct TomlDeviceSource {
    path: PathBuf,
}

impl TomlDeviceSource {
    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceSource for TomlDeviceSource {
    fn active_devices(&self) -> Result<Vec<Device>, PollError> {
        let file = DevicesFile::load(&self.path)?;
        let total = file.devices.len();
        let active = file.active();
        trace!(
            "Loaded {} device(s) from {}, {} active",
            total,
            self.path.display(),
            active.len()
        );
        Ok(active)
    }
}

/// Fixed in-memory list.
impl DeviceSource for Vec<Device> {
    fn active_devices(&self) -> Result<Vec<Device>, PollError> {
        Ok(self.iter().filter(|d| d.is_active).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwp_common::config::ConfigError;
    use std::fs;
    use tempfile::TempDir;

    const DEVICES: &str = r#"
[[devices]]
id = 1
name = "DWP-01"
ip_address = "172.70.86.10"

[[devices.lines]]
line = " g5 "

[[devices.lines.machines]]
name = "mc1"
addr_th_l = 0
addr_th_r = 1
addr_side_l = 2
addr_side_r = 3

[[devices]]
id = 2
name = "DWP-02"
ip_address = "172.70.86.11"
is_active = false
"#;

    #[test]
    fn toml_source_filters_inactive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devices.toml");
        fs::write(&path, DEVICES).unwrap();

        let devices = TomlDeviceSource::new(&path).active_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "DWP-01");
        assert_eq!(devices[0].line_names(), vec!["G5".to_string()]);
    }

    #[test]
    fn toml_source_rereads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devices.toml");
        fs::write(&path, DEVICES).unwrap();
        let source = TomlDeviceSource::new(&path);
        assert_eq!(source.active_devices().unwrap().len(), 1);

        fs::write(&path, DEVICES.replace("is_active = false", "is_active = true")).unwrap();
        assert_eq!(source.active_devices().unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_config_error() {
        let source = TomlDeviceSource::new("/nonexistent/devices.toml");
        assert!(matches!(
            source.active_devices(),
            Err(PollError::Config(ConfigError::FileNotFound))
        ));
    }
}
