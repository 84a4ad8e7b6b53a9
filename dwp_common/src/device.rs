//! Device, line and machine model.
//!
//! The device list is maintained by an external system and is read-only to
//! the poller. A [`Device`] owns ordered [`LineConfig`]s, each listing the
//! [`MachineConfig`]s polled on that line.
//!
//! # TOML Example (`devices.toml`)
//!
//! ```toml
//! [[devices]]
//! id = 1
//! name = "DWP-01"
//! ip_address = "172.70.86.10"
//! is_active = true
//!
//! [[devices.lines]]
//! line = "g5"
//!
//! [[devices.lines.machines]]
//! name = "mc1"
//! addr_th_l = 0
//! addr_th_r = 1
//! addr_side_l = 2
//! addr_side_r = 3
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-machine configuration error.
///
/// Raised at poll time so that one malformed machine entry only fails that
/// machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Machine entry has no name.
    #[error("machine entry on line {line} has no name")]
    MissingName {
        /// Normalized line name.
        line: String,
    },

    /// Machine entry lacks one of its four register addresses.
    #[error("machine {machine} on line {line} has no {field} address")]
    MissingAddress {
        /// Normalized line name.
        line: String,
        /// Machine name.
        machine: String,
        /// The missing field.
        field: RegisterField,
    },

    /// Machine name does not carry a machine number.
    #[error("machine name {0:?} does not contain a machine number")]
    BadMachineName(String),
}

/// A press controller reachable over Modbus TCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Controller host or IP address.
    pub ip_address: String,
    /// Inactive devices are never polled.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Ordered line configurations.
    #[serde(default)]
    pub lines: Vec<LineConfig>,
}

fn default_true() -> bool {
    true
}

impl Device {
    /// Normalized names of every line on this device, in configuration order.
    pub fn line_names(&self) -> Vec<String> {
        self.lines.iter().map(LineConfig::normalized_name).collect()
    }

    /// Every cycle key this device can produce.
    pub fn cycle_keys(&self) -> impl Iterator<Item = CycleKey> + '_ {
        self.lines.iter().flat_map(|line_cfg| {
            let line = line_cfg.normalized_name();
            line_cfg.machines.iter().flat_map(move |machine| {
                let line = line.clone();
                Position::ALL
                    .into_iter()
                    .map(move |position| CycleKey::new(&line, &machine.name, position))
            })
        })
    }
}

/// One production line and the machines polled on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Line name as configured.
    pub line: String,
    /// Ordered machine list.
    #[serde(default)]
    pub machines: Vec<MachineConfig>,
}

impl LineConfig {
    /// Trimmed, upper-cased line name used as the line identity.
    pub fn normalized_name(&self) -> String {
        normalize_line(&self.line)
    }
}

/// Normalize a line name (trim + upper-case).
pub fn normalize_line(line: &str) -> String {
    line.trim().to_uppercase()
}

/// One press machine and its four sensor register addresses.
///
/// Fields are optional at parse time; [`MachineConfig::registers`] reports
/// what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine name, e.g. `"mc3"`.
    #[serde(default)]
    pub name: String,
    /// Toe/heel sensor, left position.
    #[serde(default)]
    pub addr_th_l: Option<u16>,
    /// Toe/heel sensor, right position.
    #[serde(default)]
    pub addr_th_r: Option<u16>,
    /// Side sensor, left position.
    #[serde(default)]
    pub addr_side_l: Option<u16>,
    /// Side sensor, right position.
    #[serde(default)]
    pub addr_side_r: Option<u16>,
}

impl MachineConfig {
    /// Field → register address map for one batched read.
    ///
    /// # Errors
    /// `DeviceError::MissingName` or `DeviceError::MissingAddress` if the
    /// entry is incomplete.
    pub fn registers(&self, line: &str) -> Result<[(RegisterField, u16); 4], DeviceError> {
        if self.name.trim().is_empty() {
            return Err(DeviceError::MissingName {
                line: line.to_string(),
            });
        }

        let pick = |field: RegisterField, addr: Option<u16>| {
            addr.map(|a| (field, a))
                .ok_or_else(|| DeviceError::MissingAddress {
                    line: line.to_string(),
                    machine: self.name.clone(),
                    field,
                })
        };

        Ok([
            pick(RegisterField::ToeHeelLeft, self.addr_th_l)?,
            pick(RegisterField::ToeHeelRight, self.addr_th_r)?,
            pick(RegisterField::SideLeft, self.addr_side_l)?,
            pick(RegisterField::SideRight, self.addr_side_r)?,
        ])
    }

    /// Machine number derived from the name.
    ///
    /// Leading and trailing `m`/`c` characters are stripped and the remainder
    /// parsed: `"mc12"` → 12.
    pub fn machine_number(&self) -> Result<u32, DeviceError> {
        self.name
            .trim()
            .trim_matches(|c| c == 'm' || c == 'c')
            .parse()
            .map_err(|_| DeviceError::BadMachineName(self.name.clone()))
    }
}

/// Logical name of one of the four sensor registers of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterField {
    /// Toe/heel sensor, left position.
    ToeHeelLeft,
    /// Toe/heel sensor, right position.
    ToeHeelRight,
    /// Side sensor, left position.
    SideLeft,
    /// Side sensor, right position.
    SideRight,
}

impl RegisterField {
    /// All fields in request order.
    pub const ALL: [RegisterField; 4] = [
        RegisterField::ToeHeelLeft,
        RegisterField::ToeHeelRight,
        RegisterField::SideLeft,
        RegisterField::SideRight,
    ];

    /// Stable snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToeHeelLeft => "toe_heel_left",
            Self::ToeHeelRight => "toe_heel_right",
            Self::SideLeft => "side_left",
            Self::SideRight => "side_right",
        }
    }

    /// The (toe/heel, side) field pair for a position.
    pub const fn pair_for(position: Position) -> (RegisterField, RegisterField) {
        match position {
            Position::Left => (Self::ToeHeelLeft, Self::SideLeft),
            Position::Right => (Self::ToeHeelRight, Self::SideRight),
        }
    }
}

impl fmt::Display for RegisterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Left or right side of a press, tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Left side, persisted as `"L"`.
    #[serde(rename = "L")]
    Left,
    /// Right side, persisted as `"R"`.
    #[serde(rename = "R")]
    Right,
}

impl Position {
    /// Both positions, left first.
    pub const ALL: [Position; 2] = [Position::Left, Position::Right];

    /// Single-letter code used in persisted records.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Identity of one independent cycle detector: `(line, machine, position)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CycleKey {
    /// Normalized line name.
    pub line: String,
    /// Machine name.
    pub machine: String,
    /// Press side.
    pub position: Position,
}

impl CycleKey {
    /// Build a key; `line` is normalized.
    pub fn new(line: &str, machine: &str, position: Position) -> Self {
        Self {
            line: normalize_line(line),
            machine: machine.to_string(),
            position,
        }
    }
}

impl fmt::Display for CycleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.line, self.machine, self.position)
    }
}

/// Root of `devices.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicesFile {
    /// Every configured device, active or not.
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl DevicesFile {
    /// Active devices only, in file order.
    pub fn active(self) -> Vec<Device> {
        self.devices.into_iter().filter(|d| d.is_active).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(name: &str) -> MachineConfig {
        MachineConfig {
            name: name.to_string(),
            addr_th_l: Some(10),
            addr_th_r: Some(11),
            addr_side_l: Some(12),
            addr_side_r: Some(13),
        }
    }

    #[test]
    fn machine_number_strips_prefix() {
        assert_eq!(machine("mc1").machine_number(), Ok(1));
        assert_eq!(machine("mc12").machine_number(), Ok(12));
        assert_eq!(machine(" 7 ").machine_number(), Ok(7));
    }

    #[test]
    fn machine_number_rejects_garbage() {
        assert_eq!(
            machine("press-a").machine_number(),
            Err(DeviceError::BadMachineName("press-a".to_string()))
        );
        assert!(machine("mc").machine_number().is_err());
    }

    #[test]
    fn registers_in_request_order() {
        let regs = machine("mc1").registers("G5").unwrap();
        assert_eq!(
            regs,
            [
                (RegisterField::ToeHeelLeft, 10),
                (RegisterField::ToeHeelRight, 11),
                (RegisterField::SideLeft, 12),
                (RegisterField::SideRight, 13),
            ]
        );
    }

    #[test]
    fn registers_report_missing_address() {
        let mut m = machine("mc2");
        m.addr_side_r = None;
        assert_eq!(
            m.registers("G5"),
            Err(DeviceError::MissingAddress {
                line: "G5".to_string(),
                machine: "mc2".to_string(),
                field: RegisterField::SideRight,
            })
        );
    }

    #[test]
    fn registers_report_missing_name() {
        let m = MachineConfig::default();
        assert!(matches!(
            m.registers("G5"),
            Err(DeviceError::MissingName { .. })
        ));
    }

    #[test]
    fn cycle_key_normalizes_line() {
        let key = CycleKey::new(" g5 ", "mc1", Position::Left);
        assert_eq!(key.line, "G5");
        assert_eq!(key.to_string(), "G5/mc1/L");
        assert_ne!(key, CycleKey::new("G5", "mc1", Position::Right));
    }

    #[test]
    fn device_enumerates_cycle_keys() {
        let device = Device {
            id: 1,
            name: "DWP-01".to_string(),
            ip_address: "127.0.0.1".to_string(),
            is_active: true,
            lines: vec![LineConfig {
                line: "g5".to_string(),
                machines: vec![machine("mc1"), machine("mc2")],
            }],
        };

        let keys: Vec<CycleKey> = device.cycle_keys().collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0], CycleKey::new("G5", "mc1", Position::Left));
        assert_eq!(keys[3], CycleKey::new("G5", "mc2", Position::Right));
        assert_eq!(device.line_names(), vec!["G5".to_string()]);
    }

    #[test]
    fn position_field_pairs() {
        assert_eq!(
            RegisterField::pair_for(Position::Left),
            (RegisterField::ToeHeelLeft, RegisterField::SideLeft)
        );
        assert_eq!(
            RegisterField::pair_for(Position::Right),
            (RegisterField::ToeHeelRight, RegisterField::SideRight)
        );
    }
}
