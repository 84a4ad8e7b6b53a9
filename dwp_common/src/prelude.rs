//! Prelude module for common re-exports.
//!
//! ```rust
//! use dwp_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, CycleSection, LogLevel, PollerConfig, RegisterKind, SharedConfig,
};

// ─── Device model ───────────────────────────────────────────────────
pub use crate::device::{
    CycleKey, Device, DeviceError, DevicesFile, LineConfig, MachineConfig, Position, RegisterField,
};

// ─── Records ────────────────────────────────────────────────────────
pub use crate::record::{CountRecord, Waveform};

// ─── Contracts ──────────────────────────────────────────────────────
pub use crate::reader::{Endpoint, RegisterReader, RegisterValues, TransportError};
pub use crate::store::{CountStore, StoreError};
