//! # DWP Poll Library
//!
//! Press cycle poller with pluggable register readers.
//!
//! This crate provides the poller binary and its building blocks: a
//! per-position cycle detector, a validating count recorder on top of a
//! SQLite store, and the fixed-interval scheduler. Readers implement the
//! `RegisterReader` trait defined in `dwp_common::reader`.
//!
//! # Module Structure
//!
//! - [`core`] - PollCore struct, lifecycle and tick loop
//! - [`orchestrator`] - One poll pass over a device
//! - [`detector`] - Per-position cycle state machine
//! - [`recorder`] - Peak validation and count recording
//! - [`readers`] - Register reader implementations and registry
//! - [`store`] - SQLite count store
//! - [`devices`] - Active device sources
//! - [`stats`] - Tick and per-device statistics
//! - [`clock`] - Injectable time source
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     dwp_poll (single crate)                      │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ DeviceSource│───►│  PollCore    │◄──►│  Reader Registry    │  │
//! │  │ devices.toml│    │ (tick loop)  │    │  modbus-tcp / sim   │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │ per device                          │
//! │                            ▼                                     │
//! │   RegisterReader ──► DetectorBank ──► CycleRecorder ──► SQLite   │
//! │   (1 read/machine)   (L and R)        (peak window)     store    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod clock;
pub mod core;
pub mod detector;
pub mod devices;
pub mod error;
pub mod orchestrator;
pub mod readers;
pub mod recorder;
pub mod stats;
pub mod store;

// Re-export key types for convenience
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::{PollCore, PollerState, PruneReport};
pub use crate::devices::{DeviceSource, TomlDeviceSource};
pub use crate::error::PollError;
pub use crate::readers::ReaderRegistry;
pub use crate::store::SqliteCountStore;
