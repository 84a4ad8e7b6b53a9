//! DWP Common Library
//!
//! This crate provides shared constants, configuration loading and the
//! device/record model for the DWP press cycle poller.
//!
//! # Module Structure
//!
//! - [`consts`] - Protocol defaults and cycle-detection limits
//! - [`config`] - Configuration loading traits and types
//! - [`device`] - Devices, lines, machines and cycle keys
//! - [`record`] - Waveforms and persisted count records
//! - [`reader`] - Register reader trait and transport errors
//! - [`store`] - Count store trait and persistence errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use dwp_common::prelude::*;
//!
//! let key = CycleKey::new("g5", "mc1", Position::Left);
//! assert_eq!(key.line, "G5");
//! ```

pub mod config;
pub mod consts;
pub mod device;
pub mod prelude;
pub mod reader;
pub mod record;
pub mod store;
