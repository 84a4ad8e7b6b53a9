//! Poller error type.

use dwp_common::config::ConfigError;
use dwp_common::device::DeviceError;
use dwp_common::reader::TransportError;
use dwp_common::store::StoreError;
use thiserror::Error;

/// Top-level error of the poller.
///
/// `NoActiveDevices`, `Config`, `ReaderNotFound` and `Store` are fatal at
/// startup. The per-machine variants are caught by the orchestrator and
/// counted.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    /// Startup found no active device to poll.
    #[error("no active DWP devices found")]
    NoActiveDevices,

    /// Ticking was requested before a successful `init`.
    #[error("poller not initialized")]
    NotInitialized,

    /// Service or device configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A machine entry is malformed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Register read failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A validated cycle could not be persisted; it is lost.
    #[error("failed to persist count for line {line} after {attempts} attempt(s): {source}")]
    Persistence {
        /// Normalized line name.
        line: String,
        /// Write attempts made.
        attempts: u32,
        /// Last store error.
        #[source]
        source: StoreError,
    },

    /// `[modbus].reader` names no registered reader.
    #[error("register reader not found: {0}")]
    ReaderNotFound(String),

    /// A reader name was registered twice.
    #[error("register reader '{0}' is already registered")]
    ReaderAlreadyRegistered(&'static str),

    /// Store could not be opened or queried.
    #[error(transparent)]
    Store(#[from] StoreError),
}
