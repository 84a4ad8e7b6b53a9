//! Register reader trait and transport error types.
//!
//! This module defines:
//! - `RegisterReader` trait - Interface for field-bus register access
//! - `TransportError` enum - Why a batched read could not complete
//! - `Endpoint` - Address of one controller
//! - `RegisterValues` - Result of one batched read

use crate::device::RegisterField;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error types for a batched register read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Host name could not be resolved to a socket address.
    #[error("cannot resolve {0}")]
    Resolve(String),

    /// TCP connection could not be established.
    #[error("connection to {endpoint} failed: {reason}")]
    Connect {
        /// Target endpoint.
        endpoint: String,
        /// OS error text.
        reason: String,
    },

    /// Connect or read did not finish within the configured timeout.
    #[error("timed out talking to {0}")]
    Timeout(String),

    /// Controller answered with a Modbus exception.
    #[error("modbus exception from {endpoint}: {code}")]
    Exception {
        /// Target endpoint.
        endpoint: String,
        /// Exception code text.
        code: String,
    },

    /// Response did not match the request.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed {
        /// Target endpoint.
        endpoint: String,
        /// What did not match.
        reason: String,
    },

    /// Any other I/O failure on an established connection.
    #[error("I/O error with {endpoint}: {reason}")]
    Io {
        /// Target endpoint.
        endpoint: String,
        /// OS error text.
        reason: String,
    },
}

/// Network address of one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Modbus unit identifier.
    pub unit_id: u8,
}

impl Endpoint {
    /// Build an endpoint.
    pub fn new(host: &str, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.to_string(),
            port,
            unit_id,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.host, self.port, self.unit_id)
    }
}

/// Values returned by one batched read, keyed by logical field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterValues(HashMap<RegisterField, i16>);

impl RegisterValues {
    /// Empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one field value.
    pub fn insert(&mut self, field: RegisterField, value: i16) {
        self.0.insert(field, value);
    }

    /// Value of a field, if it was read.
    pub fn get(&self, field: RegisterField) -> Option<i16> {
        self.0.get(&field).copied()
    }

    /// Value of a field, or `TransportError::Malformed` if it is absent.
    pub fn require(&self, field: RegisterField, endpoint: &Endpoint) -> Result<i16, TransportError> {
        self.get(field).ok_or_else(|| TransportError::Malformed {
            endpoint: endpoint.to_string(),
            reason: format!("response lacks {field}"),
        })
    }

    /// Number of fields read.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing was read.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(RegisterField, i16)> for RegisterValues {
    fn from_iter<I: IntoIterator<Item = (RegisterField, i16)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Trait defining field-bus register access.
///
/// The poller issues exactly one call per machine per tick.
///
/// # Contract
///
/// - All requested fields are read in one batched exchange, so the left and
///   right samples of a machine are time-aligned.
/// - Each call opens and closes its own connection; no state is kept between
///   calls.
/// - Each call completes or fails within the implementation's timeout.
pub trait RegisterReader {
    /// Returns the reader's identifier (e.g., "modbus-tcp").
    fn name(&self) -> &'static str;

    /// Read every `(field, address)` pair from `endpoint` as signed 16-bit values.
    ///
    /// # Errors
    /// Any `TransportError`; a response missing a requested field is
    /// `TransportError::Malformed`.
    fn read(
        &mut self,
        endpoint: &Endpoint,
        registers: &[(RegisterField, u16)],
    ) -> Result<RegisterValues, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout("10.0.0.1:503#1".to_string());
        assert!(err.to_string().contains("10.0.0.1:503"));

        let err = TransportError::Exception {
            endpoint: "plc".to_string(),
            code: "IllegalDataAddress".to_string(),
        };
        assert!(err.to_string().contains("IllegalDataAddress"));
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("10.0.0.1", 503, 1).to_string(), "10.0.0.1:503#1");
    }

    #[test]
    fn test_require_missing_field_is_malformed() {
        let endpoint = Endpoint::new("plc", 503, 1);
        let values: RegisterValues = [(RegisterField::SideLeft, -4)].into_iter().collect();

        assert_eq!(values.require(RegisterField::SideLeft, &endpoint), Ok(-4));
        assert!(matches!(
            values.require(RegisterField::SideRight, &endpoint),
            Err(TransportError::Malformed { .. })
        ));
    }
}
