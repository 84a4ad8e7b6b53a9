//! Count record store trait and error types.

use crate::record::CountRecord;
use thiserror::Error;

/// Error types for count record persistence.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Store could not be opened or its schema created.
    #[error("failed to open store: {0}")]
    Open(String),

    /// A query or insert failed.
    #[error("store query failed: {0}")]
    Query(String),

    /// A record field could not be encoded.
    #[error("failed to encode record: {0}")]
    Encode(String),
}

/// Durable storage for count records.
///
/// Records are append-only; the latest record of a line carries the line's
/// cumulative total and seeds the poller on restart.
pub trait CountStore {
    /// Cumulative count of the most recent record for `line`, if any.
    fn latest_count(&self, line: &str) -> Result<Option<u64>, StoreError>;

    /// Append one record.
    fn insert(&mut self, record: &CountRecord) -> Result<(), StoreError>;
}
