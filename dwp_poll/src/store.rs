//! SQLite count store.
//!
//! Records go to the `dwp_counts` table. Column names (`mechine` included)
//! stay compatible with the reporting side that reads the same table.

use dwp_common::device::Position;
use dwp_common::record::{CountRecord, Waveform};
use dwp_common::store::{CountStore, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dwp_counts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mechine INTEGER NOT NULL,
    line TEXT NOT NULL,
    count INTEGER NOT NULL,
    pv TEXT NOT NULL,
    position TEXT NOT NULL,
    duration INTEGER NOT NULL DEFAULT 0,
    incremental INTEGER NOT NULL DEFAULT 1,
    std_error TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_dwp_counts_line ON dwp_counts(line, id);
";

fn query_err(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn encode_err(e: serde_json::Error) -> StoreError {
    StoreError::Encode(e.to_string())
}

/// `CountStore` backed by one SQLite connection.
pub struct SqliteCountStore {
    conn: Connection,
}

impl SqliteCountStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Open(format!("{}: {}", path.display(), e)))?;
        let store = Self { conn };
        store.init_schema()?;
        debug!("Opened count store at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(|e| StoreError::Open(format!("schema: {}", e)))
    }

    /// Every record of `line`, oldest first.
    pub fn records_for_line(&self, line: &str) -> Result<Vec<CountRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT mechine, line, count, pv, position, duration, incremental, std_error
                 FROM dwp_counts WHERE line = ?1 ORDER BY id",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![line], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        rows.into_iter()
            .map(|(machine, line, count, pv, position, duration, incremental, std_error)| {
                let pv: Waveform = serde_json::from_str(&pv).map_err(encode_err)?;
                let std_error: [i32; 2] = serde_json::from_str(&std_error).map_err(encode_err)?;
                let position = match position.as_str() {
                    "L" => Position::Left,
                    "R" => Position::Right,
                    other => return Err(StoreError::Encode(format!("unknown position {other:?}"))),
                };
                Ok(CountRecord {
                    machine: to_unsigned(machine)?,
                    line,
                    count: to_unsigned(count)?,
                    pv,
                    position,
                    duration: to_unsigned(duration)?,
                    incremental: to_unsigned(incremental)?,
                    std_error,
                })
            })
            .collect()
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dwp_counts", [], |row| row.get(0))
            .map_err(query_err)?;
        to_unsigned(n)
    }
}

fn to_unsigned<T: TryFrom<i64>>(value: i64) -> Result<T, StoreError> {
    T::try_from(value).map_err(|_| StoreError::Encode(format!("column value {value} out of range")))
}

fn to_signed(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Encode(format!("count {value} out of range")))
}

impl CountStore for SqliteCountStore {
    fn latest_count(&self, line: &str) -> Result<Option<u64>, StoreError> {
        let latest: Option<i64> = self
            .conn
            .query_row(
                "SELECT count FROM dwp_counts WHERE line = ?1 ORDER BY id DESC LIMIT 1",
                params![line],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        latest.map(to_unsigned).transpose()
    }

    fn insert(&mut self, record: &CountRecord) -> Result<(), StoreError> {
        let pv = serde_json::to_string(&record.pv).map_err(encode_err)?;
        let std_error = serde_json::to_string(&record.std_error).map_err(encode_err)?;

        self.conn
            .execute(
                "INSERT INTO dwp_counts
                 (mechine, line, count, pv, position, duration, incremental, std_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.machine,
                    record.line,
                    to_signed(record.count)?,
                    pv,
                    record.position.code(),
                    record.duration,
                    record.incremental,
                    std_error,
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }
}
