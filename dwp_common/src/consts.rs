//! System-wide constants for the DWP workspace.
//!
//! Single source of truth for protocol defaults and cycle-detection limits.
//! Configuration defaults in [`crate::config`] are built from these values.

/// Canonical service name (used for logging and the default config).
pub const SERVICE_NAME: &str = "dwp-poll";

// ─── Polling ────────────────────────────────────────────────────────

/// Fixed sleep between poll ticks [ms].
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Ticks between pruning passes over stale machine-position state.
pub const PRUNE_INTERVAL_TICKS: u64 = 1000;

/// Ticks between per-device success-rate reports.
pub const STATS_INTERVAL_TICKS: u64 = 100;

// ─── Modbus ─────────────────────────────────────────────────────────

/// Default Modbus TCP port of the press controllers.
pub const MODBUS_PORT: u16 = 503;

/// Unit identifier addressed on every controller.
pub const MODBUS_UNIT_ID: u8 = 1;

/// Bounded read timeout [ms].
pub const MODBUS_TIMEOUT_MS: u64 = 2000;

/// Reader backend used unless the config names another.
pub const DEFAULT_READER: &str = "modbus-tcp";

/// Maximum number of registers in one Modbus read request.
pub const MAX_REGISTERS_PER_READ: u16 = 125;

// ─── Cycle detection ────────────────────────────────────────────────

/// A cycle starts when either sensor reaches this value.
pub const CYCLE_START_THRESHOLD: i16 = 10;

/// A cycle ends when both sensors fall to or below this value.
pub const CYCLE_END_THRESHOLD: i16 = 0;

/// Lowest acceptable peak for a valid press (inclusive).
pub const GOOD_VALUE_MIN: i16 = 30;

/// Highest acceptable peak for a valid press (inclusive).
pub const GOOD_VALUE_MAX: i16 = 45;

/// An active cycle older than this is discarded [s].
pub const CYCLE_TIMEOUT_SECS: u64 = 30;

/// An active cycle holding more samples than this is discarded.
pub const MAX_BUFFER_SIZE: usize = 100;

// ─── Persistence ────────────────────────────────────────────────────

/// Default SQLite database path for count records.
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/dwp/counts.db";

/// Default device configuration file name (relative to the config file).
pub const DEFAULT_DEVICES_FILE: &str = "devices.toml";

/// Default service configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dwp/dwp_poll.toml";

/// Store write attempts per validated cycle before the cycle is dropped.
pub const STORE_WRITE_ATTEMPTS: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(CYCLE_END_THRESHOLD < CYCLE_START_THRESHOLD);
        assert!(GOOD_VALUE_MIN <= GOOD_VALUE_MAX);
        assert!(GOOD_VALUE_MIN > CYCLE_START_THRESHOLD);
        assert!(MAX_BUFFER_SIZE > 0);
        assert!(POLL_INTERVAL_MS > 0);
        assert!(STORE_WRITE_ATTEMPTS > 0);
    }

    #[test]
    fn timeout_trips_before_overflow_at_default_rate() {
        assert!(MAX_BUFFER_SIZE as u64 * POLL_INTERVAL_MS >= CYCLE_TIMEOUT_SECS * 1000);
    }
}
