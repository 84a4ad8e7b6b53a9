//! Poll statistics.
//!
//! Per-tick counters are folded into run totals; per-device counters track
//! how often a device was polled without any machine failing.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

/// Success/error counters of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceStats {
    /// Ticks in which every machine of the device was read.
    pub success_count: u64,
    /// Ticks in which at least one machine failed.
    pub error_count: u64,
    /// Time of the last successful poll.
    pub last_success: Option<Instant>,
    /// Time of the last failed poll.
    pub last_error: Option<Instant>,
}

impl DeviceStats {
    /// Record one poll outcome.
    pub fn record(&mut self, success: bool, now: Instant) {
        if success {
            self.success_count += 1;
            self.last_success = Some(now);
        } else {
            self.error_count += 1;
            self.last_error = Some(now);
        }
    }

    /// Total polls recorded.
    pub fn total(&self) -> u64 {
        self.success_count + self.error_count
    }

    /// Success rate in percent, 0 before the first poll.
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.success_count as f64 * 100.0 / total as f64,
        }
    }
}

/// Counters of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Records saved in this tick.
    pub saved: usize,
    /// Machine failures in this tick.
    pub errors: usize,
}

/// Run-level statistics.
#[derive(Debug, Clone, Default)]
pub struct PollStats {
    /// Completed ticks.
    pub ticks: u64,
    /// Records saved since start.
    pub total_saved: u64,
    /// Machine failures since start.
    pub total_errors: u64,
    devices: BTreeMap<String, DeviceStats>,
}

impl PollStats {
    /// Fold one device poll into the statistics.
    pub fn record_device(&mut self, device: &str, success: bool, now: Instant) {
        self.devices
            .entry(device.to_string())
            .or_default()
            .record(success, now);
    }

    /// Fold one tick into the run totals.
    pub fn record_tick(&mut self, tick: TickStats) {
        self.total_saved += tick.saved as u64;
        self.total_errors += tick.errors as u64;
    }

    /// Counters of one device, if it was ever polled.
    pub fn device(&self, name: &str) -> Option<&DeviceStats> {
        self.devices.get(name)
    }

    /// Per-device counters, ordered by device name.
    pub fn devices(&self) -> impl Iterator<Item = (&str, &DeviceStats)> {
        self.devices.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    /// Forget devices that are no longer polled.
    pub fn retain_devices(&mut self, active: &HashSet<String>) {
        self.devices.retain(|name, _| active.contains(name));
    }
}
