//! PollCore struct and poll loop management.
//!
//! The `PollCore` struct owns all poller state: the active device list, the
//! detector bank, the recorder with its cumulative totals, and run
//! statistics. It drives the fixed-interval tick loop until the running flag
//! is cleared.

use crate::clock::Clock;
use crate::detector::DetectorBank;
use crate::devices::DeviceSource;
use crate::error::PollError;
use crate::orchestrator::{poll_device, PollContext};
use crate::recorder::CycleRecorder;
use crate::stats::{PollStats, TickStats};
use dwp_common::config::PollerConfig;
use dwp_common::device::{CycleKey, Device};
use dwp_common::reader::RegisterReader;
use dwp_common::store::CountStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Lifecycle of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Constructed; devices not yet loaded.
    Initializing,
    /// Devices loaded and lines seeded; ticking.
    Running,
}

/// Outcome of one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Detector states dropped.
    pub cycle_states: usize,
    /// Line totals dropped.
    pub lines: usize,
    /// Lines seeded for the first time.
    pub seeded: usize,
}

/// Poll Core manages the device list and the poll loop.
pub struct PollCore {
    /// Service configuration
    config: PollerConfig,
    /// Field-bus reader
    reader: Box<dyn RegisterReader>,
    /// Where the active device list comes from
    source: Box<dyn DeviceSource>,
    /// Time source for ticks and cycle timeouts
    clock: Box<dyn Clock>,
    /// Devices polled each tick
    devices: Vec<Device>,
    /// Per-position cycle detectors
    detectors: DetectorBank,
    /// Validation, persistence and cumulative totals
    recorder: CycleRecorder,
    /// Run statistics
    stats: PollStats,
    /// Lifecycle state
    state: PollerState,
    /// Running flag for loop control
    running: Arc<AtomicBool>,
}

impl PollCore {
    /// Create a new PollCore.
    ///
    /// # Errors
    /// Returns `PollError::Config` if configuration validation fails.
    pub fn new(
        config: PollerConfig,
        reader: Box<dyn RegisterReader>,
        store: Box<dyn CountStore>,
        source: Box<dyn DeviceSource>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, PollError> {
        config.validate()?;

        let recorder = CycleRecorder::new(store, &config.cycle, config.store.write_attempts);
        info!(
            "PollCore created: reader={}, interval={}ms, window=[{}, {}]",
            reader.name(),
            config.poll.interval_ms,
            config.cycle.good_value_min,
            config.cycle.good_value_max
        );

        Ok(Self {
            config,
            reader,
            source,
            clock,
            devices: Vec::new(),
            detectors: DetectorBank::new(),
            recorder,
            stats: PollStats::default(),
            state: PollerState::Initializing,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Load the active devices and seed every line's cumulative total.
    ///
    /// # Errors
    /// `PollError::NoActiveDevices` if the source lists none; source and
    /// store errors are passed through.
    pub fn init(&mut self) -> Result<(), PollError> {
        let devices = self.source.active_devices()?;
        if devices.is_empty() {
            return Err(PollError::NoActiveDevices);
        }

        info!("✓ Poller started - monitoring {} devices", devices.len());
        for device in &devices {
            debug!(
                "  → {} ({}) - Lines: {}",
                device.name,
                device.ip_address,
                device.line_names().join(", ")
            );
            for line in device.line_names() {
                let count = self.recorder.seed_line(&line)?;
                trace!("Initialized line {} with last cumulative: {}", line, count);
            }
        }

        self.devices = devices;
        self.state = PollerState::Running;
        Ok(())
    }

    /// Run one tick: poll every device, sleep the fixed interval, then run
    /// the periodic statistics report and pruning pass when due.
    ///
    /// # Errors
    /// `PollError::NotInitialized` before [`PollCore::init`] succeeded.
    pub fn tick(&mut self) -> Result<TickStats, PollError> {
        if self.state != PollerState::Running {
            return Err(PollError::NotInitialized);
        }

        let started = self.clock.now();
        let mut tick = TickStats::default();

        for device in &self.devices {
            debug!("→ Polling {} ({})", device.name, device.ip_address);
            let now = self.clock.now();
            let mut ctx = PollContext {
                reader: self.reader.as_mut(),
                detectors: &mut self.detectors,
                recorder: &mut self.recorder,
                cycle: &self.config.cycle,
                modbus: &self.config.modbus,
                now,
            };
            let report = poll_device(device, &mut ctx);
            tick.saved += report.saved;
            tick.errors += report.failed;
            self.stats.record_device(&device.name, report.is_success(), now);
        }

        self.stats.record_tick(tick);
        if tick.saved > 0 || tick.errors > 0 {
            let elapsed = self.clock.now().saturating_duration_since(started);
            debug!(
                "Cycle #{}: {} new readings saved, {} errors, {:.2}ms",
                self.stats.ticks,
                tick.saved,
                tick.errors,
                elapsed.as_secs_f64() * 1000.0
            );
        }

        self.clock.sleep(self.config.poll.interval());
        self.stats.ticks += 1;

        if self.stats.ticks % self.config.poll.stats_interval_ticks == 0 {
            self.report_device_stats();
        }
        if self.stats.ticks % self.config.poll.prune_interval_ticks == 0 {
            self.prune();
        }

        Ok(tick)
    }

    /// Run ticks until the running flag is cleared.
    ///
    /// The tick in progress when the flag clears is completed.
    pub fn run(&mut self) -> Result<(), PollError> {
        if self.state != PollerState::Running {
            return Err(PollError::NotInitialized);
        }

        info!(
            "Starting poll loop ({} devices, interval={}ms)...",
            self.devices.len(),
            self.config.poll.interval_ms
        );
        while self.running.load(Ordering::SeqCst) {
            self.tick()?;
        }

        info!(
            "Poll loop stopped after {} ticks: {} readings saved, {} errors",
            self.stats.ticks, self.stats.total_saved, self.stats.total_errors
        );
        Ok(())
    }

    /// Refresh the device list and drop state of lines and machines that are
    /// no longer configured.
    ///
    /// A source that cannot be read, or that lists no active device, leaves
    /// everything as it was.
    pub fn prune(&mut self) -> PruneReport {
        let devices = match self.source.active_devices() {
            Ok(devices) if devices.is_empty() => {
                warn!("Device refresh returned no active devices; keeping current list");
                return PruneReport::default();
            }
            Ok(devices) => devices,
            Err(e) => {
                warn!("Skipping prune, cannot refresh devices: {}", e);
                return PruneReport::default();
            }
        };

        let keys: HashSet<CycleKey> = devices.iter().flat_map(Device::cycle_keys).collect();
        let lines: HashSet<String> = devices.iter().flat_map(Device::line_names).collect();
        let names: HashSet<String> = devices.iter().map(|d| d.name.clone()).collect();

        let mut report = PruneReport {
            cycle_states: self.detectors.retain_keys(&keys),
            lines: self.recorder.retain_lines(&lines),
            seeded: 0,
        };
        self.stats.retain_devices(&names);

        for line in &lines {
            if self.recorder.cumulative(line).is_some() {
                continue;
            }
            match self.recorder.seed_line(line) {
                Ok(count) => {
                    report.seeded += 1;
                    info!("New line {} seeded with cumulative {}", line, count);
                }
                Err(e) => warn!("Cannot seed line {}: {}", line, e),
            }
        }

        if devices.len() != self.devices.len() {
            info!(
                "Device list refreshed: {} -> {} devices",
                self.devices.len(),
                devices.len()
            );
        }
        self.devices = devices;

        debug!(
            "Cleanup performed: {} cycle states and {} line totals pruned, {} active cycles",
            report.cycle_states,
            report.lines,
            self.detectors.active_count()
        );
        report
    }

    fn report_device_stats(&self) {
        for (name, stats) in self.stats.devices() {
            debug!(
                "Device {} stats: {:.1}% success rate ({}/{})",
                name,
                stats.success_rate(),
                stats.success_count,
                stats.total()
            );
        }
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Lifecycle state.
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Devices polled each tick.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Run statistics.
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Detector states.
    pub fn detectors(&self) -> &DetectorBank {
        &self.detectors
    }

    /// In-memory cumulative total of a line.
    pub fn cumulative(&self, line: &str) -> Option<u64> {
        self.recorder.cumulative(line)
    }
}
