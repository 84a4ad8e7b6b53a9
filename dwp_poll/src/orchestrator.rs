//! Per-device poll pass.
//!
//! For each machine of a device: one batched register read, then the left
//! and right samples go through their detectors and, on completion, the
//! recorder. A failing machine is logged and counted; the rest of the
//! device still gets polled.

use crate::detector::{CycleEvent, DetectorBank, Sample};
use crate::error::PollError;
use crate::recorder::CycleRecorder;
use dwp_common::config::{CycleSection, ModbusSection};
use dwp_common::device::{CycleKey, Device, MachineConfig, Position, RegisterField};
use dwp_common::reader::{Endpoint, RegisterReader};
use std::time::Instant;
use tracing::{debug, error};

/// Mutable poller state lent to one device pass.
pub struct PollContext<'a> {
    /// Field-bus reader.
    pub reader: &'a mut dyn RegisterReader,
    /// Detector states.
    pub detectors: &'a mut DetectorBank,
    /// Validator and count store.
    pub recorder: &'a mut CycleRecorder,
    /// Detector thresholds.
    pub cycle: &'a CycleSection,
    /// Port and unit id of the controllers.
    pub modbus: &'a ModbusSection,
    /// Tick time for every sample of this pass.
    pub now: Instant,
}

/// Result of polling one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceReport {
    /// Records saved.
    pub saved: usize,
    /// Machines polled.
    pub machines: usize,
    /// Machines that failed.
    pub failed: usize,
    /// Validated cycles whose record could not be persisted.
    pub lost: usize,
}

impl DeviceReport {
    /// No machine failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Controller address of a device.
pub fn endpoint_for(device: &Device, modbus: &ModbusSection) -> Endpoint {
    Endpoint::new(device.ip_address.trim(), modbus.port, modbus.unit_id)
}

/// Poll every machine of `device` once.
pub fn poll_device(device: &Device, ctx: &mut PollContext<'_>) -> DeviceReport {
    let endpoint = endpoint_for(device, ctx.modbus);
    let mut report = DeviceReport::default();

    for line_cfg in &device.lines {
        let line = line_cfg.normalized_name();
        for machine in &line_cfg.machines {
            report.machines += 1;
            match read_machine(&endpoint, &line, machine, ctx) {
                Ok((number, samples)) => {
                    let (saved, lost) = run_positions(&line, machine, number, samples, ctx);
                    report.saved += saved;
                    report.lost += lost;
                    if lost > 0 {
                        report.failed += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    debug!("    ✗ Error reading machine {} on line {}: {}", machine.name, line, e);
                }
            }
        }
    }

    report
}

/// Feed both positions of one machine through detector and recorder.
///
/// Returns `(saved, lost)`. Every lost cycle is logged at error level with
/// its full key; both positions always see this tick's sample.
fn run_positions(
    line: &str,
    machine: &MachineConfig,
    number: u32,
    samples: [(Position, Sample); 2],
    ctx: &mut PollContext<'_>,
) -> (usize, usize) {
    let mut saved = 0;
    let mut lost = 0;
    for (position, sample) in samples {
        let key = CycleKey::new(line, &machine.name, position);
        let output = ctx.detectors.process(&key, sample, ctx.now, ctx.cycle);

        if let CycleEvent::Completed(waveform) = output.event {
            match ctx.recorder.record(&key, number, waveform) {
                Ok(outcome) => saved += outcome.saved(),
                Err(e) => {
                    lost += 1;
                    error!("✗ Lost cycle for {}: {}", key, e);
                }
            }
        }
    }
    (saved, lost)
}

fn read_machine(
    endpoint: &Endpoint,
    line: &str,
    machine: &MachineConfig,
    ctx: &mut PollContext<'_>,
) -> Result<(u32, [(Position, Sample); 2]), PollError> {
    let registers = machine.registers(line)?;
    let number = machine.machine_number()?;
    let values = ctx.reader.read(endpoint, &registers)?;

    let sample = |position| -> Result<(Position, Sample), PollError> {
        let (toe_heel, side) = RegisterField::pair_for(position);
        Ok((
            position,
            Sample::new(values.require(toe_heel, endpoint)?, values.require(side, endpoint)?),
        ))
    };
    Ok((number, [sample(Position::Left)?, sample(Position::Right)?]))
}
