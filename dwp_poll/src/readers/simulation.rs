//! Software press for dry runs.
//!
//! Each machine (endpoint + lowest register address) runs its own press
//! clock that advances one step per read. The left and right sides replay
//! the same profile with a phase offset; every fifth cycle the side sensor
//! overshoots the valid window so that rejects show up too.

use dwp_common::config::ModbusSection;
use dwp_common::device::{Position, RegisterField};
use dwp_common::reader::{Endpoint, RegisterReader, RegisterValues, TransportError};
use std::collections::HashMap;

/// Registry name of this reader.
pub const READER_NAME: &str = "simulation";

const TOE_HEEL_PROFILE: [i16; 8] = [0, 12, 28, 35, 38, 20, 0, 0];
const SIDE_PROFILE: [i16; 8] = [0, 0, 15, 32, 40, 18, 0, 0];
const PEAK_STEP: usize = 4;
const SIDE_OVERSHOOT: i16 = 48;
const REJECT_EVERY: u64 = 5;
const RIGHT_PHASE: u64 = 3;

/// Factory for the reader registry.
pub fn create_reader(_section: &ModbusSection) -> Box<dyn RegisterReader> {
    Box::new(SimulatedPress::new())
}

/// Register reader producing synthetic press cycles.
#[derive(Debug, Default)]
pub struct SimulatedPress {
    steps: HashMap<(String, u16), u64>,
}

impl SimulatedPress {
    /// Press with every machine at step 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// `(toe_heel, side)` sample of one side at press step `step`.
    pub fn sample(step: u64, position: Position) -> (i16, i16) {
        let phased = match position {
            Position::Left => step,
            Position::Right => step + RIGHT_PHASE,
        };
        let period = TOE_HEEL_PROFILE.len() as u64;
        let idx = (phased % period) as usize;
        let cycle = phased / period;

        let side = if cycle % REJECT_EVERY == REJECT_EVERY - 1 && idx == PEAK_STEP {
            SIDE_OVERSHOOT
        } else {
            SIDE_PROFILE[idx]
        };
        (TOE_HEEL_PROFILE[idx], side)
    }
}

impl RegisterReader for SimulatedPress {
    fn name(&self) -> &'static str {
        READER_NAME
    }

    fn read(
        &mut self,
        endpoint: &Endpoint,
        registers: &[(RegisterField, u16)],
    ) -> Result<RegisterValues, TransportError> {
        let base = registers.iter().map(|&(_, address)| address).min().unwrap_or(0);
        let step = self.steps.entry((endpoint.to_string(), base)).or_insert(0);
        let left = Self::sample(*step, Position::Left);
        let right = Self::sample(*step, Position::Right);
        *step += 1;

        Ok(registers
            .iter()
            .map(|&(field, _)| {
                let value = match field {
                    RegisterField::ToeHeelLeft => left.0,
                    RegisterField::SideLeft => left.1,
                    RegisterField::ToeHeelRight => right.0,
                    RegisterField::SideRight => right.1,
                };
                (field, value)
            })
            .collect())
    }
}
