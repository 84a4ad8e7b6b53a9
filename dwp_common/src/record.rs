//! Captured waveforms and persisted count records.

use crate::device::Position;
use serde::{Deserialize, Serialize};

/// The two synchronized sample sequences of one buffered press cycle.
///
/// Serializes as a JSON pair `[[toe_heel...], [side...]]`. Both sequences
/// always have the same length: samples are only ever added in pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(Vec<i16>, Vec<i16>)")]
pub struct Waveform(Vec<i16>, Vec<i16>);

impl TryFrom<(Vec<i16>, Vec<i16>)> for Waveform {
    type Error = String;

    fn try_from((toe_heel, side): (Vec<i16>, Vec<i16>)) -> Result<Self, Self::Error> {
        let (th_len, side_len) = (toe_heel.len(), side.len());
        Self::from_samples(toe_heel, side).ok_or_else(|| {
            format!("waveform sequences differ in length ({th_len} vs {side_len})")
        })
    }
}

impl Waveform {
    /// Waveform seeded with its first sample pair.
    pub fn starting_with(toe_heel: i16, side: i16) -> Self {
        Self(vec![toe_heel], vec![side])
    }

    /// Build from two sequences; `None` if their lengths differ.
    pub fn from_samples(toe_heel: Vec<i16>, side: Vec<i16>) -> Option<Self> {
        (toe_heel.len() == side.len()).then_some(Self(toe_heel, side))
    }

    /// Append one synchronized pair.
    pub fn push(&mut self, toe_heel: i16, side: i16) {
        self.0.push(toe_heel);
        self.1.push(side);
    }

    /// Number of sample pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no pair has been buffered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Toe/heel samples.
    pub fn toe_heel(&self) -> &[i16] {
        &self.0
    }

    /// Side samples.
    pub fn side(&self) -> &[i16] {
        &self.1
    }

    /// `(max(toe_heel), max(side))`, or `None` for an empty waveform.
    pub fn peaks(&self) -> Option<(i16, i16)> {
        Some((*self.0.iter().max()?, *self.1.iter().max()?))
    }
}

/// One validated press cycle, as persisted.
///
/// Field names follow the storage columns read by the reporting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecord {
    /// Machine number parsed from the machine name.
    pub machine: u32,
    /// Normalized line name.
    pub line: String,
    /// New cumulative total for the line.
    pub count: u64,
    /// Full captured waveform.
    pub pv: Waveform,
    /// Press side.
    pub position: Position,
    /// Cycle duration [s]; always 0 for buffered cycles.
    pub duration: u32,
    /// Cycles represented by this record; always 1.
    pub incremental: u32,
    /// Structured error placeholder; always `[0, 0]`.
    pub std_error: [i32; 2],
}

impl CountRecord {
    /// Record for one validated cycle.
    pub fn new(machine: u32, line: &str, count: u64, pv: Waveform, position: Position) -> Self {
        Self {
            machine,
            line: line.to_string(),
            count,
            pv,
            position,
            duration: 0,
            incremental: 1,
            std_error: [0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_serializes_as_pair() {
        let mut pv = Waveform::starting_with(12, 0);
        pv.push(35, 32);
        assert_eq!(serde_json::to_string(&pv).unwrap(), "[[12,35],[0,32]]");

        let back: Waveform = serde_json::from_str("[[12,35],[0,32]]").unwrap();
        assert_eq!(back, pv);
    }

    #[test]
    fn waveform_rejects_unequal_lengths() {
        assert!(Waveform::from_samples(vec![1, 2], vec![1]).is_none());
        assert!(serde_json::from_str::<Waveform>("[[1,2],[1]]").is_err());
        assert_eq!(
            Waveform::from_samples(vec![1, 2], vec![3, 4]).map(|w| w.len()),
            Some(2)
        );
    }

    #[test]
    fn peaks_over_full_history() {
        let pv = Waveform::from_samples(vec![12, 35, 38, 0], vec![0, 32, 40, 0]).unwrap();
        assert_eq!(pv.peaks(), Some((38, 40)));
        assert_eq!(Waveform::default().peaks(), None);
    }

    #[test]
    fn new_record_carries_fixed_fields() {
        let rec = CountRecord::new(3, "G5", 42, Waveform::starting_with(30, 31), Position::Right);
        assert_eq!(rec.duration, 0);
        assert_eq!(rec.incremental, 1);
        assert_eq!(rec.std_error, [0, 0]);
        assert_eq!(serde_json::to_value(rec.position).unwrap(), "R");
    }
}
