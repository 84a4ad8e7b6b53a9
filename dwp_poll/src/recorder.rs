//! Cycle validation and count recording.
//!
//! A completed waveform is valid when both of its peaks fall inside the
//! inclusive `[good_value_min, good_value_max]` window. Valid cycles become
//! one [`CountRecord`] each and advance the line's cumulative total by one;
//! invalid cycles are dropped without touching the store.

use crate::error::PollError;
use dwp_common::config::CycleSection;
use dwp_common::device::CycleKey;
use dwp_common::record::{CountRecord, Waveform};
use dwp_common::store::{CountStore, StoreError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Inclusive peak window for a valid press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationWindow {
    /// Lowest valid peak.
    pub min: i16,
    /// Highest valid peak.
    pub max: i16,
}

/// Validation result for one waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Both peaks inside the window.
    Valid {
        /// Toe/heel peak.
        toe_heel_peak: i16,
        /// Side peak.
        side_peak: i16,
    },
    /// At least one peak outside the window.
    OutOfRange {
        /// Toe/heel peak.
        toe_heel_peak: i16,
        /// Side peak.
        side_peak: i16,
    },
    /// Nothing was buffered.
    Empty,
}

impl ValidationWindow {
    /// Window from the `[cycle]` section.
    pub fn from_params(params: &CycleSection) -> Self {
        Self {
            min: params.good_value_min,
            max: params.good_value_max,
        }
    }

    /// Value inside the window (bounds inclusive).
    #[inline]
    pub fn contains(&self, value: i16) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Judge a waveform by its two peaks. Pure: same waveform, same verdict.
    pub fn validate(&self, waveform: &Waveform) -> Verdict {
        match waveform.peaks() {
            None => Verdict::Empty,
            Some((toe_heel_peak, side_peak))
                if self.contains(toe_heel_peak) && self.contains(side_peak) =>
            {
                Verdict::Valid {
                    toe_heel_peak,
                    side_peak,
                }
            }
            Some((toe_heel_peak, side_peak)) => Verdict::OutOfRange {
                toe_heel_peak,
                side_peak,
            },
        }
    }
}

/// Outcome of handing one completed cycle to the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Record persisted with this new cumulative total.
    Saved {
        /// New cumulative total of the line.
        count: u64,
    },
    /// Cycle rejected; nothing written.
    Discarded(Verdict),
}

impl RecordOutcome {
    /// Number of records written (1 or 0).
    pub fn saved(&self) -> usize {
        match self {
            Self::Saved { .. } => 1,
            Self::Discarded(_) => 0,
        }
    }
}

/// Validates completed cycles, persists the valid ones and owns the per-line
/// cumulative totals.
pub struct CycleRecorder {
    window: ValidationWindow,
    write_attempts: u32,
    store: Box<dyn CountStore>,
    cumulative: HashMap<String, u64>,
}

impl CycleRecorder {
    /// Recorder over `store` with the thresholds of `params`.
    pub fn new(store: Box<dyn CountStore>, params: &CycleSection, write_attempts: u32) -> Self {
        Self {
            window: ValidationWindow::from_params(params),
            write_attempts: write_attempts.max(1),
            store,
            cumulative: HashMap::new(),
        }
    }

    /// Seed a line's total from its latest persisted record (0 if none).
    ///
    /// A line already tracked in memory keeps its value.
    pub fn seed_line(&mut self, line: &str) -> Result<u64, StoreError> {
        if let Some(&count) = self.cumulative.get(line) {
            return Ok(count);
        }
        let count = self.store.latest_count(line)?.unwrap_or(0);
        self.cumulative.insert(line.to_string(), count);
        Ok(count)
    }

    /// Current in-memory total of a line.
    pub fn cumulative(&self, line: &str) -> Option<u64> {
        self.cumulative.get(line).copied()
    }

    /// Lines with an in-memory total.
    pub fn tracked_lines(&self) -> usize {
        self.cumulative.len()
    }

    /// Validation window in use.
    pub fn window(&self) -> ValidationWindow {
        self.window
    }

    /// Validate a completed cycle and persist it if valid.
    ///
    /// The in-memory total only advances after the store accepted the
    /// record, so persisted totals of a line are strictly increasing.
    ///
    /// # Errors
    /// `PollError::Persistence` once every write attempt failed; the cycle is
    /// lost and the total is unchanged. `PollError::Store` if an unseeded
    /// line cannot be seeded.
    pub fn record(
        &mut self,
        key: &CycleKey,
        machine: u32,
        waveform: Waveform,
    ) -> Result<RecordOutcome, PollError> {
        let verdict = self.window.validate(&waveform);
        if !matches!(verdict, Verdict::Valid { .. }) {
            debug!("Discarded cycle for {}: {:?} ({} samples)", key, verdict, waveform.len());
            return Ok(RecordOutcome::Discarded(verdict));
        }

        let next = self.seed_line(&key.line)? + 1;
        let record = CountRecord::new(machine, &key.line, next, waveform, key.position);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.insert(&record) {
                Ok(()) => break,
                Err(e) if attempt < self.write_attempts => {
                    warn!(
                        "Write attempt {}/{} for {} failed: {}",
                        attempt, self.write_attempts, key, e
                    );
                }
                Err(e) => {
                    return Err(PollError::Persistence {
                        line: key.line.clone(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }

        self.cumulative.insert(key.line.clone(), next);
        if let Verdict::Valid { toe_heel_peak, side_peak } = verdict {
            debug!(
                "✓ Saved good cycle for {}. Peaks: {}/{}. New total count: {}",
                key, toe_heel_peak, side_peak, next
            );
        }
        Ok(RecordOutcome::Saved { count: next })
    }

    /// Drop totals of lines not in `active`. Returns how many were removed.
    pub fn retain_lines(&mut self, active: &HashSet<String>) -> usize {
        let before = self.cumulative.len();
        self.cumulative.retain(|line, _| active.contains(line));
        before - self.cumulative.len()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dwp_common::device::Position;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// In-memory store; `fail_next` makes that many inserts fail first.
    #[derive(Default)]
    struct MemStore {
        records: Rc<RefCell<Vec<CountRecord>>>,
        seed: HashMap<String, u64>,
        fail_next: u32,
    }

    impl CountStore for MemStore {
        fn latest_count(&self, line: &str) -> Result<Option<u64>, StoreError> {
            let records = self.records.borrow();
            Ok(records
                .iter()
                .rev()
                .find(|r| r.line == line)
                .map(|r| r.count)
                .or_else(|| self.seed.get(line).copied()))
        }

        fn insert(&mut self, record: &CountRecord) -> Result<(), StoreError> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(StoreError::Query("disk I/O error".to_string()));
            }
            self.records.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    fn recorder_with(store: MemStore) -> CycleRecorder {
        CycleRecorder::new(Box::new(store), &CycleSection::default(), 3)
    }

    fn key() -> CycleKey {
        CycleKey::new("G5", "mc1", Position::Left)
    }

    fn wave(th: &[i16], side: &[i16]) -> Waveform {
        Waveform::from_samples(th.to_vec(), side.to_vec()).unwrap()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = ValidationWindow::from_params(&CycleSection::default());
        assert!(window.contains(30));
        assert!(window.contains(45));
        assert!(!window.contains(29));
        assert!(!window.contains(46));
    }

    #[test]
    fn boundary_peaks() {
        let window = ValidationWindow::from_params(&CycleSection::default());
        let verdict = |th: i16, side: i16| window.validate(&wave(&[12, th, 0], &[0, side, 0]));

        assert!(matches!(verdict(30, 45), Verdict::Valid { .. }));
        assert!(matches!(verdict(45, 30), Verdict::Valid { .. }));
        assert!(matches!(verdict(29, 40), Verdict::OutOfRange { .. }));
        assert!(matches!(verdict(40, 46), Verdict::OutOfRange { .. }));
        assert_eq!(window.validate(&Waveform::default()), Verdict::Empty);
    }

    #[test]
    fn scenario_b_valid_cycle_saves_one_record() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder_with(MemStore {
            records: Rc::clone(&records),
            seed: HashMap::from([("G5".to_string(), 41)]),
            ..MemStore::default()
        });
        recorder.seed_line("G5").unwrap();

        let pv = wave(&[12, 35, 38, 0], &[0, 32, 40, 0]);
        let outcome = recorder.record(&key(), 1, pv.clone()).unwrap();

        assert_eq!(outcome, RecordOutcome::Saved { count: 42 });
        assert_eq!(outcome.saved(), 1);
        assert_eq!(recorder.cumulative("G5"), Some(42));

        let records = records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].count, 42);
        assert_eq!(records[0].pv, pv);
        assert_eq!(records[0].machine, 1);
        assert_eq!(records[0].position, Position::Left);
        assert_eq!(records[0].duration, 0);
    }

    #[test]
    fn scenario_c_out_of_range_side_peak_is_discarded() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder_with(MemStore {
            records: Rc::clone(&records),
            ..MemStore::default()
        });
        recorder.seed_line("G5").unwrap();

        let outcome = recorder
            .record(&key(), 1, wave(&[12, 35, 38, 0], &[0, 32, 46, 0]))
            .unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Discarded(Verdict::OutOfRange {
                toe_heel_peak: 38,
                side_peak: 46
            })
        );
        assert_eq!(outcome.saved(), 0);
        assert!(records.borrow().is_empty());
        assert_eq!(recorder.cumulative("G5"), Some(0));
    }

    #[test]
    fn counts_increase_by_one_per_record() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder_with(MemStore {
            records: Rc::clone(&records),
            ..MemStore::default()
        });

        for _ in 0..5 {
            recorder.record(&key(), 1, wave(&[33, 0], &[33, 0])).unwrap();
        }
        let right = CycleKey::new("G5", "mc2", Position::Right);
        recorder.record(&right, 2, wave(&[31, 0], &[44, 0])).unwrap();

        let counts: Vec<u64> = records.borrow().iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn unseeded_line_seeds_lazily_from_store() {
        let mut recorder = recorder_with(MemStore {
            seed: HashMap::from([("K1".to_string(), 7)]),
            ..MemStore::default()
        });

        let k = CycleKey::new("k1", "mc3", Position::Right);
        let outcome = recorder.record(&k, 3, wave(&[35], &[35])).unwrap();
        assert_eq!(outcome, RecordOutcome::Saved { count: 8 });
    }

    #[test]
    fn transient_write_failure_is_retried() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder_with(MemStore {
            records: Rc::clone(&records),
            fail_next: 2,
            ..MemStore::default()
        });

        let outcome = recorder.record(&key(), 1, wave(&[35, 0], &[35, 0])).unwrap();
        assert_eq!(outcome, RecordOutcome::Saved { count: 1 });
        assert_eq!(records.borrow().len(), 1);
    }

    #[test]
    fn exhausted_writes_leave_total_unchanged() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder_with(MemStore {
            records: Rc::clone(&records),
            fail_next: 3,
            ..MemStore::default()
        });
        recorder.seed_line("G5").unwrap();

        let err = recorder
            .record(&key(), 1, wave(&[35, 0], &[35, 0]))
            .unwrap_err();
        assert!(matches!(err, PollError::Persistence { attempts: 3, .. }));
        assert_eq!(recorder.cumulative("G5"), Some(0));

        // Next cycle reuses the count the failed one never claimed.
        let outcome = recorder.record(&key(), 1, wave(&[35, 0], &[35, 0])).unwrap();
        assert_eq!(outcome, RecordOutcome::Saved { count: 1 });
        assert_eq!(records.borrow()[0].count, 1);
    }

    #[test]
    fn retain_lines_drops_inactive_totals() {
        let mut recorder = recorder_with(MemStore::default());
        recorder.seed_line("G5").unwrap();
        recorder.seed_line("G6").unwrap();

        let removed = recorder.retain_lines(&HashSet::from(["G5".to_string()]));
        assert_eq!(removed, 1);
        assert_eq!(recorder.tracked_lines(), 1);
        assert_eq!(recorder.cumulative("G6"), None);
    }
}
