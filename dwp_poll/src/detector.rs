//! Position cycle detector.
//!
//! One state machine per [`CycleKey`]. Each tick it ingests the synchronized
//! `(toe_heel, side)` pair of its position and decides whether a press cycle
//! starts, keeps buffering, completes, or is abandoned.
//!
//! ```text
//!            either ≥ start                 both ≤ end
//!   ┌──────┐ ─────────────────► ┌────────┐ ────────────► Completed(waveform)
//!   │ Idle │                    │ Active │
//!   └──────┘ ◄───────────────── └────────┘
//!             age > timeout  (checked first)
//!             len > max_buffer_size
//! ```
//!
//! Transitions are pure: [`CycleState::expire`] and [`CycleState::step`]
//! consume the old state and return the new one. [`DetectorBank`] applies
//! them with take → transform → put on its map.

use dwp_common::config::CycleSection;
use dwp_common::device::CycleKey;
use dwp_common::record::Waveform;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::trace;

/// One synchronized sensor reading for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Toe/heel sensor value.
    pub toe_heel: i16,
    /// Side sensor value.
    pub side: i16,
}

impl Sample {
    /// Build a sample.
    pub const fn new(toe_heel: i16, side: i16) -> Self {
        Self { toe_heel, side }
    }

    /// Either sensor at or above the start threshold.
    #[inline]
    pub const fn starts_cycle(&self, threshold: i16) -> bool {
        self.toe_heel >= threshold || self.side >= threshold
    }

    /// Both sensors at or below the end threshold.
    #[inline]
    pub const fn ends_cycle(&self, threshold: i16) -> bool {
        self.toe_heel <= threshold && self.side <= threshold
    }
}

/// State of one position's cycle detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CycleState {
    /// No cycle in progress.
    #[default]
    Idle,
    /// A cycle is being buffered.
    Active {
        /// Tick time of the starting sample.
        started_at: Instant,
        /// Every pair since the starting sample, inclusive.
        samples: Waveform,
    },
}

/// What a single tick did to a detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    /// Stayed idle.
    Idle,
    /// Idle → Active on this sample.
    Started,
    /// Sample appended to an active cycle.
    Buffered {
        /// Buffered pairs after this tick.
        len: usize,
    },
    /// End condition reached; the full waveform is handed to the recorder.
    Completed(Waveform),
    /// Buffer exceeded `max_buffer_size`; samples discarded.
    Overflowed {
        /// Buffered pairs when discarded.
        len: usize,
    },
}

/// Result of processing one tick for a cycle key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOutput {
    /// `Some(samples)` if an active cycle timed out before this tick's sample
    /// was evaluated.
    pub timed_out: Option<usize>,
    /// Transition taken for this tick's sample.
    pub event: CycleEvent,
}

impl CycleState {
    /// True while a cycle is being buffered.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Buffered samples of an active cycle.
    pub fn samples(&self) -> Option<&Waveform> {
        match self {
            Self::Active { samples, .. } => Some(samples),
            Self::Idle => None,
        }
    }

    /// Drop an active cycle older than `timeout`.
    ///
    /// Returns the new state and, if it expired, the number of discarded pairs.
    pub fn expire(self, now: Instant, timeout: Duration) -> (Self, Option<usize>) {
        match self {
            Self::Active { started_at, samples }
                if now.saturating_duration_since(started_at) > timeout =>
            {
                (Self::Idle, Some(samples.len()))
            }
            other => (other, None),
        }
    }

    /// Apply one sample.
    pub fn step(self, sample: Sample, now: Instant, params: &CycleSection) -> (Self, CycleEvent) {
        match self {
            Self::Idle if sample.starts_cycle(params.start_threshold) => (
                Self::Active {
                    started_at: now,
                    samples: Waveform::starting_with(sample.toe_heel, sample.side),
                },
                CycleEvent::Started,
            ),

            Self::Idle => (Self::Idle, CycleEvent::Idle),

            Self::Active {
                started_at,
                mut samples,
            } => {
                samples.push(sample.toe_heel, sample.side);
                let len = samples.len();

                if sample.ends_cycle(params.end_threshold) {
                    (Self::Idle, CycleEvent::Completed(samples))
                } else if len > params.max_buffer_size {
                    (Self::Idle, CycleEvent::Overflowed { len })
                } else {
                    (Self::Active { started_at, samples }, CycleEvent::Buffered { len })
                }
            }
        }
    }
}

/// Detector states of every cycle key polled by this process.
///
/// Only active cycles are stored; a key with no entry is idle.
#[derive(Debug, Default)]
pub struct DetectorBank {
    states: HashMap<CycleKey, CycleState>,
}

impl DetectorBank {
    /// Empty bank, every key idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run timeout check and transition for one key.
    pub fn process(
        &mut self,
        key: &CycleKey,
        sample: Sample,
        now: Instant,
        params: &CycleSection,
    ) -> DetectorOutput {
        let state = self.states.remove(key).unwrap_or_default();

        let (state, timed_out) = state.expire(now, params.timeout());
        if let Some(len) = timed_out {
            trace!("Cycle for {} timed out after {} samples, resetting to idle", key, len);
        }

        let (state, event) = state.step(sample, now, params);
        match &event {
            CycleEvent::Idle => {}
            CycleEvent::Started => trace!(
                "Cycle started for {} (toe/heel={}, side={})",
                key, sample.toe_heel, sample.side
            ),
            CycleEvent::Buffered { len } => trace!(
                "Buffered sample {} for {} (toe/heel={}, side={})",
                len, key, sample.toe_heel, sample.side
            ),
            CycleEvent::Completed(pv) => {
                trace!("Cycle ended for {} with {} samples", key, pv.len())
            }
            CycleEvent::Overflowed { len } => trace!(
                "Cycle for {} exceeded {} samples without ending, discarded",
                key, len - 1
            ),
        }

        if state.is_active() {
            self.states.insert(key.clone(), state);
        }

        DetectorOutput { timed_out, event }
    }

    /// State of a key (idle if never seen).
    pub fn state(&self, key: &CycleKey) -> CycleState {
        self.states.get(key).cloned().unwrap_or_default()
    }

    /// Number of cycles currently being buffered.
    pub fn active_count(&self) -> usize {
        self.states.len()
    }

    /// Drop state for every key not in `keep`. Returns how many were removed.
    pub fn retain_keys(&mut self, keep: &HashSet<CycleKey>) -> usize {
        let before = self.states.len();
        self.states.retain(|key, _| keep.contains(key));
        before - self.states.len()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
