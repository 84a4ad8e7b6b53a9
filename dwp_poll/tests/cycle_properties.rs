//! Property tests for cycle detection and peak validation.

use dwp_common::config::CycleSection;
use dwp_common::device::{CycleKey, Position};
use dwp_common::record::Waveform;
use dwp_poll::detector::{CycleEvent, DetectorBank, Sample};
use dwp_poll::recorder::{ValidationWindow, Verdict};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn waveform() -> impl Strategy<Value = Waveform> {
    (1usize..60).prop_flat_map(|len| {
        (
            prop::collection::vec(-5i16..60, len),
            prop::collection::vec(-5i16..60, len),
        )
            .prop_map(|(th, side)| Waveform::from_samples(th, side).unwrap())
    })
}

proptest! {
    #[test]
    fn valid_iff_both_peaks_in_window(pv in waveform()) {
        let window = ValidationWindow::from_params(&CycleSection::default());
        let th_peak = *pv.toe_heel().iter().max().unwrap();
        let side_peak = *pv.side().iter().max().unwrap();
        let expected = (30..=45).contains(&th_peak) && (30..=45).contains(&side_peak);

        let verdict = window.validate(&pv);
        prop_assert_eq!(matches!(verdict, Verdict::Valid { .. }), expected);
    }

    #[test]
    fn validation_is_idempotent(pv in waveform()) {
        let window = ValidationWindow::from_params(&CycleSection::default());
        prop_assert_eq!(window.validate(&pv), window.validate(&pv));
    }

    #[test]
    fn detector_buffers_stay_aligned_and_bounded(
        samples in prop::collection::vec((-5i16..60, -5i16..60), 1..400)
    ) {
        let params = CycleSection::default();
        let key = CycleKey::new("G5", "mc1", Position::Left);
        let mut bank = DetectorBank::new();
        let t0 = Instant::now();

        for (i, (th, side)) in samples.into_iter().enumerate() {
            let now = t0 + Duration::from_millis(250 * i as u64);
            let output = bank.process(&key, Sample::new(th, side), now, &params);

            if let Some(pv) = bank.state(&key).samples() {
                prop_assert_eq!(pv.toe_heel().len(), pv.side().len());
                prop_assert!(pv.len() <= params.max_buffer_size);
            }
            if let CycleEvent::Completed(pv) = output.event {
                prop_assert_eq!(pv.toe_heel().len(), pv.side().len());
                prop_assert!(pv.len() <= params.max_buffer_size + 1);
                prop_assert!(th <= params.end_threshold && side <= params.end_threshold);
                prop_assert_eq!(pv.toe_heel().last(), Some(&th));
                prop_assert!(!bank.state(&key).is_active());
            }
        }
    }

    #[test]
    fn completed_peaks_cover_whole_history(
        body in prop::collection::vec((1i16..60, 1i16..60), 0..50),
        start in 10i16..60,
    ) {
        let params = CycleSection::default();
        let key = CycleKey::new("G5", "mc1", Position::Right);
        let mut bank = DetectorBank::new();
        let t0 = Instant::now();

        let mut feed = vec![(start, 0)];
        feed.extend(body.iter().copied());
        feed.push((0, 0));

        let mut completed = None;
        for (i, &(th, side)) in feed.iter().enumerate() {
            let now = t0 + Duration::from_secs(i as u64 / 4);
            if let CycleEvent::Completed(pv) =
                bank.process(&key, Sample::new(th, side), now, &params).event
            {
                completed = Some(pv);
            }
        }

        let pv = completed.expect("cycle should complete");
        prop_assert_eq!(pv.len(), feed.len());
        let th_peak = feed.iter().map(|&(th, _)| th).max();
        let side_peak = feed.iter().map(|&(_, side)| side).max();
        prop_assert_eq!(pv.peaks(), th_peak.zip(side_peak));
    }
}
