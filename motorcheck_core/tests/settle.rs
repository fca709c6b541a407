use motorcheck_core::settle::step;
use motorcheck_core::{SettleCfg, SettlePhase};
use proptest::prelude::*;
use rstest::rstest;

fn drive(seq: &[(f64, u64)]) -> (SettlePhase, Vec<u64>) {
    let cfg = SettleCfg::default();
    let mut phase = SettlePhase::Idle;
    let mut settled_at = Vec::new();
    for &(a, t) in seq {
        let s = step(phase, a, t, &cfg);
        if s.settled {
            settled_at.push(t);
        }
        phase = s.phase;
    }
    (phase, settled_at)
}

#[rstest]
#[case::quiet_never_settles(&[(0.0, 0), (0.0, 500)], SettlePhase::Idle, &[])]
#[case::spike_then_calm(&[(900.0, 0), (100.0, 3), (100.0, 103)], SettlePhase::Idle, &[103])]
#[case::dwell_not_yet(&[(900.0, 0), (100.0, 3), (100.0, 102)], SettlePhase::Settling { since_ms: 3 }, &[])]
#[case::dead_band_holds(&[(900.0, 0), (280.0, 3), (280.0, 200)], SettlePhase::Transient, &[])]
#[case::resume_rearms(&[(900.0, 0), (100.0, 3), (350.0, 50), (100.0, 53), (100.0, 153)], SettlePhase::Idle, &[153])]
#[case::hysteresis_keeps_window(&[(900.0, 0), (100.0, 3), (290.0, 50), (100.0, 103)], SettlePhase::Idle, &[103])]
#[case::negative_acceleration(&[(-900.0, 0), (-100.0, 3), (-100.0, 103)], SettlePhase::Idle, &[103])]
fn settle_sequences(
    #[case] seq: &[(f64, u64)],
    #[case] phase: SettlePhase,
    #[case] settled_at: &[u64],
) {
    let (end, got) = drive(seq);
    assert_eq!(end, phase);
    assert_eq!(got, settled_at);
}

#[rstest]
fn non_finite_acceleration_is_ignored() {
    let cfg = SettleCfg::default();
    let s = step(SettlePhase::Settling { since_ms: 0 }, f64::NAN, 10, &cfg);
    assert_eq!(s.phase, SettlePhase::Settling { since_ms: 0 });
    assert!(!s.settled);
}

proptest! {
    /// A settle is only reported once acceleration stayed calm for the dwell.
    #[test]
    fn settle_needs_full_dwell(
        accels in prop::collection::vec(0.0f64..800.0, 1..200),
        gaps in prop::collection::vec(1u64..20, 200),
    ) {
        let cfg = SettleCfg::default();
        let mut phase = SettlePhase::Idle;
        let mut now = 0u64;
        for (a, gap) in accels.iter().zip(&gaps) {
            now += gap;
            let opened = match phase {
                SettlePhase::Settling { since_ms } => Some(since_ms),
                _ => None,
            };
            let s = step(phase, *a, now, &cfg);
            if s.settled {
                let since = opened.expect("settled only from the settling phase");
                prop_assert!(now - since >= cfg.dwell_ms);
                prop_assert_eq!(s.phase, SettlePhase::Idle);
            }
            phase = s.phase;
        }
    }

    /// Accelerations between the settling and resume thresholds never move
    /// the detector out of the phase it is in.
    #[test]
    fn dead_band_is_sticky(a in 250.0f64..=300.0, since in 0u64..1000, dt in 0u64..99) {
        let cfg = SettleCfg::default();
        let s = step(SettlePhase::Transient, a, since, &cfg);
        prop_assert_eq!(s.phase, SettlePhase::Transient);
        let settling = SettlePhase::Settling { since_ms: since };
        let s = step(settling, a, since + dt, &cfg);
        prop_assert_eq!(s.phase, settling);
        prop_assert!(!s.settled);
    }
}
