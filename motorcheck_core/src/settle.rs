//! Hysteresis settle detector.
//!
//! Converts a smoothed acceleration magnitude into a three-phase
//! transient / settling / settled signal. The detector keeps no state of its
//! own: callers store the returned phase and feed it back on the next call.

use crate::config::SettleCfg;

/// Where a port is in the settle protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlePhase {
    /// Waiting for motion to become transient.
    #[default]
    Idle,
    /// Acceleration recently exceeded the transient threshold.
    Transient,
    /// Acceleration dropped below the settling threshold at `since_ms`.
    Settling { since_ms: u64 },
}

impl SettlePhase {
    /// Numeric phase as shown on diagnostic displays (0, 1, 2).
    pub fn as_index(self) -> u8 {
        match self {
            SettlePhase::Idle => 0,
            SettlePhase::Transient => 1,
            SettlePhase::Settling { .. } => 2,
        }
    }
}

/// Result of one detector evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleStep {
    pub phase: SettlePhase,
    /// True exactly on the tick the dwell completes.
    pub settled: bool,
}

/// Advance the detector by one observation.
///
/// `now_ms` must be monotonic. Non-finite accelerations never change phase.
#[inline]
pub fn step(phase: SettlePhase, acceleration: f64, now_ms: u64, cfg: &SettleCfg) -> SettleStep {
    let mag = acceleration.abs();
    let hold = |phase| SettleStep {
        phase,
        settled: false,
    };

    if !mag.is_finite() {
        return hold(phase);
    }
    if mag > cfg.transient_accel {
        return hold(SettlePhase::Transient);
    }
    match phase {
        SettlePhase::Idle => hold(SettlePhase::Idle),
        SettlePhase::Transient if mag < cfg.settling_accel => {
            hold(SettlePhase::Settling { since_ms: now_ms })
        }
        SettlePhase::Transient => hold(SettlePhase::Transient),
        SettlePhase::Settling { .. } if mag > cfg.resume_accel => hold(SettlePhase::Transient),
        SettlePhase::Settling { since_ms } if now_ms.saturating_sub(since_ms) >= cfg.dwell_ms => {
            SettleStep {
                phase: SettlePhase::Idle,
                settled: true,
            }
        }
        settling @ SettlePhase::Settling { .. } => hold(settling),
    }
}
