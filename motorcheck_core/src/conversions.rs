//! `From` implementations bridging `motorcheck_config` types to core types.

use crate::config::{
    AdmissionCfg, DiagnosticsCfg, ReferenceTable, SamplingCfg, ScoringCfg, SessionCfg, SettleCfg,
    TestPoint,
};
use crate::error::BuildError;

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&motorcheck_config::SamplingCfg> for SamplingCfg {
    fn from(c: &motorcheck_config::SamplingCfg) -> Self {
        Self {
            interval_ms: c.interval_ms,
            smoothing: c.smoothing,
            min_samples_for_accel: c.min_samples_for_accel,
        }
    }
}

// ── SettleCfg ────────────────────────────────────────────────────────────────

impl From<&motorcheck_config::SettleCfg> for SettleCfg {
    fn from(c: &motorcheck_config::SettleCfg) -> Self {
        Self {
            transient_accel: c.transient_accel,
            settling_accel: c.settling_accel,
            resume_accel: c.resume_accel,
            dwell_ms: c.dwell_ms,
        }
    }
}

// ── SessionCfg ───────────────────────────────────────────────────────────────

impl From<&motorcheck_config::SessionCfg> for SessionCfg {
    fn from(c: &motorcheck_config::SessionCfg) -> Self {
        Self {
            debounce_ms: c.debounce_ms,
            still_velocity: c.still_velocity,
            motion_velocity: c.motion_velocity,
            response_timeout_ms: c.response_timeout_ms,
            timeout_ms: c.timeout_ms,
            spinup_mv: c.spinup_mv,
            current_threshold: c.current_threshold,
        }
    }
}

impl From<&motorcheck_config::AdmissionCfg> for AdmissionCfg {
    fn from(c: &motorcheck_config::AdmissionCfg) -> Self {
        Self {
            capacity: c.capacity,
        }
    }
}

// ── ScoringCfg ───────────────────────────────────────────────────────────────

impl From<&motorcheck_config::ScoringCfg> for ScoringCfg {
    fn from(c: &motorcheck_config::ScoringCfg) -> Self {
        Self {
            reference_coast_ms: c.reference_coast_ms,
            reference_brake_ms: c.reference_brake_ms,
            fail_below: c.fail_below,
            warn_below: c.warn_below,
            brake_gain: c.brake_gain,
            brake_fail_below: c.brake_fail_below,
            brake_cap: c.brake_cap,
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&motorcheck_config::Config> for DiagnosticsCfg {
    fn from(c: &motorcheck_config::Config) -> Self {
        Self {
            sampling: (&c.sampling).into(),
            settle: (&c.settle).into(),
            session: (&c.session).into(),
            admission: (&c.admission).into(),
            scoring: (&c.scoring).into(),
        }
    }
}

// ── Reference table ──────────────────────────────────────────────────────────

impl From<&motorcheck_config::TestPointRow> for TestPoint {
    fn from(r: &motorcheck_config::TestPointRow) -> Self {
        Self {
            drive_mv: r.drive_mv,
            settle_speed: r.settle_speed,
            settle_current: r.settle_current,
        }
    }
}

impl TryFrom<&[motorcheck_config::TestPointRow]> for ReferenceTable {
    type Error = BuildError;

    fn try_from(rows: &[motorcheck_config::TestPointRow]) -> Result<Self, Self::Error> {
        ReferenceTable::new(rows.iter().map(TestPoint::from).collect())
    }
}
