//! Runtime configuration for the diagnostic engine.
//!
//! These are separate from the TOML-deserialized structs in `motorcheck_config`;
//! `conversions` bridges the two.

use crate::error::BuildError;

/// Number of smart ports on a full bus.
pub const MAX_PORTS: usize = 21;

/// Telemetry sampling and smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingCfg {
    /// Minimum spacing between two samples (ms).
    pub interval_ms: u64,
    /// Weight of the previous value in the EMA; the new sample gets `1 - smoothing`.
    pub smoothing: f64,
    /// Acceleration is only derived once this many samples exist.
    pub min_samples_for_accel: usize,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            interval_ms: 3,
            smoothing: 0.7,
            min_samples_for_accel: 3,
        }
    }
}

/// Hysteresis thresholds for settle detection (acceleration magnitude, rpm/s).
#[derive(Debug, Clone, PartialEq)]
pub struct SettleCfg {
    pub transient_accel: f64,
    pub settling_accel: f64,
    pub resume_accel: f64,
    pub dwell_ms: u64,
}

impl Default for SettleCfg {
    fn default() -> Self {
        Self {
            transient_accel: 500.0,
            settling_accel: 250.0,
            resume_accel: 300.0,
            dwell_ms: 100,
        }
    }
}

/// Per-session timing and velocity thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCfg {
    pub debounce_ms: u64,
    pub still_velocity: f64,
    pub motion_velocity: f64,
    pub response_timeout_ms: u64,
    pub timeout_ms: u64,
    pub spinup_mv: i32,
    pub current_threshold: i32,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            still_velocity: 5.0,
            motion_velocity: 10.0,
            response_timeout_ms: 1000,
            timeout_ms: 8000,
            spinup_mv: 12_000,
            current_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionCfg {
    pub capacity: usize,
}

impl Default for AdmissionCfg {
    fn default() -> Self {
        Self { capacity: 8 }
    }
}

/// Fixed scoring baselines and classification thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringCfg {
    pub reference_coast_ms: u64,
    pub reference_brake_ms: u64,
    pub fail_below: f64,
    pub warn_below: f64,
    pub brake_gain: f64,
    pub brake_fail_below: f64,
    pub brake_cap: f64,
}

impl Default for ScoringCfg {
    fn default() -> Self {
        Self {
            reference_coast_ms: 885,
            reference_brake_ms: 196,
            fail_below: -40.0,
            warn_below: -35.0,
            brake_gain: 0.005,
            brake_fail_below: -60.0,
            brake_cap: 10.0,
        }
    }
}

/// All tuning parameters of the engine in one place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticsCfg {
    pub sampling: SamplingCfg,
    pub settle: SettleCfg,
    pub session: SessionCfg,
    pub admission: AdmissionCfg,
    pub scoring: ScoringCfg,
}

impl DiagnosticsCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.sampling.interval_ms == 0 {
            return Err(BuildError::InvalidConfig("sampling interval must be >= 1 ms"));
        }
        if !(0.0..1.0).contains(&self.sampling.smoothing) {
            return Err(BuildError::InvalidConfig("smoothing must be in [0, 1)"));
        }
        if self.sampling.min_samples_for_accel < 2 {
            return Err(BuildError::InvalidConfig(
                "min_samples_for_accel must be >= 2",
            ));
        }
        let s = &self.settle;
        if !(s.settling_accel > 0.0
            && s.settling_accel < s.resume_accel
            && s.resume_accel <= s.transient_accel)
        {
            return Err(BuildError::InvalidConfig(
                "settle thresholds must satisfy 0 < settling < resume <= transient",
            ));
        }
        let ss = &self.session;
        if ss.still_velocity <= 0.0 || ss.motion_velocity < ss.still_velocity {
            return Err(BuildError::InvalidConfig(
                "velocity thresholds must satisfy 0 < still <= motion",
            ));
        }
        if ss.timeout_ms <= ss.response_timeout_ms {
            return Err(BuildError::InvalidConfig(
                "session timeout must exceed response timeout",
            ));
        }
        if ss.spinup_mv <= 0 {
            return Err(BuildError::InvalidConfig("spinup_mv must be > 0"));
        }
        if self.admission.capacity == 0 {
            return Err(BuildError::InvalidConfig("admission capacity must be >= 1"));
        }
        let sc = &self.scoring;
        if sc.reference_coast_ms == 0 || sc.reference_brake_ms == 0 {
            return Err(BuildError::InvalidConfig(
                "reference coast/brake durations must be >= 1 ms",
            ));
        }
        if sc.warn_below < sc.fail_below {
            return Err(BuildError::InvalidConfig("warn_below must be >= fail_below"));
        }
        Ok(())
    }
}

/// One reference (drive, expected settle speed, expected settle current) triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestPoint {
    pub drive_mv: i32,
    pub settle_speed: f64,
    pub settle_current: i32,
}

/// Immutable, non-empty list of test points shared by all ports.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    points: Vec<TestPoint>,
}

impl ReferenceTable {
    pub fn new(points: Vec<TestPoint>) -> Result<Self, BuildError> {
        if points.is_empty() {
            return Err(BuildError::InvalidConfig(
                "reference table needs at least one test point",
            ));
        }
        if points
            .iter()
            .any(|p| p.drive_mv == 0 || !p.settle_speed.is_finite() || p.settle_speed == 0.0)
        {
            return Err(BuildError::InvalidConfig(
                "test points need a non-zero drive and a finite non-zero settle speed",
            ));
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Test point for result slot `index`, wrapping around the table.
    #[inline]
    pub fn get(&self, index: usize) -> &TestPoint {
        &self.points[index % self.points.len()]
    }

    pub fn points(&self) -> &[TestPoint] {
        &self.points
    }
}

impl Default for ReferenceTable {
    fn default() -> Self {
        let tp = |drive_mv, settle_speed, settle_current| TestPoint {
            drive_mv,
            settle_speed,
            settle_current,
        };
        Self {
            points: vec![
                tp(6000, 117.0, 70),
                tp(12_000, 237.0, 160),
                tp(-6000, -117.0, 73),
                tp(-12_000, -236.0, 156),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(DiagnosticsCfg::default().validate().is_ok());
    }

    #[test]
    fn lookup_wraps_around_table() {
        let t = ReferenceTable::default();
        assert_eq!(t.get(5).drive_mv, 12_000);
        assert_eq!(t.get(3).settle_current, 156);
    }

    #[test]
    fn empty_table_rejected() {
        assert!(ReferenceTable::new(Vec::new()).is_err());
    }

    #[test]
    fn inverted_hysteresis_rejected() {
        let mut cfg = DiagnosticsCfg::default();
        cfg.settle.resume_accel = 200.0;
        assert!(cfg.validate().is_err());
    }
}
