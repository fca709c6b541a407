//! Percentage-deviation scoring of a completed session.
//!
//! Every term is a signed percentage deviation from the reference; the final
//! score is their mean. The brake term is a saturating penalty that can never
//! raise the score.

use crate::config::{ReferenceTable, ScoringCfg};
use crate::record::PortRecord;
use crate::status::{Classification, Verdict};

/// Added to the measured current so a zero reading does not divide by zero.
const CURRENT_EPSILON: f64 = 1e-4;

/// Per-component deviations for display. Not used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentBreakdown {
    /// Mean settle-speed deviation over recorded test points.
    pub speed: Option<f64>,
    /// Mean settle-current deviation over recorded test points.
    pub current: Option<f64>,
    /// Coast deviation; 0 when no coast was measured.
    pub coast: f64,
    /// Signed brake component (capped); 0 when no brake was measured.
    pub brake: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreReport {
    pub final_score: f64,
    pub classification: Classification,
    pub brake_responded: bool,
    pub breakdown: ComponentBreakdown,
}

impl ScoreReport {
    pub fn verdict(&self, record: &PortRecord) -> Verdict {
        Verdict {
            classification: self.classification,
            final_score: self.final_score,
            motor_responded: record.motor_responded,
            current_responded: record.current_responded,
            timed_out: record.timed_out,
            brake_responded: self.brake_responded,
        }
    }
}

#[inline]
fn speed_deviation(measured: f64, reference: f64) -> f64 {
    measured / reference * 100.0 - 100.0
}

#[inline]
fn current_deviation(measured: i32, reference: i32) -> f64 {
    f64::from(reference) / (f64::from(measured) + CURRENT_EPSILON) * 100.0 - 100.0
}

/// Score `record` against `table`. Pure: the record is not modified.
pub fn score(record: &PortRecord, table: &ReferenceTable, cfg: &ScoringCfg) -> ScoreReport {
    let mut total = 0.0;
    let mut count = 0u32;
    let mut speed_sum = 0.0;
    let mut current_sum = 0.0;

    for (i, r) in record.results.iter().enumerate() {
        let tp = table.get(i);
        let ss = speed_deviation(r.settle_speed, tp.settle_speed);
        let sc = current_deviation(r.settle_current, tp.settle_current);
        speed_sum += ss;
        current_sum += sc;
        total += ss + sc;
        count += 2;
    }

    let coast_ref = cfg.reference_coast_ms as f64;
    let brake_ref = cfg.reference_brake_ms as f64;
    let coast = record.coast_duration_ms as f64 / coast_ref * 100.0 - 100.0;
    total += coast;
    count += 1;

    let brake_diff = brake_ref - record.brake_duration_ms as f64;
    let brake_raw = ((brake_diff * cfg.brake_gain).tanh() * 100.0).min(cfg.brake_cap);
    let brake_responded = brake_raw >= cfg.brake_fail_below;
    if brake_responded {
        total += (brake_diff.abs() * cfg.brake_gain).tanh() * -100.0;
        count += 1;
    }

    let final_score = total / f64::from(count);
    let forced_fail = !record.motor_responded
        || !record.current_responded
        || record.timed_out
        || !brake_responded;
    let classification = if forced_fail || final_score < cfg.fail_below {
        Classification::Fail
    } else if final_score < cfg.warn_below {
        Classification::Warning
    } else {
        Classification::Pass
    };

    let n = record.results.len() as f64;
    let breakdown = ComponentBreakdown {
        speed: (!record.results.is_empty()).then(|| speed_sum / n),
        current: (!record.results.is_empty()).then(|| current_sum / n),
        coast: if record.coast_duration_ms == 0 {
            0.0
        } else {
            coast
        },
        brake: if record.brake_duration_ms == 0 {
            0.0
        } else {
            brake_raw
        },
    };

    ScoreReport {
        final_score,
        classification,
        brake_responded,
        breakdown,
    }
}
