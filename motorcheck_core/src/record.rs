//! Per-port diagnostic record and lifecycle states.

use motorcheck_traits::DeviceKind;

use crate::settle::SettlePhase;

/// Lifecycle of one port. Discriminants match the numeric codes shown on
/// diagnostic displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LifecycleState {
    #[default]
    Idle = 0,
    Detected = 1,
    Debounced = 2,
    SweepTestPoints = 3,
    CoastSpinup = 4,
    CoastWait = 5,
    BrakeSpinup = 6,
    BrakeWait = 7,
    Stalled = 8,
    ReverseCheck = 9,
    Score = 10,
    Pass = 100,
    Warning = 101,
    Fail = 102,
}

impl LifecycleState {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// States 3..=9, where the motor is being driven and sampled.
    pub fn is_active(self) -> bool {
        (3..=9).contains(&self.code())
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Pass | LifecycleState::Warning | LifecycleState::Fail
        )
    }

    /// Anywhere between detection and a verdict.
    pub fn in_session(self) -> bool {
        (1..=10).contains(&self.code())
    }

    pub fn label(self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Detected => "detected",
            LifecycleState::Debounced => "debounced",
            LifecycleState::SweepTestPoints => "sweep",
            LifecycleState::CoastSpinup => "coast-spinup",
            LifecycleState::CoastWait => "coast-wait",
            LifecycleState::BrakeSpinup => "brake-spinup",
            LifecycleState::BrakeWait => "brake-wait",
            LifecycleState::Stalled => "stalled",
            LifecycleState::ReverseCheck => "reverse-check",
            LifecycleState::Score => "score",
            LifecycleState::Pass => "pass",
            LifecycleState::Warning => "warning",
            LifecycleState::Fail => "fail",
        }
    }
}

/// Measured outcome of one test point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestPointResult {
    pub settle_speed: f64,
    pub settle_current: i32,
}

/// Append-only time series captured during a session.
///
/// The columns are always the same length; `push` is the only writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryLog {
    time_ms: Vec<u64>,
    applied_mv: Vec<i32>,
    requested_mv: Vec<i32>,
    current: Vec<i32>,
    velocity: Vec<f64>,
}

/// One row of the telemetry log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRow {
    pub time_ms: u64,
    pub applied_mv: i32,
    pub requested_mv: i32,
    pub current: i32,
    pub velocity: f64,
}

impl TelemetryLog {
    pub fn push(&mut self, row: TelemetryRow) {
        self.time_ms.push(row.time_ms);
        self.applied_mv.push(row.applied_mv);
        self.requested_mv.push(row.requested_mv);
        self.current.push(row.current);
        self.velocity.push(row.velocity);
    }

    pub fn len(&self) -> usize {
        self.time_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_ms.is_empty()
    }

    pub fn clear(&mut self) {
        self.time_ms.clear();
        self.applied_mv.clear();
        self.requested_mv.clear();
        self.current.clear();
        self.velocity.clear();
    }

    pub fn last(&self) -> Option<TelemetryRow> {
        self.row(self.len().checked_sub(1)?)
    }

    pub fn row(&self, i: usize) -> Option<TelemetryRow> {
        Some(TelemetryRow {
            time_ms: *self.time_ms.get(i)?,
            applied_mv: *self.applied_mv.get(i)?,
            requested_mv: *self.requested_mv.get(i)?,
            current: *self.current.get(i)?,
            velocity: *self.velocity.get(i)?,
        })
    }

    pub fn time_ms(&self) -> &[u64] {
        &self.time_ms
    }
    pub fn applied_mv(&self) -> &[i32] {
        &self.applied_mv
    }
    pub fn requested_mv(&self) -> &[i32] {
        &self.requested_mv
    }
    pub fn current(&self) -> &[i32] {
        &self.current
    }
    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }
}

/// Everything the engine knows about one port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortRecord {
    pub lifecycle_state: LifecycleState,
    pub device_kind: DeviceKind,
    /// Smoothed acceleration (rpm/s).
    pub acceleration: f64,
    pub settle_phase: SettlePhase,

    pub last_plug_ms: u64,
    pub active_phase_start_ms: u64,
    pub last_sample_ms: Option<u64>,
    pub session_start_ms: u64,

    pub test_point_index: usize,
    pub requested_mv: i32,

    pub log: TelemetryLog,
    pub results: Vec<TestPointResult>,
    pub coast_duration_ms: u64,
    pub brake_duration_ms: u64,

    pub motor_responded: bool,
    pub current_responded: bool,
    pub timed_out: bool,
    pub brake_responded: bool,

    /// Valid once the state is terminal.
    pub final_score: f64,
    /// Whether this port currently counts against the admission controller.
    pub holds_slot: bool,
}

impl Default for PortRecord {
    fn default() -> Self {
        Self {
            lifecycle_state: LifecycleState::Idle,
            device_kind: DeviceKind::None,
            acceleration: 0.0,
            settle_phase: SettlePhase::Idle,
            last_plug_ms: 0,
            active_phase_start_ms: 0,
            last_sample_ms: None,
            session_start_ms: 0,
            test_point_index: 0,
            requested_mv: 0,
            log: TelemetryLog::default(),
            results: Vec::new(),
            coast_duration_ms: 0,
            brake_duration_ms: 0,
            motor_responded: false,
            current_responded: false,
            timed_out: false,
            brake_responded: true,
            final_score: 0.0,
            holds_slot: false,
        }
    }
}

impl PortRecord {
    /// Time the current settling window opened, if one is open.
    pub fn settle_timer_start_ms(&self) -> Option<u64> {
        match self.settle_phase {
            SettlePhase::Settling { since_ms } => Some(since_ms),
            _ => None,
        }
    }

    /// Clear all session data. The caller owns slot release and the
    /// zero-voltage command; `device_kind` is preserved.
    pub(crate) fn reset_session(&mut self) {
        let device_kind = self.device_kind;
        *self = Self {
            device_kind,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_display_numbers() {
        assert_eq!(LifecycleState::ReverseCheck.code(), 9);
        assert_eq!(LifecycleState::Fail.code(), 102);
        assert!(LifecycleState::BrakeWait.is_active());
        assert!(!LifecycleState::Score.is_active());
        assert!(LifecycleState::Score.in_session());
    }

    #[test]
    fn log_columns_stay_aligned() {
        let mut log = TelemetryLog::default();
        for i in 0..4u64 {
            log.push(TelemetryRow {
                time_ms: i * 3,
                applied_mv: 100,
                requested_mv: 120,
                current: 7,
                velocity: i as f64,
            });
        }
        assert_eq!(log.len(), 4);
        assert_eq!(log.velocity().len(), log.requested_mv().len());
        assert_eq!(log.last().map(|r| r.time_ms), Some(9));
        log.clear();
        assert!(log.is_empty() && log.last().is_none());
    }
}
