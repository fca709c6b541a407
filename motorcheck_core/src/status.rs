//! Verdicts and events raised by the per-port state machine.

use std::fmt;

use crate::record::LifecycleState;

/// Final pass/warning/fail classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Pass,
    Warning,
    Fail,
}

impl Classification {
    pub fn state(self) -> LifecycleState {
        match self {
            Classification::Pass => LifecycleState::Pass,
            Classification::Warning => LifecycleState::Warning,
            Classification::Fail => LifecycleState::Fail,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Pass => "pass",
            Classification::Warning => "warning",
            Classification::Fail => "fail",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forced-fail cause, in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaultCause {
    TimedOut,
    NotResponding,
    CurrentSensor,
    Brake,
}

impl FaultCause {
    /// Short label for compact displays.
    pub fn code(self) -> &'static str {
        match self {
            FaultCause::TimedOut => "TO ERR",
            FaultCause::NotResponding => "NR ERR",
            FaultCause::CurrentSensor => "C ERR",
            FaultCause::Brake => "B ERR",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            FaultCause::TimedOut => "session timed out",
            FaultCause::NotResponding => "motor did not respond to drive",
            FaultCause::CurrentSensor => "current draw never registered",
            FaultCause::Brake => "brake mode did not stop the motor",
        }
    }
}

/// Outcome of a scored session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub classification: Classification,
    pub final_score: f64,
    pub motor_responded: bool,
    pub current_responded: bool,
    pub timed_out: bool,
    pub brake_responded: bool,
}

impl Verdict {
    /// Highest-priority forced-fail cause, if any flag forced the verdict.
    pub fn primary_fault(&self) -> Option<FaultCause> {
        if self.timed_out {
            Some(FaultCause::TimedOut)
        } else if !self.motor_responded {
            Some(FaultCause::NotResponding)
        } else if !self.current_responded {
            Some(FaultCause::CurrentSensor)
        } else if !self.brake_responded {
            Some(FaultCause::Brake)
        } else {
            None
        }
    }
}

/// Something notable that happened on a port during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    Detected,
    Debounced,
    Admitted,
    TestPointRecorded { index: usize },
    SweepComplete,
    CoastMeasured { ms: u64 },
    BrakeMeasured { ms: u64 },
    Stalled,
    ReverseResponded,
    TimedOut,
    Scored(Verdict),
    Cancelled,
    Retested,
}

/// A `PortEvent` tagged with where and when it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub port: usize,
    pub at_ms: u64,
    pub event: PortEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict() -> Verdict {
        Verdict {
            classification: Classification::Fail,
            final_score: 0.0,
            motor_responded: true,
            current_responded: true,
            timed_out: false,
            brake_responded: true,
        }
    }

    #[test]
    fn timeout_outranks_other_faults() {
        let v = Verdict {
            timed_out: true,
            motor_responded: false,
            brake_responded: false,
            ..verdict()
        };
        assert_eq!(v.primary_fault(), Some(FaultCause::TimedOut));
    }

    #[test]
    fn current_outranks_brake() {
        let v = Verdict {
            current_responded: false,
            brake_responded: false,
            ..verdict()
        };
        assert_eq!(v.primary_fault(), Some(FaultCause::CurrentSensor));
    }

    #[test]
    fn score_only_failure_has_no_cause() {
        assert_eq!(verdict().primary_fault(), None);
    }
}
