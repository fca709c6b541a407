//! Per-port diagnostic state machine.
//!
//! `PortMachine::advance` is a reducer: given the port's readings for this
//! tick and the current time, it updates the record and returns the actuator
//! commands to issue plus the events raised. It never touches hardware, so
//! the whole lifecycle can be driven from synthetic samples.
//!
//! Per tick, in order:
//! 1. A non-motor reading outside `Idle` cancels the session.
//! 2. An active session past its timeout is forced to `Score`.
//! 3. Otherwise the current state's row is evaluated once.
//! 4. In states 3..=9 the telemetry sampler runs.

use motorcheck_traits::BrakeMode;

use crate::admission::AdmissionController;
use crate::config::{DiagnosticsCfg, ReferenceTable};
use crate::error::DiagError;
use crate::record::{LifecycleState, PortRecord, TestPointResult};
use crate::sampler::{PortSample, TelemetrySampler};
use crate::scoring::{self, ScoreReport};
use crate::settle::{self, SettlePhase};
use crate::status::PortEvent;

/// A command for the port's actuator, applied in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    Voltage(i32),
    BrakeMode(BrakeMode),
}

/// Output of one reducer step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Advance {
    pub commands: Vec<ActuatorCommand>,
    pub events: Vec<PortEvent>,
}

impl Advance {
    fn command(&mut self, c: ActuatorCommand) {
        self.commands.push(c);
    }
    fn event(&mut self, e: PortEvent) {
        self.events.push(e);
    }
}

/// Shared, read-mostly collaborators of every port machine.
#[derive(Debug, Clone, Copy)]
pub struct MachineCtx<'a> {
    pub cfg: &'a DiagnosticsCfg,
    pub table: &'a ReferenceTable,
    pub sampler: &'a TelemetrySampler,
    pub admission: &'a AdmissionController,
}

#[derive(Debug, Clone, Default)]
pub struct PortMachine {
    record: PortRecord,
    report: Option<ScoreReport>,
}

impl PortMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> &PortRecord {
        &self.record
    }

    /// Score details of the last completed session, if terminal.
    pub fn report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        self.record.lifecycle_state
    }

    /// Advance this port by one tick.
    pub fn advance(&mut self, sample: &PortSample, now_ms: u64, ctx: &MachineCtx<'_>) -> Advance {
        let mut out = Advance::default();

        if !sample.device.is_motor() {
            if self.record.lifecycle_state != LifecycleState::Idle {
                self.reset(ctx.admission, &mut out);
                out.event(PortEvent::Cancelled);
            }
            self.record.device_kind = sample.device;
            return out;
        }
        self.record.device_kind = sample.device;

        let state = self.record.lifecycle_state;
        if state.is_active()
            && now_ms.saturating_sub(self.record.session_start_ms) > ctx.cfg.session.timeout_ms
        {
            self.record.timed_out = true;
            self.record.lifecycle_state = LifecycleState::Score;
            out.event(PortEvent::TimedOut);
            return out;
        }

        self.evaluate(state, sample, now_ms, ctx, &mut out);

        if self.record.lifecycle_state.is_active() {
            ctx.sampler.sample(&mut self.record, sample, now_ms);
        }
        out
    }

    /// Operator-initiated retest; only valid once a verdict exists.
    pub fn retest(&mut self, admission: &AdmissionController) -> Result<Advance, DiagError> {
        let state = self.record.lifecycle_state;
        if !state.is_terminal() {
            return Err(DiagError::State(format!(
                "retest requires a verdict, port is {}",
                state.label()
            )));
        }
        let mut out = Advance::default();
        self.reset(admission, &mut out);
        out.event(PortEvent::Retested);
        Ok(out)
    }

    fn evaluate(
        &mut self,
        state: LifecycleState,
        sample: &PortSample,
        now_ms: u64,
        ctx: &MachineCtx<'_>,
        out: &mut Advance,
    ) {
        let session = &ctx.cfg.session;
        let rec = &mut self.record;
        let speed = sample.velocity.abs();

        match state {
            LifecycleState::Idle => {
                rec.last_plug_ms = now_ms;
                rec.lifecycle_state = LifecycleState::Detected;
                out.event(PortEvent::Detected);
            }
            LifecycleState::Detected => {
                if now_ms.saturating_sub(rec.last_plug_ms) >= session.debounce_ms
                    && speed < session.still_velocity
                {
                    rec.lifecycle_state = LifecycleState::Debounced;
                    out.event(PortEvent::Debounced);
                }
            }
            LifecycleState::Debounced => {
                if ctx.admission.try_acquire() {
                    rec.holds_slot = true;
                    rec.test_point_index = 0;
                    rec.settle_phase = SettlePhase::Idle;
                    rec.acceleration = 0.0;
                    rec.session_start_ms = now_ms;
                    rec.active_phase_start_ms = now_ms;
                    rec.motor_responded = false;
                    rec.current_responded = false;
                    rec.lifecycle_state = LifecycleState::SweepTestPoints;
                    out.event(PortEvent::Admitted);
                }
            }
            LifecycleState::SweepTestPoints => {
                let drive = ctx.table.get(rec.test_point_index).drive_mv;
                rec.requested_mv = drive;
                out.command(ActuatorCommand::Voltage(drive));

                if speed > session.motion_velocity {
                    rec.motor_responded = true;
                }
                if !rec.motor_responded
                    && now_ms.saturating_sub(rec.active_phase_start_ms) > session.response_timeout_ms
                {
                    // Recorded results and the sweep position survive the reversal.
                    rec.settle_phase = SettlePhase::Idle;
                    rec.lifecycle_state = LifecycleState::Stalled;
                    out.event(PortEvent::Stalled);
                    return;
                }

                let step = settle::step(rec.settle_phase, rec.acceleration, now_ms, &ctx.cfg.settle);
                rec.settle_phase = step.phase;
                if step.settled {
                    rec.results.push(TestPointResult {
                        settle_speed: sample.velocity,
                        settle_current: sample.current,
                    });
                    out.event(PortEvent::TestPointRecorded {
                        index: rec.test_point_index,
                    });
                    rec.test_point_index += 1;

                    if rec.test_point_index >= ctx.table.len() {
                        if rec.holds_slot {
                            ctx.admission.release();
                            rec.holds_slot = false;
                        }
                        rec.requested_mv = 0;
                        out.command(ActuatorCommand::Voltage(0));
                        rec.lifecycle_state = LifecycleState::CoastSpinup;
                        out.event(PortEvent::SweepComplete);
                    }
                }
            }
            LifecycleState::CoastSpinup | LifecycleState::BrakeSpinup => {
                if rec.holds_slot {
                    ctx.admission.release();
                    rec.holds_slot = false;
                }
                rec.requested_mv = session.spinup_mv;
                out.command(ActuatorCommand::Voltage(session.spinup_mv));

                let step = settle::step(rec.settle_phase, rec.acceleration, now_ms, &ctx.cfg.settle);
                rec.settle_phase = step.phase;
                if step.settled {
                    let (mode, next) = if state == LifecycleState::CoastSpinup {
                        (BrakeMode::Coast, LifecycleState::CoastWait)
                    } else {
                        (BrakeMode::Brake, LifecycleState::BrakeWait)
                    };
                    rec.active_phase_start_ms = now_ms;
                    rec.requested_mv = 0;
                    out.command(ActuatorCommand::BrakeMode(mode));
                    out.command(ActuatorCommand::Voltage(0));
                    rec.lifecycle_state = next;
                }
            }
            LifecycleState::CoastWait => {
                if speed < session.still_velocity {
                    let ms = now_ms.saturating_sub(rec.active_phase_start_ms);
                    rec.coast_duration_ms = ms;
                    rec.lifecycle_state = LifecycleState::BrakeSpinup;
                    out.event(PortEvent::CoastMeasured { ms });
                }
            }
            LifecycleState::BrakeWait => {
                if speed < session.still_velocity {
                    let ms = now_ms.saturating_sub(rec.active_phase_start_ms);
                    rec.brake_duration_ms = ms;
                    rec.lifecycle_state = LifecycleState::Score;
                    out.event(PortEvent::BrakeMeasured { ms });
                }
            }
            LifecycleState::Stalled => {
                rec.active_phase_start_ms = now_ms;
                let reverse = if rec.requested_mv <= 0 {
                    session.spinup_mv
                } else {
                    -session.spinup_mv
                };
                rec.requested_mv = reverse;
                out.command(ActuatorCommand::Voltage(reverse));
                rec.lifecycle_state = LifecycleState::ReverseCheck;
            }
            LifecycleState::ReverseCheck => {
                if speed > session.motion_velocity {
                    rec.motor_responded = true;
                    rec.session_start_ms = now_ms;
                    rec.lifecycle_state = LifecycleState::SweepTestPoints;
                    out.event(PortEvent::ReverseResponded);
                } else if now_ms.saturating_sub(rec.active_phase_start_ms)
                    > session.response_timeout_ms
                {
                    rec.lifecycle_state = LifecycleState::Score;
                }
            }
            LifecycleState::Score => {
                let report = scoring::score(rec, ctx.table, &ctx.cfg.scoring);
                rec.brake_responded = report.brake_responded;
                rec.final_score = report.final_score;
                rec.requested_mv = 0;
                out.command(ActuatorCommand::Voltage(0));
                if rec.holds_slot {
                    ctx.admission.release();
                    rec.holds_slot = false;
                }
                rec.lifecycle_state = report.classification.state();
                out.event(PortEvent::Scored(report.verdict(rec)));
                self.report = Some(report);
            }
            LifecycleState::Pass | LifecycleState::Warning | LifecycleState::Fail => {}
        }
    }

    fn reset(&mut self, admission: &AdmissionController, out: &mut Advance) {
        if self.record.holds_slot {
            admission.release();
        }
        self.record.reset_session();
        self.report = None;
        out.command(ActuatorCommand::Voltage(0));
    }
}
