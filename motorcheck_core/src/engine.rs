//! The diagnostics engine: owns the bus, one state machine per port, the
//! admission controller and the fleet statistics.

use std::sync::Arc;
use std::time::Instant;

use motorcheck_traits::{Clock, PortActuator, PortSensor};

use crate::admission::AdmissionController;
use crate::builder::{EngineBuilder, Missing};
use crate::config::{DiagnosticsCfg, ReferenceTable};
use crate::error::{DiagError, Result};
use crate::fleet::{FleetSnapshot, FleetStats};
use crate::hw_error::map_hw_error;
use crate::machine::{ActuatorCommand, MachineCtx, PortMachine};
use crate::record::{LifecycleState, PortRecord};
use crate::sampler::{PortSample, TelemetrySampler};
use crate::scoring::ScoreReport;
use crate::status::{EngineEvent, PortEvent, Verdict};

/// Read-only copy of one port for display and reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSnapshot {
    pub port: usize,
    pub record: PortRecord,
    pub report: Option<ScoreReport>,
}

impl PortSnapshot {
    pub fn state(&self) -> LifecycleState {
        self.record.lifecycle_state
    }

    /// Verdict of the completed session, if the port is terminal.
    pub fn verdict(&self) -> Option<Verdict> {
        if !self.record.lifecycle_state.is_terminal() {
            return None;
        }
        self.report.map(|r| r.verdict(&self.record))
    }
}

pub struct DiagnosticsEngine<B> {
    pub(crate) bus: B,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) cfg: DiagnosticsCfg,
    pub(crate) references: ReferenceTable,
    pub(crate) sampler: TelemetrySampler,
    pub(crate) admission: AdmissionController,
    pub(crate) fleet: FleetStats,
    pub(crate) machines: Vec<PortMachine>,
    /// Events raised between ticks (retests), emitted with the next tick.
    pub(crate) pending: Vec<EngineEvent>,
}

impl<B> core::fmt::Debug for DiagnosticsEngine<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiagnosticsEngine")
            .field("ports", &self.machines.len())
            .field("admission_in_use", &self.admission.in_use())
            .field("sessions", &self.fleet.sessions())
            .finish_non_exhaustive()
    }
}

fn apply_commands<A: PortActuator + ?Sized>(
    bus: &mut A,
    port: usize,
    commands: &[ActuatorCommand],
    motor_present: bool,
) {
    for cmd in commands {
        let res = match *cmd {
            ActuatorCommand::Voltage(mv) => bus.command_voltage(port, mv),
            ActuatorCommand::BrakeMode(mode) => bus.command_brake_mode(port, mode),
        };
        if let Err(e) = res {
            let err = map_hw_error(&*e);
            if motor_present {
                tracing::warn!(port, ?cmd, error = %err, "actuator command failed");
            } else {
                tracing::debug!(port, ?cmd, error = %err, "command to vacated port failed");
            }
        }
    }
}

fn log_event(ev: &EngineEvent) {
    match &ev.event {
        PortEvent::Scored(v) => tracing::info!(
            port = ev.port,
            at_ms = ev.at_ms,
            classification = %v.classification,
            score = v.final_score,
            fault = v.primary_fault().map(|f| f.code()),
            "port scored"
        ),
        PortEvent::TimedOut | PortEvent::Stalled => {
            tracing::warn!(port = ev.port, at_ms = ev.at_ms, event = ?ev.event, "port event");
        }
        other => tracing::debug!(port = ev.port, at_ms = ev.at_ms, event = ?other, "port event"),
    }
}

impl<B: PortSensor + PortActuator> DiagnosticsEngine<B> {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder<B, Missing> {
        EngineBuilder::default()
    }

    /// Milliseconds since the engine was built.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// One pass over every port in index order.
    pub fn tick(&mut self) -> Vec<EngineEvent> {
        let now = self.now_ms();
        let mut events = std::mem::take(&mut self.pending);

        let ctx = MachineCtx {
            cfg: &self.cfg,
            table: &self.references,
            sampler: &self.sampler,
            admission: &self.admission,
        };

        for (port, machine) in self.machines.iter_mut().enumerate() {
            let sample = PortSample::read(&mut self.bus, port);
            let advance = machine.advance(&sample, now, &ctx);
            apply_commands(
                &mut self.bus,
                port,
                &advance.commands,
                sample.device.is_motor(),
            );
            for event in advance.events {
                if matches!(event, PortEvent::Scored(_)) {
                    self.fleet.record(machine.record());
                }
                let ev = EngineEvent {
                    port,
                    at_ms: now,
                    event,
                };
                log_event(&ev);
                events.push(ev);
            }
        }
        events
    }

    fn check_port(&self, port: usize) -> Result<()> {
        if port >= self.machines.len() {
            return Err(eyre::Report::new(DiagError::InvalidPort {
                port,
                ports: self.machines.len(),
            }));
        }
        Ok(())
    }

    pub fn snapshot(&self, port: usize) -> Result<PortSnapshot> {
        self.check_port(port)?;
        let m = &self.machines[port];
        Ok(PortSnapshot {
            port,
            record: m.record().clone(),
            report: m.report().copied(),
        })
    }

    pub fn snapshots(&self) -> Vec<PortSnapshot> {
        self.machines
            .iter()
            .enumerate()
            .map(|(port, m)| PortSnapshot {
                port,
                record: m.record().clone(),
                report: m.report().copied(),
            })
            .collect()
    }

    /// Reset a port with a verdict back to `Idle` so it is tested again.
    pub fn retest(&mut self, port: usize) -> Result<()> {
        self.check_port(port)?;
        let advance = self.machines[port]
            .retest(&self.admission)
            .map_err(eyre::Report::new)?;
        let motor_present = self.machines[port].record().device_kind.is_motor();
        apply_commands(&mut self.bus, port, &advance.commands, motor_present);
        let at_ms = self.now_ms();
        for event in advance.events {
            let ev = EngineEvent { port, at_ms, event };
            log_event(&ev);
            self.pending.push(ev);
        }
        Ok(())
    }

    pub fn fleet(&self) -> FleetSnapshot {
        self.fleet.snapshot()
    }

    pub fn admission_in_use(&self) -> usize {
        self.admission.in_use()
    }

    /// True when no port is between detection and a verdict.
    pub fn all_settled(&self) -> bool {
        self.machines.iter().all(|m| !m.state().in_session())
    }

    /// Command 0 V on every port (best-effort).
    pub fn stop_all(&mut self) {
        for port in 0..self.machines.len() {
            let motor_present = self.machines[port].record().device_kind.is_motor();
            apply_commands(
                &mut self.bus,
                port,
                &[ActuatorCommand::Voltage(0)],
                motor_present,
            );
        }
    }

    pub fn ports(&self) -> usize {
        self.machines.len()
    }

    pub fn config(&self) -> &DiagnosticsCfg {
        &self.cfg
    }

    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
