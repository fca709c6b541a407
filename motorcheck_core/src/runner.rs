//! Fixed-cadence tick loop around a `DiagnosticsEngine`.
//!
//! Operator commands arrive over a crossbeam channel and are applied between
//! ticks. The loop sleeps on the engine's clock, so a virtual clock makes
//! runs instant and deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use motorcheck_traits::{PortActuator, PortSensor};

use crate::engine::DiagnosticsEngine;
use crate::error::{DiagError, Result as CoreResult};
use crate::status::{EngineEvent, PortEvent};

/// Commands an operator can send to a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Retest(usize),
}

#[derive(Debug)]
pub struct RunParams {
    pub tick_ms: u64,
    pub max_run_ms: u64,
    /// End once something was scored and no port is mid-session.
    pub stop_when_settled: bool,
    pub commands: Option<xch::Receiver<OperatorCommand>>,
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            tick_ms: 3,
            max_run_ms: 30_000,
            stop_when_settled: true,
            commands: None,
            shutdown: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Settled,
    MaxRunTime,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub elapsed_ms: u64,
    /// Ticks whose work took at least a full period.
    pub missed_deadlines: u64,
    pub events: Vec<EngineEvent>,
    pub stop: StopReason,
}

/// Time left in the current period, or `None` if the deadline was missed.
#[inline]
fn remaining_in_period(spent_ms: u64, tick_ms: u64) -> Option<u64> {
    (spent_ms < tick_ms).then(|| tick_ms - spent_ms)
}

fn apply_operator_commands<B: PortSensor + PortActuator>(
    engine: &mut DiagnosticsEngine<B>,
    rx: &xch::Receiver<OperatorCommand>,
) {
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            OperatorCommand::Retest(port) => {
                if let Err(e) = engine.retest(port) {
                    tracing::warn!(port, error = %e, "retest rejected");
                }
            }
        }
    }
}

/// Drive `engine` until settled, shut down, or out of time. Every port is
/// commanded to 0 V before returning.
pub fn run<B: PortSensor + PortActuator>(
    engine: &mut DiagnosticsEngine<B>,
    params: RunParams,
) -> CoreResult<RunSummary> {
    if params.tick_ms == 0 {
        return Err(eyre::Report::new(DiagError::Config(
            "tick_ms must be >= 1".into(),
        )));
    }

    let clock = Arc::clone(engine.clock());
    let start = engine.now_ms();
    let mut ticks = 0u64;
    let mut missed_deadlines = 0u64;
    let mut scored = 0u64;
    let mut events = Vec::new();

    tracing::info!(
        ports = engine.ports(),
        tick_ms = params.tick_ms,
        max_run_ms = params.max_run_ms,
        "diagnostic run start"
    );

    let stop = loop {
        if params
            .shutdown
            .as_ref()
            .is_some_and(|s| s.load(Ordering::Relaxed))
        {
            break StopReason::Shutdown;
        }
        if engine.now_ms().saturating_sub(start) >= params.max_run_ms {
            break StopReason::MaxRunTime;
        }
        if let Some(rx) = params.commands.as_ref() {
            apply_operator_commands(engine, rx);
        }

        let tick_start = engine.now_ms();
        let batch = engine.tick();
        ticks += 1;
        scored += batch
            .iter()
            .filter(|e| matches!(e.event, PortEvent::Scored(_)))
            .count() as u64;
        events.extend(batch);

        if params.stop_when_settled && scored > 0 && engine.all_settled() {
            break StopReason::Settled;
        }

        let spent = engine.now_ms().saturating_sub(tick_start);
        match remaining_in_period(spent, params.tick_ms) {
            Some(ms) => clock.sleep(Duration::from_millis(ms)),
            None => missed_deadlines += 1,
        }
    };

    engine.stop_all();
    let elapsed_ms = engine.now_ms().saturating_sub(start);
    tracing::info!(ticks, elapsed_ms, missed_deadlines, ?stop, "diagnostic run end");

    Ok(RunSummary {
        ticks,
        elapsed_ms,
        missed_deadlines,
        events,
        stop,
    })
}
