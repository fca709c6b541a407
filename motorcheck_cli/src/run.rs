//! Simulated-bus assembly, the diagnostic run, and result reporting.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use motorcheck_core::error::Result as CoreResult;
use motorcheck_core::runner::{self, RunParams, RunSummary};
use motorcheck_core::{
    DiagnosticsCfg, DiagnosticsEngine, FleetSnapshot, PortSnapshot, ReferenceTable,
};
use motorcheck_hardware::{SimClock, SimParams, SimulatedBus};
use motorcheck_traits::{Clock, MonotonicClock};
use serde_json::json;

use crate::cli::{FaultSpec, RtLock};
use crate::rt::setup_rt_once;

/// What to plug where, with 1-based port numbers as typed by the operator.
#[derive(Debug, Clone, Default)]
pub struct BusLayout {
    pub motors: Vec<usize>,
    pub faults: Vec<FaultSpec>,
    pub others: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub virtual_time: bool,
    pub max_run_ms: Option<u64>,
    pub stats: bool,
    pub json: bool,
    pub rt: bool,
    pub rt_prio: Option<i32>,
    pub rt_lock: Option<RtLock>,
}

/// Verdict counts of one run; `incomplete` ports never reached a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    pub incomplete: usize,
}

impl RunOutcome {
    pub fn all_ok(&self) -> bool {
        self.failed == 0 && self.incomplete == 0
    }
}

pub fn sim_params(cfg: &motorcheck_config::SimulationCfg) -> SimParams {
    SimParams {
        spinup_tau_ms: cfg.spinup_tau_ms,
        coast_tau_ms: cfg.coast_tau_ms,
        brake_tau_ms: cfg.brake_tau_ms,
        current_per_volt: cfg.current_per_volt,
        velocity_noise: cfg.velocity_noise,
        ..SimParams::default()
    }
}

/// Pick the reference table: CSV rows > inline TOML rows > built-in table.
pub fn resolve_references(
    cfg: &motorcheck_config::Config,
    csv_rows: Option<&[motorcheck_config::TestPointRow]>,
) -> CoreResult<ReferenceTable> {
    let rows = csv_rows.unwrap_or(cfg.test_points.as_slice());
    if rows.is_empty() {
        return Ok(ReferenceTable::default());
    }
    ReferenceTable::try_from(rows).map_err(eyre::Report::new)
}

/// Plug the simulated devices; ports are checked against the bus size.
pub fn build_bus(
    ports: usize,
    params: SimParams,
    clock: Arc<dyn Clock + Send + Sync>,
    layout: &BusLayout,
) -> CoreResult<SimulatedBus> {
    let check = |port: usize| -> CoreResult<usize> {
        if port == 0 || port > ports {
            eyre::bail!("port {port} is outside 1..={ports} (bus.ports)");
        }
        Ok(port - 1)
    };

    let mut bus = SimulatedBus::new(ports, params, clock);
    for &port in &layout.motors {
        let fault = layout
            .faults
            .iter()
            .rev()
            .find(|f| f.port == port)
            .map(|f| f.fault);
        bus.plug_motor(check(port)?, fault)?;
    }
    for f in &layout.faults {
        if !layout.motors.contains(&f.port) {
            bus.plug_motor(check(f.port)?, Some(f.fault))?;
        }
    }
    for &port in &layout.others {
        if layout.motors.contains(&port) || layout.faults.iter().any(|f| f.port == port) {
            eyre::bail!("port {port} cannot hold both a motor and another device");
        }
        bus.plug_other(check(port)?)?;
    }
    Ok(bus)
}

pub fn run_diagnostics(
    cfg: &motorcheck_config::Config,
    references: ReferenceTable,
    layout: &BusLayout,
    opts: RunOptions,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<RunOutcome> {
    setup_rt_once(
        opts.rt,
        opts.rt_prio,
        opts.rt_lock.unwrap_or_else(RtLock::os_default),
    );

    let clock: Arc<dyn Clock + Send + Sync> = if opts.virtual_time {
        Arc::new(SimClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    };
    let bus = build_bus(
        cfg.bus.ports,
        sim_params(&cfg.simulation),
        Arc::clone(&clock),
        layout,
    )?;

    let mut engine = DiagnosticsEngine::builder()
        .with_config(DiagnosticsCfg::from(cfg))
        .with_references(references)
        .with_clock(clock)
        .with_ports(cfg.bus.ports)
        .with_bus(bus)
        .build()?;

    let params = RunParams {
        tick_ms: cfg.runner.tick_ms,
        max_run_ms: opts.max_run_ms.unwrap_or(cfg.runner.max_run_ms),
        stop_when_settled: true,
        commands: None,
        shutdown: Some(shutdown),
    };
    let summary = runner::run(&mut engine, params)?;

    let mut ports: Vec<usize> = layout
        .motors
        .iter()
        .copied()
        .chain(layout.faults.iter().map(|f| f.port))
        .collect();
    ports.sort_unstable();
    ports.dedup();

    let mut outcome = RunOutcome::default();
    for port in ports {
        let snap = engine.snapshot(port - 1)?;
        match snap.verdict().map(|v| v.classification) {
            Some(motorcheck_core::Classification::Pass) => outcome.passed += 1,
            Some(motorcheck_core::Classification::Warning) => outcome.warned += 1,
            Some(motorcheck_core::Classification::Fail) => outcome.failed += 1,
            None => outcome.incomplete += 1,
        }
        if opts.json {
            println!("{}", port_json(&snap));
        } else {
            println!("{}", port_line(&snap));
        }
    }

    let fleet = engine.fleet();
    if opts.json {
        println!("{}", fleet_json(&fleet));
    } else {
        print_fleet(&fleet);
    }
    if opts.stats {
        print_stats(&summary);
    }
    tracing::info!(?outcome, stop = ?summary.stop, "run complete");
    Ok(outcome)
}

fn port_line(snap: &PortSnapshot) -> String {
    let port = snap.port + 1;
    match snap.verdict() {
        Some(v) => {
            let fault = v
                .primary_fault()
                .map(|f| format!("  {} ({})", f.code(), f.describe()))
                .unwrap_or_default();
            format!(
                "port {port:>2}  {:<7}  score {:>7.1}{fault}",
                v.classification.as_str().to_ascii_uppercase(),
                v.final_score
            )
        }
        None => format!("port {port:>2}  INCOMPLETE  ({})", snap.state().label()),
    }
}

fn port_json(snap: &PortSnapshot) -> serde_json::Value {
    let port = snap.port + 1;
    let r = &snap.record;
    match (snap.verdict(), snap.report) {
        (Some(v), Some(report)) => json!({
            "port": port,
            "classification": v.classification.as_str(),
            "score": v.final_score,
            "fault": v.primary_fault().map(|f| f.code()),
            "motor_responded": v.motor_responded,
            "current_responded": v.current_responded,
            "brake_responded": v.brake_responded,
            "timed_out": v.timed_out,
            "coast_ms": r.coast_duration_ms,
            "brake_ms": r.brake_duration_ms,
            "breakdown": {
                "speed": report.breakdown.speed,
                "current": report.breakdown.current,
                "coast": report.breakdown.coast,
                "brake": report.breakdown.brake,
            },
            "results": r.results.iter().map(|t| json!({
                "settle_speed": t.settle_speed,
                "settle_current": t.settle_current,
            })).collect::<Vec<_>>(),
            "samples": r.log.len(),
        }),
        _ => json!({
            "port": port,
            "classification": null,
            "state": snap.state().label(),
        }),
    }
}

fn fleet_json(fleet: &FleetSnapshot) -> serde_json::Value {
    json!({
        "fleet": {
            "sessions": fleet.sessions,
            "mean_coast_ms": fleet.mean_coast_ms,
            "mean_brake_ms": fleet.mean_brake_ms,
            "per_index": fleet.per_index.iter().map(|m| json!({
                "index": m.index,
                "samples": m.samples,
                "settle_speed": m.settle_speed,
                "settle_current": m.settle_current,
            })).collect::<Vec<_>>(),
        }
    })
}

fn print_fleet(fleet: &FleetSnapshot) {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x:.1}"));
    println!(
        "fleet: {} session(s), mean coast {} ms, mean brake {} ms",
        fleet.sessions,
        fmt(fleet.mean_coast_ms),
        fmt(fleet.mean_brake_ms)
    );
    for m in &fleet.per_index {
        println!(
            "  test point {}: speed {} rpm, current {} ({} sample(s))",
            m.index + 1,
            fmt(m.settle_speed),
            fmt(m.settle_current),
            m.samples
        );
    }
}

/// Print tick-loop stats to stderr.
fn print_stats(summary: &RunSummary) {
    eprintln!("\n--- Motorcheck Stats ---");
    eprintln!("Ticks: {}", summary.ticks);
    eprintln!("Elapsed (ms): {}", summary.elapsed_ms);
    eprintln!("Events: {}", summary.events.len());
    eprintln!("Missed deadlines (> period): {}", summary.missed_deadlines);
    eprintln!("Stop: {:?}", summary.stop);
    eprintln!("------------------------\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use motorcheck_hardware::MotorFault;
    use motorcheck_traits::{DeviceKind, PortSensor};

    fn clock() -> Arc<dyn Clock + Send + Sync> {
        Arc::new(SimClock::new())
    }

    #[test]
    fn layout_maps_to_zero_based_ports() {
        let layout = BusLayout {
            motors: vec![1, 3],
            faults: vec![FaultSpec {
                port: 5,
                fault: MotorFault::Stalled,
            }],
            others: vec![2],
        };
        let mut bus = build_bus(21, SimParams::default(), clock(), &layout).unwrap();
        assert_eq!(bus.plugged_device(0), DeviceKind::Motor);
        assert_eq!(bus.plugged_device(1), DeviceKind::Other);
        assert_eq!(bus.plugged_device(2), DeviceKind::Motor);
        assert_eq!(bus.plugged_device(4), DeviceKind::Motor);
        assert_eq!(bus.plugged_device(3), DeviceKind::None);
    }

    #[test]
    fn out_of_range_and_conflicting_ports_are_rejected() {
        let too_far = BusLayout {
            motors: vec![9],
            ..BusLayout::default()
        };
        assert!(build_bus(8, SimParams::default(), clock(), &too_far).is_err());
        let both = BusLayout {
            motors: vec![2],
            others: vec![2],
            ..BusLayout::default()
        };
        assert!(build_bus(21, SimParams::default(), clock(), &both).is_err());
    }

    #[test]
    fn csv_rows_win_over_inline_rows() {
        let mut cfg = motorcheck_config::Config::default();
        cfg.test_points = vec![motorcheck_config::TestPointRow {
            drive_mv: 3000,
            settle_speed: 58.0,
            settle_current: 30,
        }];
        let inline = resolve_references(&cfg, None).unwrap();
        assert_eq!(inline.len(), 1);
        let csv = [
            motorcheck_config::TestPointRow {
                drive_mv: 6000,
                settle_speed: 117.0,
                settle_current: 70,
            };
            2
        ];
        assert_eq!(resolve_references(&cfg, Some(&csv)).unwrap().len(), 2);
        let none = motorcheck_config::Config::default();
        assert_eq!(resolve_references(&none, None).unwrap(), ReferenceTable::default());
    }
}
