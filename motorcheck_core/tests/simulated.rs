//! End-to-end runs against the simulated motor bus on a virtual clock.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crossbeam_channel as xch;
use motorcheck_core::runner::{self, OperatorCommand, RunParams, StopReason};
use motorcheck_core::{Classification, DiagnosticsEngine, FaultCause, LifecycleState, PortEvent};
use motorcheck_hardware::{MotorFault, SimClock, SimParams, SimulatedBus};
use rstest::rstest;

fn sim_engine(setup: impl FnOnce(&mut SimulatedBus)) -> DiagnosticsEngine<SimulatedBus> {
    let clock = Arc::new(SimClock::new());
    let mut bus = SimulatedBus::new(21, SimParams::default(), clock.clone());
    setup(&mut bus);
    DiagnosticsEngine::builder()
        .with_bus(bus)
        .with_clock(clock)
        .build()
        .expect("engine builds")
}

#[rstest]
fn healthy_motor_passes_and_feeds_fleet() {
    let mut engine = sim_engine(|bus| {
        bus.plug_motor(0, None).expect("port 0");
    });
    let summary = runner::run(&mut engine, RunParams::default()).expect("run");

    assert_eq!(summary.stop, StopReason::Settled);
    assert!(summary.elapsed_ms < 8000, "took {} ms", summary.elapsed_ms);

    let snap = engine.snapshot(0).expect("port 0");
    assert_eq!(snap.state(), LifecycleState::Pass);
    assert_eq!(snap.record.results.len(), engine.references().len());
    let v = snap.verdict().expect("verdict");
    assert!(v.motor_responded && v.current_responded && v.brake_responded);
    assert!(!v.timed_out);

    let ms = |pred: fn(&PortEvent) -> Option<u64>| summary.events.iter().find_map(|e| pred(&e.event));
    let coast = ms(|e| match e {
        PortEvent::CoastMeasured { ms } => Some(*ms),
        _ => None,
    })
    .expect("coast measured");
    let brake = ms(|e| match e {
        PortEvent::BrakeMeasured { ms } => Some(*ms),
        _ => None,
    })
    .expect("brake measured");
    assert!(coast > brake);

    let fleet = engine.fleet();
    assert_eq!(fleet.sessions, 1);
    assert_eq!(fleet.mean_coast_ms, Some(coast as f64));
    assert!(fleet.per_index.iter().all(|m| m.samples == 1));
    assert_eq!(engine.admission_in_use(), 0);
    assert_eq!(engine.bus().drive_mv(0), Some(0));
}

#[rstest]
#[case::stalled(MotorFault::Stalled, Some(FaultCause::NotResponding))]
#[case::dead_current(MotorFault::DeadCurrentSensor, Some(FaultCause::CurrentSensor))]
#[case::weak_brake(MotorFault::WeakBrake, Some(FaultCause::Brake))]
#[case::slow(MotorFault::Slow(0.4), None)]
fn faulty_motor_fails(#[case] fault: MotorFault, #[case] cause: Option<FaultCause>) {
    let mut engine = sim_engine(|bus| {
        bus.plug_motor(3, Some(fault)).expect("port 3");
        bus.plug_motor(4, None).expect("port 4");
    });
    let summary = runner::run(&mut engine, RunParams::default()).expect("run");
    assert_eq!(summary.stop, StopReason::Settled);

    let v = engine
        .snapshot(3)
        .expect("port 3")
        .verdict()
        .expect("verdict");
    assert_eq!(v.classification, Classification::Fail);
    assert_eq!(v.primary_fault(), cause);
    assert_eq!(
        engine.snapshot(4).expect("port 4").state(),
        LifecycleState::Pass
    );
}

#[rstest]
fn non_motor_devices_are_ignored() {
    let mut engine = sim_engine(|bus| {
        bus.plug_other(5).expect("port 5");
    });
    let params = RunParams {
        max_run_ms: 200,
        ..RunParams::default()
    };
    let summary = runner::run(&mut engine, params).expect("run");
    assert_eq!(summary.stop, StopReason::MaxRunTime);
    assert!(summary.events.is_empty());
    assert_eq!(
        engine.snapshot(5).expect("port 5").state(),
        LifecycleState::Idle
    );
}

#[rstest]
fn operator_retest_runs_a_second_session() {
    let mut engine = sim_engine(|bus| {
        bus.plug_motor(7, None).expect("port 7");
    });
    runner::run(&mut engine, RunParams::default()).expect("first run");
    assert_eq!(engine.fleet().sessions, 1);

    let (tx, rx) = xch::unbounded();
    tx.send(OperatorCommand::Retest(7)).expect("send");
    tx.send(OperatorCommand::Retest(99)).expect("send");
    let params = RunParams {
        commands: Some(rx),
        ..RunParams::default()
    };
    let summary = runner::run(&mut engine, params).expect("second run");

    let kinds: Vec<&PortEvent> = summary
        .events
        .iter()
        .filter(|e| e.port == 7)
        .map(|e| &e.event)
        .collect();
    assert_eq!(kinds.first(), Some(&&PortEvent::Retested));
    assert!(matches!(kinds.last(), Some(PortEvent::Scored(_))));
    assert_eq!(engine.fleet().sessions, 2);
}

#[rstest]
fn shutdown_flag_stops_before_first_tick() {
    let mut engine = sim_engine(|bus| {
        bus.plug_motor(0, None).expect("port 0");
    });
    let params = RunParams {
        shutdown: Some(Arc::new(AtomicBool::new(true))),
        ..RunParams::default()
    };
    let summary = runner::run(&mut engine, params).expect("run");
    assert_eq!(summary.stop, StopReason::Shutdown);
    assert_eq!(summary.ticks, 0);
}

#[rstest]
fn zero_tick_period_is_rejected() {
    let mut engine = sim_engine(|_| {});
    let params = RunParams {
        tick_ms: 0,
        ..RunParams::default()
    };
    assert!(runner::run(&mut engine, params).is_err());
}

#[rstest]
fn unplugging_during_run_cancels_session() {
    let mut engine = sim_engine(|bus| {
        bus.plug_motor(2, None).expect("port 2");
    });
    let params = RunParams {
        max_run_ms: 400,
        stop_when_settled: false,
        ..RunParams::default()
    };
    runner::run(&mut engine, params).expect("run");
    assert_eq!(
        engine.snapshot(2).expect("port 2").state(),
        LifecycleState::SweepTestPoints
    );

    engine.bus_mut().unplug(2).expect("unplug");
    let events = engine.tick();
    assert!(events.iter().any(|e| e.port == 2 && e.event == PortEvent::Cancelled));
    assert_eq!(engine.admission_in_use(), 0);
    assert_eq!(engine.fleet().sessions, 0);
}
