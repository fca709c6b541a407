#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Per-port motor diagnostic engine (hardware-agnostic).
//!
//! All hardware access goes through `motorcheck_traits::PortSensor` and
//! `motorcheck_traits::PortActuator`.
//!
//! ## Architecture
//!
//! - **Settle detection**: hysteresis + dwell classifier (`settle`)
//! - **Sampling**: EMA-smoothed velocity and acceleration, telemetry log (`sampler`)
//! - **Admission**: bound on concurrently driven motors (`admission`)
//! - **Scoring**: percentage-deviation score and classification (`scoring`)
//! - **Fleet**: running cross-port baselines (`fleet`)
//! - **State machine**: per-port lifecycle reducer (`machine`)
//! - **Engine**: owns the bus and all ports, one `tick()` per loop (`engine`)
//!
//! Timestamps are milliseconds since the engine was built.

pub mod admission;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod hw_error;
pub mod machine;
pub mod mocks;
pub mod record;
pub mod runner;
pub mod sampler;
pub mod scoring;
pub mod settle;
pub mod status;

pub use admission::AdmissionController;
pub use builder::{EngineBuilder, Missing, Set};
pub use config::{
    AdmissionCfg, DiagnosticsCfg, MAX_PORTS, ReferenceTable, SamplingCfg, ScoringCfg, SessionCfg,
    SettleCfg, TestPoint,
};
pub use engine::{DiagnosticsEngine, PortSnapshot};
pub use fleet::{FleetSnapshot, FleetStats, IndexMean};
pub use machine::{ActuatorCommand, Advance, MachineCtx, PortMachine};
pub use record::{LifecycleState, PortRecord, TelemetryLog, TelemetryRow, TestPointResult};
pub use runner::{OperatorCommand, RunParams, RunSummary, StopReason};
pub use sampler::{PortSample, TelemetrySampler};
pub use scoring::{ComponentBreakdown, ScoreReport};
pub use settle::{SettlePhase, SettleStep};
pub use status::{Classification, EngineEvent, FaultCause, PortEvent, Verdict};
