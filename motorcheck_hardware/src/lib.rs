//! Simulated hardware backends for the motor diagnostic engine.
//!
//! - `SimulatedBus`: a smart-port bus with first-order motor models and
//!   injectable faults, implementing `PortSensor` + `PortActuator`.
//! - `SimClock`: a virtual clock for deterministic, instant runs.
pub mod clock;
pub mod error;
pub mod sim;

pub use clock::SimClock;
pub use error::HwError;
pub use sim::{MAX_DRIVE_MV, MotorFault, SimParams, SimulatedBus};
