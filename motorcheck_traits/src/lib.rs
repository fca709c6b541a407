//! Hardware seam for the motor diagnostic engine.
//!
//! The engine never talks to a device directly. It reads point-in-time
//! values through `PortSensor` and issues drive commands through
//! `PortActuator`. Ports are 0-indexed.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type returned across the actuator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Kind of device currently plugged into a smart port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceKind {
    #[default]
    None,
    Motor,
    /// Radio, vision sensor, or anything else that is not a motor.
    Other,
}

impl DeviceKind {
    #[inline]
    pub fn is_motor(self) -> bool {
        matches!(self, DeviceKind::Motor)
    }
}

/// Behavior of a motor when commanded to zero drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrakeMode {
    Coast,
    Brake,
}

pub trait PortSensor {
    fn plugged_device(&mut self, port: usize) -> DeviceKind;
    /// Signed shaft velocity in device units (rpm).
    fn velocity(&mut self, port: usize) -> f64;
    /// Signed current draw in device units (mA).
    fn current_draw(&mut self, port: usize) -> i32;
    /// Voltage the motor controller is actually applying (mV).
    fn applied_voltage(&mut self, port: usize) -> i32;
}

pub trait PortActuator {
    fn command_voltage(&mut self, port: usize, millivolts: i32) -> Result<(), BoxError>;
    fn command_brake_mode(&mut self, port: usize, mode: BrakeMode) -> Result<(), BoxError>;
}

impl<T: PortSensor + ?Sized> PortSensor for Box<T> {
    fn plugged_device(&mut self, port: usize) -> DeviceKind {
        (**self).plugged_device(port)
    }
    fn velocity(&mut self, port: usize) -> f64 {
        (**self).velocity(port)
    }
    fn current_draw(&mut self, port: usize) -> i32 {
        (**self).current_draw(port)
    }
    fn applied_voltage(&mut self, port: usize) -> i32 {
        (**self).applied_voltage(port)
    }
}

impl<T: PortActuator + ?Sized> PortActuator for Box<T> {
    fn command_voltage(&mut self, port: usize, millivolts: i32) -> Result<(), BoxError> {
        (**self).command_voltage(port, millivolts)
    }
    fn command_brake_mode(&mut self, port: usize, mode: BrakeMode) -> Result<(), BoxError> {
        (**self).command_brake_mode(port, mode)
    }
}
