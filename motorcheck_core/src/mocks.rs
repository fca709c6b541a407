//! Test and helper mocks for motorcheck_core

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use motorcheck_traits::{BoxError, BrakeMode, Clock, DeviceKind, PortActuator, PortSensor};

use crate::machine::ActuatorCommand;

/// What a scripted port reports when read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortScript {
    pub device: DeviceKind,
    pub velocity: f64,
    pub current: i32,
    pub applied_mv: i32,
}

/// A bus whose readings are set directly by the test and which records
/// every command it receives.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBus {
    ports: Vec<PortScript>,
    commands: Vec<(usize, ActuatorCommand)>,
    fail_commands: bool,
}

impl ScriptedBus {
    pub fn new(ports: usize) -> Self {
        Self {
            ports: vec![PortScript::default(); ports],
            ..Self::default()
        }
    }

    pub fn script_mut(&mut self, port: usize) -> Option<&mut PortScript> {
        self.ports.get_mut(port)
    }

    pub fn set_device(&mut self, port: usize, device: DeviceKind) {
        if let Some(p) = self.ports.get_mut(port) {
            p.device = device;
        }
    }

    /// Plug a motor at rest.
    pub fn plug_motor(&mut self, port: usize) {
        if let Some(p) = self.ports.get_mut(port) {
            *p = PortScript {
                device: DeviceKind::Motor,
                ..PortScript::default()
            };
        }
    }

    pub fn unplug(&mut self, port: usize) {
        if let Some(p) = self.ports.get_mut(port) {
            *p = PortScript::default();
        }
    }

    pub fn set_motion(&mut self, port: usize, velocity: f64, current: i32) {
        if let Some(p) = self.ports.get_mut(port) {
            p.velocity = velocity;
            p.current = current;
        }
    }

    /// Make every subsequent command fail.
    pub fn fail_commands(&mut self, fail: bool) {
        self.fail_commands = fail;
    }

    pub fn commands(&self) -> &[(usize, ActuatorCommand)] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Most recent voltage commanded on `port`.
    pub fn last_voltage(&self, port: usize) -> Option<i32> {
        self.commands.iter().rev().find_map(|&(p, c)| match c {
            ActuatorCommand::Voltage(mv) if p == port => Some(mv),
            _ => None,
        })
    }

    fn accept(&mut self, port: usize, cmd: ActuatorCommand) -> Result<(), BoxError> {
        self.commands.push((port, cmd));
        if self.fail_commands {
            return Err(Box::new(std::io::Error::other("scripted command failure")));
        }
        Ok(())
    }
}

impl PortSensor for ScriptedBus {
    fn plugged_device(&mut self, port: usize) -> DeviceKind {
        self.ports.get(port).map(|p| p.device).unwrap_or_default()
    }
    fn velocity(&mut self, port: usize) -> f64 {
        self.ports.get(port).map_or(0.0, |p| p.velocity)
    }
    fn current_draw(&mut self, port: usize) -> i32 {
        self.ports.get(port).map_or(0, |p| p.current)
    }
    fn applied_voltage(&mut self, port: usize) -> i32 {
        self.ports.get(port).map_or(0, |p| p.applied_mv)
    }
}

impl PortActuator for ScriptedBus {
    fn command_voltage(&mut self, port: usize, millivolts: i32) -> Result<(), BoxError> {
        if let Some(p) = self.ports.get_mut(port) {
            p.applied_mv = millivolts;
        }
        self.accept(port, ActuatorCommand::Voltage(millivolts))
    }
    fn command_brake_mode(&mut self, port: usize, mode: BrakeMode) -> Result<(), BoxError> {
        self.accept(port, ActuatorCommand::BrakeMode(mode))
    }
}

/// Clock that only moves when told to; `sleep` advances it.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.offset_ms.load(Ordering::Relaxed)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::Relaxed))
    }

    fn sleep(&self, d: Duration) {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self.advance_ms(ms);
    }
}
