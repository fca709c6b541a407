//! Simulated smart-motor bus.
//!
//! Each motor follows a first-order velocity model integrated lazily against
//! a shared clock: every read or command first advances the motor to "now".
//! Driven motors approach `drive_mv * free_speed / 12000`; undriven motors
//! decay toward zero with a coast or brake time constant.

use std::sync::Arc;
use std::time::Instant;

use motorcheck_traits::{BoxError, BrakeMode, Clock, DeviceKind, PortActuator, PortSensor};

use crate::error::{HwError, Result};

/// Highest drive accepted by a motor (mV).
pub const MAX_DRIVE_MV: i32 = 12_000;

/// Injectable motor defects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorFault {
    /// Shaft never turns.
    Stalled,
    /// Current draw always reads 0.
    DeadCurrentSensor,
    /// Brake mode decays like coast.
    WeakBrake,
    /// Speed scaled by the factor, current scaled by its inverse.
    Slow(f64),
}

/// Motor model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    pub spinup_tau_ms: f64,
    pub coast_tau_ms: f64,
    pub brake_tau_ms: f64,
    /// Steady-state current per volt of drive (mA/V).
    pub current_per_volt: f64,
    /// Peak velocity noise added to reads (rpm).
    pub velocity_noise: f64,
    /// Unloaded speed at full drive (rpm).
    pub free_speed_rpm: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            spinup_tau_ms: 60.0,
            coast_tau_ms: 229.0,
            brake_tau_ms: 51.0,
            current_per_volt: 12.5,
            velocity_noise: 0.0,
            free_speed_rpm: 237.0,
        }
    }
}

#[derive(Debug, Clone)]
struct SimMotor {
    velocity: f64,
    drive_mv: i32,
    brake: BrakeMode,
    fault: Option<MotorFault>,
    updated_at: Instant,
    rng: u32,
}

impl SimMotor {
    fn speed_scale(&self) -> f64 {
        match self.fault {
            Some(MotorFault::Slow(f)) => f.clamp(0.05, 1.0),
            _ => 1.0,
        }
    }

    fn target(&self, p: &SimParams) -> f64 {
        if matches!(self.fault, Some(MotorFault::Stalled)) {
            return 0.0;
        }
        f64::from(self.drive_mv) * p.free_speed_rpm / f64::from(MAX_DRIVE_MV) * self.speed_scale()
    }

    fn advance_to(&mut self, now: Instant, p: &SimParams) {
        let dt_ms = now.saturating_duration_since(self.updated_at).as_secs_f64() * 1000.0;
        self.updated_at = now;
        if dt_ms <= 0.0 {
            return;
        }
        let tau = match (self.drive_mv, self.brake, self.fault) {
            (0, BrakeMode::Brake, Some(MotorFault::WeakBrake)) | (0, BrakeMode::Coast, _) => {
                p.coast_tau_ms
            }
            (0, BrakeMode::Brake, _) => p.brake_tau_ms,
            _ => p.spinup_tau_ms,
        };
        let target = self.target(p);
        self.velocity = target + (self.velocity - target) * (-dt_ms / tau).exp();
    }

    fn current(&self, p: &SimParams) -> i32 {
        if matches!(self.fault, Some(MotorFault::DeadCurrentSensor)) {
            return 0;
        }
        let steady = p.current_per_volt * f64::from(self.drive_mv.abs()) / 1000.0;
        let amps = match self.fault {
            Some(MotorFault::Stalled) => steady * 2.0,
            _ => steady / self.speed_scale() + 0.5 * (self.target(p) - self.velocity).abs(),
        };
        amps.round() as i32
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (f64::from(x) / f64::from(u32::MAX) * 2.0 - 1.0) * amplitude
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Empty,
    Other,
    Motor(SimMotor),
}

/// A bus of `ports` smart ports, each empty, holding a non-motor device, or
/// holding a simulated motor.
pub struct SimulatedBus {
    slots: Vec<Slot>,
    params: SimParams,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for SimulatedBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedBus")
            .field("ports", &self.slots.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl SimulatedBus {
    pub fn new(ports: usize, params: SimParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            slots: vec![Slot::Empty; ports],
            params,
            clock,
        }
    }

    pub fn ports(&self) -> usize {
        self.slots.len()
    }

    fn slot_mut(&mut self, port: usize) -> Result<&mut Slot> {
        let ports = self.slots.len();
        self.slots
            .get_mut(port)
            .ok_or(HwError::InvalidPort { port, ports })
    }

    /// Plug a motor at rest, optionally with a defect.
    pub fn plug_motor(&mut self, port: usize, fault: Option<MotorFault>) -> Result<()> {
        let updated_at = self.clock.now();
        let seed = 0x9E37_79B9_u32 ^ (port as u32).wrapping_mul(0x85EB_CA6B) | 1;
        *self.slot_mut(port)? = Slot::Motor(SimMotor {
            velocity: 0.0,
            drive_mv: 0,
            brake: BrakeMode::Coast,
            fault,
            updated_at,
            rng: seed,
        });
        tracing::debug!(port, ?fault, "sim: motor plugged");
        Ok(())
    }

    /// Plug a device that is not a motor (radio, vision sensor, ...).
    pub fn plug_other(&mut self, port: usize) -> Result<()> {
        *self.slot_mut(port)? = Slot::Other;
        Ok(())
    }

    pub fn unplug(&mut self, port: usize) -> Result<()> {
        *self.slot_mut(port)? = Slot::Empty;
        tracing::debug!(port, "sim: port unplugged");
        Ok(())
    }

    /// Last drive commanded on a motor port.
    pub fn drive_mv(&self, port: usize) -> Option<i32> {
        match self.slots.get(port)? {
            Slot::Motor(m) => Some(m.drive_mv),
            _ => None,
        }
    }

    fn motor_now(&mut self, port: usize) -> Option<&mut SimMotor> {
        let now = self.clock.now();
        match self.slots.get_mut(port)? {
            Slot::Motor(m) => {
                m.advance_to(now, &self.params);
                Some(m)
            }
            _ => None,
        }
    }

    fn motor_for_command(&mut self, port: usize) -> Result<&mut SimMotor> {
        let ports = self.slots.len();
        if port >= ports {
            return Err(HwError::InvalidPort { port, ports });
        }
        self.motor_now(port).ok_or(HwError::NotAMotor(port))
    }
}

impl PortSensor for SimulatedBus {
    fn plugged_device(&mut self, port: usize) -> DeviceKind {
        match self.slots.get(port) {
            Some(Slot::Motor(_)) => DeviceKind::Motor,
            Some(Slot::Other) => DeviceKind::Other,
            Some(Slot::Empty) | None => DeviceKind::None,
        }
    }

    fn velocity(&mut self, port: usize) -> f64 {
        let amplitude = self.params.velocity_noise;
        self.motor_now(port)
            .map_or(0.0, |m| m.velocity + m.noise(amplitude))
    }

    fn current_draw(&mut self, port: usize) -> i32 {
        let params = self.params;
        self.motor_now(port).map_or(0, |m| m.current(&params))
    }

    fn applied_voltage(&mut self, port: usize) -> i32 {
        self.motor_now(port).map_or(0, |m| m.drive_mv)
    }
}

impl PortActuator for SimulatedBus {
    fn command_voltage(&mut self, port: usize, millivolts: i32) -> std::result::Result<(), BoxError> {
        if !(-MAX_DRIVE_MV..=MAX_DRIVE_MV).contains(&millivolts) {
            return Err(Box::new(HwError::DriveOutOfRange(millivolts)));
        }
        let m = self.motor_for_command(port)?;
        m.drive_mv = millivolts;
        Ok(())
    }

    fn command_brake_mode(&mut self, port: usize, mode: BrakeMode) -> std::result::Result<(), BoxError> {
        let m = self.motor_for_command(port)?;
        m.brake = mode;
        tracing::trace!(port, ?mode, "sim: brake mode");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use std::time::Duration;

    fn bus() -> (SimulatedBus, Arc<SimClock>) {
        let clock = Arc::new(SimClock::new());
        let bus = SimulatedBus::new(3, SimParams::default(), clock.clone());
        (bus, clock)
    }

    /// Step in 3 ms increments until `pred` holds; returns elapsed ms.
    fn time_until(
        bus: &mut SimulatedBus,
        clock: &SimClock,
        port: usize,
        pred: impl Fn(f64) -> bool,
    ) -> u64 {
        let mut t = 0;
        while !pred(bus.velocity(port)) && t < 5000 {
            clock.advance(Duration::from_millis(3));
            t += 3;
        }
        t
    }

    #[test]
    fn full_drive_reaches_free_speed() {
        let (mut bus, clock) = bus();
        bus.plug_motor(0, None).unwrap();
        bus.command_voltage(0, 12_000).unwrap();
        clock.advance(Duration::from_secs(2));
        assert!((bus.velocity(0) - 237.0).abs() < 0.5);
        assert!((bus.current_draw(0) - 150).abs() <= 1);
        assert_eq!(bus.applied_voltage(0), 12_000);
    }

    #[test]
    fn coast_and_brake_times_match_reference_motor() {
        let (mut bus, clock) = bus();
        bus.plug_motor(0, None).unwrap();
        bus.command_voltage(0, 12_000).unwrap();
        clock.advance(Duration::from_secs(2));

        bus.command_brake_mode(0, BrakeMode::Coast).unwrap();
        bus.command_voltage(0, 0).unwrap();
        let coast = time_until(&mut bus, &clock, 0, |v| v.abs() < 5.0);
        assert!((850..=920).contains(&coast), "coast {coast} ms");

        bus.command_voltage(0, 12_000).unwrap();
        clock.advance(Duration::from_secs(2));
        bus.command_brake_mode(0, BrakeMode::Brake).unwrap();
        bus.command_voltage(0, 0).unwrap();
        let brake = time_until(&mut bus, &clock, 0, |v| v.abs() < 5.0);
        assert!((180..=215).contains(&brake), "brake {brake} ms");
    }

    #[test]
    fn stalled_motor_never_moves_but_draws_current() {
        let (mut bus, clock) = bus();
        bus.plug_motor(1, Some(MotorFault::Stalled)).unwrap();
        bus.command_voltage(1, 6000).unwrap();
        clock.advance(Duration::from_millis(500));
        assert_eq!(bus.velocity(1), 0.0);
        assert!(bus.current_draw(1) > 10);
    }

    #[test]
    fn dead_sensor_reads_zero_current() {
        let (mut bus, clock) = bus();
        bus.plug_motor(0, Some(MotorFault::DeadCurrentSensor)).unwrap();
        bus.command_voltage(0, 12_000).unwrap();
        clock.advance(Duration::from_millis(500));
        assert_eq!(bus.current_draw(0), 0);
        assert!(bus.velocity(0) > 200.0);
    }

    #[test]
    fn commands_to_non_motor_ports_fail_typed() {
        let (mut bus, _clock) = bus();
        bus.plug_other(2).unwrap();
        assert_eq!(bus.plugged_device(2), DeviceKind::Other);
        let err = bus.command_voltage(2, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HwError>(),
            Some(HwError::NotAMotor(2))
        ));
        let err = bus.command_voltage(7, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HwError>(),
            Some(HwError::InvalidPort { port: 7, ports: 3 })
        ));
    }

    #[test]
    fn out_of_range_drive_rejected() {
        let (mut bus, _clock) = bus();
        bus.plug_motor(0, None).unwrap();
        assert!(bus.command_voltage(0, 12_001).is_err());
        assert_eq!(bus.drive_mv(0), Some(0));
    }

    #[test]
    fn unplug_reports_none() {
        let (mut bus, _clock) = bus();
        bus.plug_motor(0, None).unwrap();
        bus.unplug(0).unwrap();
        assert_eq!(bus.plugged_device(0), DeviceKind::None);
        assert!(bus.unplug(9).is_err());
    }
}
