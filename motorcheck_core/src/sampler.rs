//! Periodic telemetry sampling and signal conditioning for one port.
//!
//! Velocity is smoothed with an EMA; acceleration is derived from the
//! smoothed velocity and smoothed again. Every accepted sample is appended
//! to the port's telemetry log.

use motorcheck_traits::{DeviceKind, PortSensor};

use crate::config::{SamplingCfg, SessionCfg};
use crate::record::{PortRecord, TelemetryRow};

/// Point-in-time readings for one port, taken once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortSample {
    pub device: DeviceKind,
    pub velocity: f64,
    pub current: i32,
    pub applied_mv: i32,
}

impl PortSample {
    /// Read one sample through the sensor interface. Non-motor ports only
    /// report their device kind.
    pub fn read<S: PortSensor + ?Sized>(sensor: &mut S, port: usize) -> Self {
        let device = sensor.plugged_device(port);
        if !device.is_motor() {
            return Self {
                device,
                ..Self::default()
            };
        }
        Self {
            device,
            velocity: sensor.velocity(port),
            current: sensor.current_draw(port),
            applied_mv: sensor.applied_voltage(port),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetrySampler {
    interval_ms: u64,
    smoothing: f64,
    min_samples_for_accel: usize,
    current_threshold: i32,
}

impl TelemetrySampler {
    pub fn new(sampling: &SamplingCfg, session: &SessionCfg) -> Self {
        Self {
            interval_ms: sampling.interval_ms,
            smoothing: sampling.smoothing,
            min_samples_for_accel: sampling.min_samples_for_accel,
            current_threshold: session.current_threshold,
        }
    }

    /// True once at least one interval has passed since the last sample.
    #[inline]
    pub fn is_due(&self, record: &PortRecord, now_ms: u64) -> bool {
        record
            .last_sample_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms)
    }

    /// Fold `sample` into `record` if a sample is due. Returns whether a row
    /// was appended.
    pub fn sample(&self, record: &mut PortRecord, sample: &PortSample, now_ms: u64) -> bool {
        if !self.is_due(record, now_ms) {
            return false;
        }

        let prev = record.log.last();
        let velocity = match prev {
            None => sample.velocity,
            Some(p) => self.smoothing * p.velocity + (1.0 - self.smoothing) * sample.velocity,
        };

        record.log.push(TelemetryRow {
            time_ms: now_ms,
            applied_mv: sample.applied_mv,
            requested_mv: record.requested_mv,
            current: sample.current,
            velocity,
        });

        if let Some(p) = prev
            && record.log.len() >= self.min_samples_for_accel
        {
            let dt_ms = now_ms.saturating_sub(p.time_ms);
            if dt_ms > 0 {
                let raw_accel = (velocity - p.velocity) * 1000.0 / dt_ms as f64;
                record.acceleration =
                    self.smoothing * record.acceleration + (1.0 - self.smoothing) * raw_accel;
            }
        }

        if sample.current.saturating_abs() > self.current_threshold {
            record.current_responded = true;
        }
        record.last_sample_ms = Some(now_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> TelemetrySampler {
        TelemetrySampler::new(&SamplingCfg::default(), &SessionCfg::default())
    }

    fn motor(velocity: f64, current: i32) -> PortSample {
        PortSample {
            device: DeviceKind::Motor,
            velocity,
            current,
            applied_mv: 0,
        }
    }

    #[test]
    fn first_sample_seeds_without_smoothing() {
        let s = sampler();
        let mut rec = PortRecord::default();
        assert!(s.sample(&mut rec, &motor(100.0, 0), 0));
        assert_eq!(rec.log.velocity(), &[100.0]);
        assert_eq!(rec.acceleration, 0.0);
    }

    #[test]
    fn respects_interval() {
        let s = sampler();
        let mut rec = PortRecord::default();
        assert!(s.sample(&mut rec, &motor(0.0, 0), 10));
        assert!(!s.sample(&mut rec, &motor(0.0, 0), 12));
        assert!(s.sample(&mut rec, &motor(0.0, 0), 13));
        assert_eq!(rec.log.len(), 2);
    }

    #[test]
    fn acceleration_waits_for_third_sample() {
        let s = sampler();
        let mut rec = PortRecord::default();
        s.sample(&mut rec, &motor(0.0, 0), 0);
        s.sample(&mut rec, &motor(100.0, 0), 10);
        // v = 30 after the second sample; no acceleration yet
        assert_eq!(rec.acceleration, 0.0);
        s.sample(&mut rec, &motor(100.0, 0), 20);
        // v = 0.7*30 + 30 = 51, raw accel = 21 * 100 = 2100, smoothed = 630
        assert!((rec.log.velocity()[2] - 51.0).abs() < 1e-9);
        assert!((rec.acceleration - 630.0).abs() < 1e-9);
    }

    #[test]
    fn current_above_threshold_marks_sensor_working() {
        let s = sampler();
        let mut rec = PortRecord::default();
        s.sample(&mut rec, &motor(0.0, 10), 0);
        assert!(!rec.current_responded);
        s.sample(&mut rec, &motor(0.0, -11), 3);
        assert!(rec.current_responded);
    }
}
