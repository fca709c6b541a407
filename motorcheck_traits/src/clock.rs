use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source shared by the engine, the runner and simulations.
///
/// - now(): returns a monotonic Instant
/// - sleep(): waits for the provided duration (virtual clocks just advance)
/// - ms_since(): elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall-clock implementation backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

// Lets the bus simulation and the engine share one virtual clock.
impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> Instant {
        (**self).now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StepClock {
        origin: Instant,
        offset: Mutex<Duration>,
    }

    impl Clock for StepClock {
        fn now(&self) -> Instant {
            let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
            self.origin + off
        }

        fn sleep(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }
    }

    #[test]
    fn ms_since_tracks_virtual_sleep() {
        let clock = StepClock {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        };
        let epoch = clock.now();
        clock.sleep(Duration::from_millis(3));
        clock.sleep(Duration::from_millis(150));
        assert_eq!(clock.ms_since(epoch), 153);
    }

    #[test]
    fn ms_since_saturates_for_future_epoch() {
        let clock = MonotonicClock::new();
        let future = Instant::now() + Duration::from_secs(60);
        assert_eq!(clock.ms_since(future), 0);
    }

    #[test]
    fn arc_clock_delegates() {
        let clock = Arc::new(StepClock {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        });
        let epoch = clock.now();
        Clock::sleep(&clock, Duration::from_millis(8));
        assert_eq!(Clock::ms_since(&clock, epoch), 8);
    }
}
