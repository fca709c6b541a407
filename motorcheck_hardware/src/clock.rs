use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use motorcheck_traits::Clock;

/// Virtual clock: `sleep` advances time instantly.
///
/// Share one instance (behind an `Arc`) between the bus and the engine so
/// both see the same time.
#[derive(Debug)]
pub struct SimClock {
    origin: Instant,
    offset_us: AtomicU64,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, d: Duration) {
        let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        self.offset_us.fetch_add(us, Ordering::Relaxed);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_micros(self.offset_us.load(Ordering::Relaxed))
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
