//! Running cross-port baselines, for reporting only.

use crate::record::PortRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct IndexSums {
    speed: f64,
    current: f64,
    count: u64,
}

/// Sums over every scored session since the engine was built.
#[derive(Debug, Clone, Default)]
pub struct FleetStats {
    per_index: Vec<IndexSums>,
    coast_sum_ms: u64,
    brake_sum_ms: u64,
    sessions: u64,
}

/// Per-test-point mean, `None` until a session recorded that index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexMean {
    pub index: usize,
    pub samples: u64,
    pub settle_speed: Option<f64>,
    pub settle_current: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FleetSnapshot {
    pub sessions: u64,
    pub per_index: Vec<IndexMean>,
    pub mean_coast_ms: Option<f64>,
    pub mean_brake_ms: Option<f64>,
}

impl FleetStats {
    /// Size the per-index table for `test_points` entries.
    pub fn new(test_points: usize) -> Self {
        Self {
            per_index: vec![IndexSums::default(); test_points],
            ..Self::default()
        }
    }

    /// Fold one scored session in.
    pub fn record(&mut self, record: &PortRecord) {
        for (i, r) in record.results.iter().enumerate() {
            if i >= self.per_index.len() {
                self.per_index.resize(i + 1, IndexSums::default());
            }
            let s = &mut self.per_index[i];
            s.speed += r.settle_speed;
            s.current += f64::from(r.settle_current);
            s.count += 1;
        }
        // Sessions that never reached a measurement contribute 0 ms, as the
        // duration fields read 0.
        self.coast_sum_ms = self.coast_sum_ms.saturating_add(record.coast_duration_ms);
        self.brake_sum_ms = self.brake_sum_ms.saturating_add(record.brake_duration_ms);
        self.sessions += 1;
    }

    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        let mean = |sum: f64, n: u64| (n > 0).then(|| sum / n as f64);
        FleetSnapshot {
            sessions: self.sessions,
            per_index: self
                .per_index
                .iter()
                .enumerate()
                .map(|(index, s)| IndexMean {
                    index,
                    samples: s.count,
                    settle_speed: mean(s.speed, s.count),
                    settle_current: mean(s.current, s.count),
                })
                .collect(),
            mean_coast_ms: mean(self.coast_sum_ms as f64, self.sessions),
            mean_brake_ms: mean(self.brake_sum_ms as f64, self.sessions),
        }
    }
}
