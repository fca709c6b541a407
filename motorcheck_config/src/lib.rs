#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and reference-table parsing for the motor diagnostic harness.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section is optional; omitted keys fall back to the tuned defaults.
//! - The reference CSV loader enforces exact headers and sanity-checks each
//!   test point before it can be used as a scoring baseline.
use serde::Deserialize;

/// Highest drive magnitude accepted by the motor controllers (mV).
pub const MAX_DRIVE_MV: i32 = 12_000;
/// Number of smart ports on the bus.
pub const MAX_PORTS: usize = 21;
/// Upper bound on reference table length.
pub const MAX_TEST_POINTS: usize = 16;

/// Reference test point, as written in TOML or CSV.
///
/// Expected CSV headers:
/// drive_mv,settle_speed,settle_current
///
/// Example:
/// drive_mv,settle_speed,settle_current
/// 6000,117,70
/// 12000,237,160
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TestPointRow {
    pub drive_mv: i32,
    pub settle_speed: f64,
    pub settle_current: i32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusCfg {
    /// Number of ports scanned each tick (1..=21)
    pub ports: usize,
}

impl Default for BusCfg {
    fn default() -> Self {
        Self { ports: MAX_PORTS }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingCfg {
    /// Minimum spacing between telemetry samples (ms)
    pub interval_ms: u64,
    /// Weight of the previous value in the velocity/acceleration EMA. Range: [0.0, 1.0).
    pub smoothing: f64,
    /// Samples required before acceleration is derived
    pub min_samples_for_accel: usize,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            interval_ms: 3,
            smoothing: 0.7,
            min_samples_for_accel: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SettleCfg {
    /// |accel| above this marks motion as transient
    pub transient_accel: f64,
    /// |accel| below this (while transient) enters the settling window
    pub settling_accel: f64,
    /// |accel| above this (while settling) reverts to transient
    pub resume_accel: f64,
    /// Settling must hold this long before it counts as settled (ms)
    pub dwell_ms: u64,
}

impl Default for SettleCfg {
    fn default() -> Self {
        Self {
            transient_accel: 500.0,
            settling_accel: 250.0,
            resume_accel: 300.0,
            dwell_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    /// Time a freshly plugged motor must sit before it is eligible (ms)
    pub debounce_ms: u64,
    /// |velocity| below this counts as stopped
    pub still_velocity: f64,
    /// |velocity| above this counts as responding to drive
    pub motion_velocity: f64,
    /// No motion within this window after a drive command means stalled (ms)
    pub response_timeout_ms: u64,
    /// Hard cap on one active session (ms)
    pub timeout_ms: u64,
    /// Drive used for coast/brake spin-up and the stall reversal (mV)
    pub spinup_mv: i32,
    /// |current| above this proves the current sensor works
    pub current_threshold: i32,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            still_velocity: 5.0,
            motion_velocity: 10.0,
            response_timeout_ms: 1000,
            timeout_ms: 8000,
            spinup_mv: MAX_DRIVE_MV,
            current_threshold: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdmissionCfg {
    /// Maximum number of motors driven at once
    pub capacity: usize,
}

impl Default for AdmissionCfg {
    fn default() -> Self {
        Self { capacity: 8 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScoringCfg {
    pub reference_coast_ms: u64,
    pub reference_brake_ms: u64,
    /// Scores below this fail
    pub fail_below: f64,
    /// Scores below this (but not failing) warn
    pub warn_below: f64,
    /// tanh gain applied to the brake-time difference (1/ms)
    pub brake_gain: f64,
    /// Brake component below this marks the brake as not working
    pub brake_fail_below: f64,
    /// Upper clamp on the signed brake component
    pub brake_cap: f64,
}

impl Default for ScoringCfg {
    fn default() -> Self {
        Self {
            reference_coast_ms: 885,
            reference_brake_ms: 196,
            fail_below: -40.0,
            warn_below: -35.0,
            brake_gain: 0.005,
            brake_fail_below: -60.0,
            brake_cap: 10.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Tick cadence of the diagnostic loop (ms)
    pub tick_ms: u64,
    /// Hard cap on one CLI run (ms)
    pub max_run_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            tick_ms: 3,
            max_run_ms: 30_000,
        }
    }
}

/// Motor model used by the simulated bus.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    /// First-order time constant while driven (ms)
    pub spinup_tau_ms: f64,
    /// Decay time constant with zero drive in coast mode (ms)
    pub coast_tau_ms: f64,
    /// Decay time constant with zero drive in brake mode (ms)
    pub brake_tau_ms: f64,
    /// Steady-state current per volt of drive (mA/V)
    pub current_per_volt: f64,
    /// Peak-to-peak velocity noise (rpm); 0 disables
    pub velocity_noise: f64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            spinup_tau_ms: 60.0,
            coast_tau_ms: 229.0,
            brake_tau_ms: 51.0,
            current_per_volt: 12.5,
            velocity_noise: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub bus: BusCfg,
    pub sampling: SamplingCfg,
    pub settle: SettleCfg,
    pub session: SessionCfg,
    pub admission: AdmissionCfg,
    pub scoring: ScoringCfg,
    pub runner: RunnerCfg,
    pub simulation: SimulationCfg,
    pub logging: Logging,
    /// Optional inline reference table; the built-in table is used when empty.
    pub test_points: Vec<TestPointRow>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Check one reference row; `idx` is 0-based and only used for messages.
pub fn validate_test_point(idx: usize, row: &TestPointRow) -> eyre::Result<()> {
    if row.drive_mv == 0 || !(-MAX_DRIVE_MV..=MAX_DRIVE_MV).contains(&row.drive_mv) {
        eyre::bail!(
            "test point {}: drive_mv must be non-zero and within ±{MAX_DRIVE_MV}, got {}",
            idx + 1,
            row.drive_mv
        );
    }
    if !row.settle_speed.is_finite() || row.settle_speed == 0.0 {
        eyre::bail!(
            "test point {}: settle_speed must be finite and non-zero",
            idx + 1
        );
    }
    if (row.settle_speed > 0.0) != (row.drive_mv > 0) {
        eyre::bail!(
            "test point {}: settle_speed sign must match drive_mv sign",
            idx + 1
        );
    }
    if row.settle_current < 0 {
        eyre::bail!("test point {}: settle_current must be >= 0", idx + 1);
    }
    Ok(())
}

/// Validate a full reference table (length and every row).
pub fn validate_test_points(rows: &[TestPointRow]) -> eyre::Result<()> {
    if rows.is_empty() {
        eyre::bail!("reference table requires at least one test point");
    }
    if rows.len() > MAX_TEST_POINTS {
        eyre::bail!(
            "reference table has {} test points; at most {MAX_TEST_POINTS} are supported",
            rows.len()
        );
    }
    for (idx, row) in rows.iter().enumerate() {
        validate_test_point(idx, row)?;
    }
    Ok(())
}

pub fn load_reference_csv(path: &std::path::Path) -> eyre::Result<Vec<TestPointRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open reference CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["drive_mv", "settle_speed", "settle_current"];
    let actual: Vec<String> = headers.iter().map(str::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "reference CSV must have headers 'drive_mv,settle_speed,settle_current', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TestPointRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    validate_test_points(&rows)?;
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Bus
        if self.bus.ports == 0 || self.bus.ports > MAX_PORTS {
            eyre::bail!("bus.ports must be in [1, {MAX_PORTS}]");
        }

        // Sampling
        if self.sampling.interval_ms == 0 {
            eyre::bail!("sampling.interval_ms must be >= 1");
        }
        if !(0.0..1.0).contains(&self.sampling.smoothing) {
            eyre::bail!("sampling.smoothing must be in [0.0, 1.0)");
        }
        if self.sampling.min_samples_for_accel < 2 {
            eyre::bail!("sampling.min_samples_for_accel must be >= 2");
        }

        // Settle
        let s = &self.settle;
        if !(s.settling_accel > 0.0 && s.resume_accel > 0.0 && s.transient_accel > 0.0) {
            eyre::bail!("settle thresholds must be > 0");
        }
        if s.settling_accel >= s.resume_accel {
            eyre::bail!("settle.settling_accel must be < settle.resume_accel");
        }
        if s.resume_accel > s.transient_accel {
            eyre::bail!("settle.resume_accel must be <= settle.transient_accel");
        }
        if s.dwell_ms > 60_000 {
            eyre::bail!("settle.dwell_ms is unreasonably large (>60s)");
        }

        // Session
        let ss = &self.session;
        if ss.still_velocity <= 0.0 {
            eyre::bail!("session.still_velocity must be > 0");
        }
        if ss.motion_velocity < ss.still_velocity {
            eyre::bail!("session.motion_velocity must be >= session.still_velocity");
        }
        if ss.response_timeout_ms == 0 {
            eyre::bail!("session.response_timeout_ms must be >= 1");
        }
        if ss.timeout_ms <= ss.response_timeout_ms {
            eyre::bail!("session.timeout_ms must be > session.response_timeout_ms");
        }
        if ss.spinup_mv <= 0 || ss.spinup_mv > MAX_DRIVE_MV {
            eyre::bail!("session.spinup_mv must be in [1, {MAX_DRIVE_MV}]");
        }
        if ss.current_threshold < 0 {
            eyre::bail!("session.current_threshold must be >= 0");
        }

        // Admission
        if self.admission.capacity == 0 {
            eyre::bail!("admission.capacity must be >= 1");
        }

        // Scoring
        let sc = &self.scoring;
        if sc.reference_coast_ms == 0 {
            eyre::bail!("scoring.reference_coast_ms must be >= 1");
        }
        if sc.reference_brake_ms == 0 {
            eyre::bail!("scoring.reference_brake_ms must be >= 1");
        }
        if sc.warn_below < sc.fail_below {
            eyre::bail!("scoring.warn_below must be >= scoring.fail_below");
        }
        if !(sc.brake_gain.is_finite() && sc.brake_gain > 0.0) {
            eyre::bail!("scoring.brake_gain must be > 0");
        }

        // Runner
        if self.runner.tick_ms == 0 {
            eyre::bail!("runner.tick_ms must be >= 1");
        }
        if self.runner.max_run_ms == 0 {
            eyre::bail!("runner.max_run_ms must be >= 1");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.spinup_tau_ms > 0.0 && sim.coast_tau_ms > 0.0 && sim.brake_tau_ms > 0.0) {
            eyre::bail!("simulation time constants must be > 0");
        }
        if sim.velocity_noise < 0.0 {
            eyre::bail!("simulation.velocity_noise must be >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Inline reference table
        if !self.test_points.is_empty() {
            validate_test_points(&self.test_points)?;
        }

        Ok(())
    }
}
