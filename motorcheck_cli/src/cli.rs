//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use motorcheck_hardware::MotorFault;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config path used when `--config` is not given; a missing file there means defaults.
pub const DEFAULT_CONFIG: &str = "etc/motorcheck.toml";

#[derive(Parser, Debug)]
#[command(name = "motorcheck", version, about = "Smart-port motor diagnostics")]
pub struct Cli {
    /// Path to config TOML [default: etc/motorcheck.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Reference test-point CSV (strict header); overrides the config table
    #[arg(long, value_name = "FILE")]
    pub references: Option<PathBuf>,

    /// Print results and logs as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// `PORT=KIND` fault injection for one simulated motor (1-based port).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultSpec {
    pub port: usize,
    pub fault: MotorFault,
}

impl FromStr for FaultSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, kind) = s
            .split_once('=')
            .ok_or_else(|| format!("expected PORT=KIND, got '{s}'"))?;
        let port = parse_port(port)?;
        let fault = match kind.trim() {
            "stalled" => MotorFault::Stalled,
            "dead-current" => MotorFault::DeadCurrentSensor,
            "weak-brake" => MotorFault::WeakBrake,
            "slow" => MotorFault::Slow(0.4),
            other => match other.strip_prefix("slow:") {
                Some(f) => {
                    let f: f64 = f
                        .parse()
                        .map_err(|_| format!("slow factor must be a number, got '{f}'"))?;
                    if !(f > 0.0 && f <= 1.0) {
                        return Err(format!("slow factor must be in (0, 1], got {f}"));
                    }
                    MotorFault::Slow(f)
                }
                None => {
                    return Err(format!(
                        "unknown fault '{other}' (stalled|dead-current|weak-brake|slow[:F])"
                    ));
                }
            },
        };
        Ok(Self { port, fault })
    }
}

/// Parse a 1-based port number.
pub fn parse_port(s: &str) -> Result<usize, String> {
    let port: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("port must be a number, got '{s}'"))?;
    if port == 0 {
        return Err("ports are numbered from 1".to_string());
    }
    Ok(port)
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Diagnose motors on the simulated bus until every session has a verdict
    Run {
        /// Ports (1-based) holding a healthy motor, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_port, required = true)]
        motors: Vec<usize>,
        /// Inject a defect: PORT=stalled|dead-current|weak-brake|slow[:F] (repeatable)
        #[arg(long, value_name = "PORT=KIND")]
        fault: Vec<FaultSpec>,
        /// Ports holding a non-motor device (repeatable)
        #[arg(long, value_name = "PORT", value_parser = parse_port)]
        other: Vec<usize>,
        /// Run on a virtual clock (instant, deterministic)
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_time: bool,
        /// Override runner.max_run_ms
        #[arg(long, value_name = "MS")]
        max_run_ms: Option<u64>,
        /// Print tick-loop stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on supported OSes.\n\nLinux: attempts SCHED_FIFO priority and mlockall to keep the tick loop off the page-fault path. May require CAP_SYS_NICE / CAP_IPC_LOCK or a raised 'ulimit -l'.\n\nmacOS: only mlockall is applied."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored elsewhere
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
    },
    /// Validate the configuration and reference table
    SelfCheck,
    /// Print the active reference table
    References,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fault_specs() {
        let f: FaultSpec = "3=weak-brake".parse().unwrap();
        assert_eq!(f.port, 3);
        assert_eq!(f.fault, MotorFault::WeakBrake);
        let f: FaultSpec = "12=slow:0.25".parse().unwrap();
        assert_eq!(f.fault, MotorFault::Slow(0.25));
        assert!("0=stalled".parse::<FaultSpec>().is_err());
        assert!("4=smoking".parse::<FaultSpec>().is_err());
        assert!("4=slow:2".parse::<FaultSpec>().is_err());
        assert!("stalled".parse::<FaultSpec>().is_err());
    }
}
