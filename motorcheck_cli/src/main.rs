//! `motorcheck`: run per-port motor diagnostics on a simulated smart-port bus.

mod cli;
mod error_fmt;
mod rt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{EXIT_PORT_FAILED, exit_code_for_error, format_error_json, humanize};
use crate::run::{BusLayout, RunOptions};

fn init_tracing(json: bool, level: &str, logging: &motorcheck_config::Logging) {
    // RUST_LOG wins over --log-level / [logging] level.
    let level = logging.level.as_deref().unwrap_or(level);
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter())
            .boxed()
    };

    let file = logging.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "motorcheck.log".into(), |n| n.to_os_string());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter())
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
}

/// Read and validate the config. Only the default path may be absent.
fn load_config(path: Option<&Path>) -> eyre::Result<motorcheck_config::Config> {
    let (path, explicit) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG), false),
    };
    let cfg = match std::fs::read_to_string(path) {
        Ok(text) => motorcheck_config::load_toml(&text)
            .wrap_err_with(|| format!("parse config {}", path.display()))?,
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            motorcheck_config::Config::default()
        }
        Err(e) => return Err(e).wrap_err_with(|| format!("read config {}", path.display())),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn real_main(cli: Cli) -> eyre::Result<i32> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);

    let csv_rows = cli
        .references
        .as_deref()
        .map(motorcheck_config::load_reference_csv)
        .transpose()?;
    let references = run::resolve_references(&cfg, csv_rows.as_deref())?;
    tracing::debug!(
        test_points = references.len(),
        ports = cfg.bus.ports,
        "configuration loaded"
    );

    match cli.cmd {
        Commands::Run {
            motors,
            fault,
            other,
            virtual_time,
            max_run_ms,
            stats,
            rt,
            rt_prio,
            rt_lock,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                    tracing::warn!(error = %e, "Ctrl-C handler not installed");
                }
            }
            let layout = BusLayout {
                motors,
                faults: fault,
                others: other,
            };
            let opts = RunOptions {
                virtual_time,
                max_run_ms,
                stats,
                json: cli.json,
                rt,
                rt_prio,
                rt_lock,
            };
            let outcome = run::run_diagnostics(&cfg, references, &layout, opts, shutdown)?;
            Ok(if outcome.all_ok() { 0 } else { EXIT_PORT_FAILED })
        }
        Commands::SelfCheck => {
            // Building an engine over an empty bus runs the same checks a real run does.
            let clock: Arc<dyn motorcheck_traits::Clock + Send + Sync> =
                Arc::new(motorcheck_hardware::SimClock::new());
            let bus = run::build_bus(
                cfg.bus.ports,
                run::sim_params(&cfg.simulation),
                Arc::clone(&clock),
                &BusLayout::default(),
            )?;
            let engine = motorcheck_core::DiagnosticsEngine::builder()
                .with_config(motorcheck_core::DiagnosticsCfg::from(&cfg))
                .with_references(references)
                .with_clock(clock)
                .with_ports(cfg.bus.ports)
                .with_bus(bus)
                .build()?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "ports": engine.ports(),
                        "test_points": engine.references().len(),
                        "capacity": engine.config().admission.capacity,
                    })
                );
            } else {
                println!("ok");
            }
            Ok(0)
        }
        Commands::References => {
            for (i, tp) in references.points().iter().enumerate() {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "index": i + 1,
                            "drive_mv": tp.drive_mv,
                            "settle_speed": tp.settle_speed,
                            "settle_current": tp.settle_current,
                        })
                    );
                } else {
                    println!(
                        "{:>2}  drive {:>6} mV  speed {:>7.1} rpm  current {:>4}",
                        i + 1,
                        tp.drive_mv,
                        tp.settle_speed,
                        tp.settle_current
                    );
                }
            }
            Ok(0)
        }
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(cli) {
        Ok(code) => code,
        Err(err) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
                tracing::debug!(error = ?err, "command failed");
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}
