mod cli;
mod error_fmt;
mod rt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use substep_config::{Config, Logging};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, RtLock};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::rt::RtRequest;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = substep_config::load_toml(&text).wrap_err("parse config")?;
    cfg.validate()?;
    Ok(cfg)
}

fn console_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
}

/// Console logs go to stderr so stdout stays machine-readable. An optional
/// JSON file sink is configured by `[logging]`.
fn init_tracing(json: bool, level: &str, logging: &Logging) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let (pretty, structured) = if json {
        (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter(level)),
            ),
        )
    } else {
        (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter(level)),
            ),
            None,
        )
    };

    let file = logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "substep.log".into());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(tracing_subscriber::EnvFilter::new(
                logging.level.as_deref().unwrap_or("info"),
            ))
    });

    let _ = tracing_subscriber::registry()
        .with(pretty)
        .with(structured)
        .with(file)
        .try_init();
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::Run {
            duration_ms,
            effort,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => {
            let backend = run::open_backend(&cfg)?;
            let rt = rt.then(|| RtRequest {
                prio: rt_prio,
                lock: rt_lock.unwrap_or(RtLock::os_default()),
                cpu: rt_cpu,
            });
            run::run(
                &cfg,
                backend,
                run::RunParams {
                    duration_ms,
                    effort,
                    rt,
                    json: cli.json,
                },
                shutdown,
            )
        }
        Commands::Calibrate { effort, out } => {
            let backend = run::open_backend(&cfg)?;
            run::calibrate(&cfg, backend, effort, out.as_deref(), cli.json)
        }
        Commands::Replay { trace } => run::replay(&cfg, &trace, cli.json),
        Commands::Servo { value, hold_ms } => run::servo(&cfg, value, hold_ms, cli.json),
        Commands::SelfCheck => {
            let backend = run::open_backend(&cfg)?;
            run::self_check(&cfg, backend, cli.json)
        }
    }
}
