#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod session;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{INTERRUPTED_EXIT_CODE, exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    // Plain panic/eyre hooks; the fancy sections are disabled in Cargo.toml.
    let _ = color_eyre::install();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            tracing::error!(error = %err, "autotune failed");
            std::process::exit(exit_code_for_error(&err));
        }
    }
}

fn read_config(path: &Path) -> eyre::Result<autotune_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = autotune_config::load_toml(&text)
        .map_err(eyre::Report::new)
        .wrap_err("invalid configuration")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn run(cli: Cli) -> eyre::Result<i32> {
    let cfg = read_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    let (report, tuner, dump_grid) = match cli.cmd {
        Commands::Simulate {
            ticks,
            dump_grid,
            realtime,
        } => {
            let (r, t) = session::run_simulate(&cfg, ticks, realtime, &shutdown)?;
            (r, t, dump_grid)
        }
        Commands::Replay { trace, dump_grid } => {
            let (r, t) = session::run_replay(&cfg, &trace)?;
            (r, t, dump_grid)
        }
        Commands::SelfCheck => {
            session::self_check(&cfg, cli.json)?;
            return Ok(0);
        }
    };

    session::print_report(&report, cli.json);
    if dump_grid {
        session::print_grid(&tuner);
    }
    if report.interrupted {
        return Ok(INTERRUPTED_EXIT_CODE);
    }
    Ok(0)
}

/// Console layer on stderr (JSON or compact), plus an optional JSON file sink.
///
/// Filter precedence: `RUST_LOG`, then `--log-level`, then `[logging].level`, then `info`.
fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &autotune_config::Logging,
) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let level = cli_level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level '{level}'"))?,
    };

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("initialize logging: {e}"))
}
