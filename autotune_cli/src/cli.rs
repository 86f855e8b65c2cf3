//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "autotune", version, about = "Motor characterization autotuner")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/autotune.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a tuning session against the simulated mechanism
    Simulate {
        /// Override runner.max_ticks (0 runs until Ctrl-C)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Print one JSON line per grid cell after the summary
        #[arg(long, action = ArgAction::SetTrue)]
        dump_grid: bool,
        /// Pace ticks on the wall clock instead of virtual time
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Feed a recorded pose trace through the tuner (no actuation)
    Replay {
        /// CSV with headers position,velocity,acceleration,volts
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
        /// Print one JSON line per grid cell after the summary
        #[arg(long, action = ArgAction::SetTrue)]
        dump_grid: bool,
    },
    /// Build the tuner and simulated plant from config and report readiness
    SelfCheck,
}
