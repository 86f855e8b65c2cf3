#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and pose-trace parsing for the autotuner.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The trace CSV loader enforces exact headers so a column swap cannot
//!   silently feed velocities in as positions.
use serde::Deserialize;

/// Pose trace CSV schema.
///
/// Expected headers:
/// position,velocity,acceleration,volts
///
/// Example:
/// position,velocity,acceleration,volts
/// 0.0,0.0,0.0,0.0
/// 0.12,1.5,4.0,3.0
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub volts: f64,
}

#[derive(Debug, Deserialize)]
pub struct Mechanism {
    /// Diagnostic name used in logs and reports.
    pub name: String,
    /// Behavior does not depend on position (flywheel, turret without stops).
    #[serde(default)]
    pub position_unique: bool,
    pub max_volts: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    /// Soft bounds inset by `(max - min) / test_inset_fraction`; 0 disables.
    pub test_inset_fraction: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            test_inset_fraction: 12.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Grid {
    pub density: u32,
    pub min_cell_size: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            density: 50,
            min_cell_size: 1e-3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sweep {
    pub min_ticks: u32,
    pub stable_ticks: u32,
    pub max_ticks: u32,
    pub min_velocity_span: f64,
    /// `[min, max]`; when present the sweep is skipped.
    pub known_velocity_range: Option<[f64; 2]>,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            min_ticks: 50,
            stable_ticks: 25,
            max_ticks: 2_000,
            min_velocity_span: 0.0,
            known_velocity_range: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Runner {
    pub sample_rate_hz: u32,
    /// 0 runs until interrupted.
    pub max_ticks: u64,
    pub pose_timeout_ms: u64,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50,
            max_ticks: 3_000,
            pose_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Excitation {
    pub amplitude_volts: f64,
    /// 0 disables excitation.
    pub period_ticks: u32,
}

impl Default for Excitation {
    fn default() -> Self {
        Self {
            amplitude_volts: 4.0,
            period_ticks: 200,
        }
    }
}

/// Plant constants for the simulated mechanism.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub kv: f64,
    pub ka: f64,
    pub ks: f64,
    pub kg: f64,
    pub initial_position: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            kv: 1.0,
            ka: 0.1,
            ks: 0.05,
            kg: 0.0,
            initial_position: 0.0,
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

#[derive(Debug, Deserialize)]
pub struct Config {
    pub mechanism: Mechanism,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub sweep: Sweep,
    #[serde(default)]
    pub runner: Runner,
    #[serde(default)]
    pub excitation: Excitation,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["position", "velocity", "acceleration", "volts"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "trace CSV must have headers 'position,velocity,acceleration,volts', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} contains no samples", path);
    }
    Ok(rows)
}

fn finite(name: &str, v: f64) -> eyre::Result<()> {
    if !v.is_finite() {
        eyre::bail!("{name} must be finite");
    }
    Ok(())
}

const ROTATIONS: [&str; 3] = ["never", "daily", "hourly"];

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Mechanism
        if self.mechanism.name.trim().is_empty() {
            eyre::bail!("mechanism.name must not be empty");
        }
        finite("mechanism.max_volts", self.mechanism.max_volts)?;
        if self.mechanism.max_volts <= 0.0 {
            eyre::bail!("mechanism.max_volts must be > 0");
        }

        // Bounds
        finite("bounds.min", self.bounds.min)?;
        finite("bounds.max", self.bounds.max)?;
        let f = self.bounds.test_inset_fraction;
        if !(f == 0.0 || (f.is_finite() && f >= 2.0)) {
            eyre::bail!("bounds.test_inset_fraction must be 0 or >= 2");
        }

        // Grid
        if self.grid.density == 0 {
            eyre::bail!("grid.density must be > 0");
        }
        finite("grid.min_cell_size", self.grid.min_cell_size)?;
        if self.grid.min_cell_size <= 0.0 {
            eyre::bail!("grid.min_cell_size must be > 0");
        }

        // Sweep
        if self.sweep.max_ticks == 0 {
            eyre::bail!("sweep.max_ticks must be >= 1");
        }
        finite("sweep.min_velocity_span", self.sweep.min_velocity_span)?;
        if self.sweep.min_velocity_span < 0.0 {
            eyre::bail!("sweep.min_velocity_span must be >= 0");
        }
        if let Some([lo, hi]) = self.sweep.known_velocity_range {
            finite("sweep.known_velocity_range", lo)?;
            finite("sweep.known_velocity_range", hi)?;
            if hi <= lo {
                eyre::bail!("sweep.known_velocity_range must be [min, max] with max > min");
            }
        }

        // Runner
        if self.runner.sample_rate_hz == 0 {
            eyre::bail!("runner.sample_rate_hz must be > 0");
        }
        if self.runner.sample_rate_hz > 10_000 {
            eyre::bail!("runner.sample_rate_hz is unreasonably large (>10kHz)");
        }
        if self.runner.pose_timeout_ms == 0 {
            eyre::bail!("runner.pose_timeout_ms must be >= 1");
        }

        // Excitation
        finite("excitation.amplitude_volts", self.excitation.amplitude_volts)?;
        if self.excitation.amplitude_volts < 0.0 {
            eyre::bail!("excitation.amplitude_volts must be >= 0");
        }

        // Simulation
        let s = &self.simulation;
        for (name, v) in [
            ("simulation.kv", s.kv),
            ("simulation.ka", s.ka),
            ("simulation.ks", s.ks),
            ("simulation.kg", s.kg),
            ("simulation.initial_position", s.initial_position),
        ] {
            finite(name, v)?;
        }
        if s.ka <= 0.0 {
            eyre::bail!("simulation.ka must be > 0");
        }
        if s.kv < 0.0 || s.ks < 0.0 {
            eyre::bail!("simulation.kv and simulation.ks must be >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref() {
            if !ROTATIONS.contains(&rot) {
                eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
            }
        }

        Ok(())
    }
}
