//! Configuration types for the autotuner.
//!
//! These are the runtime configuration structs used by `MotorAutotuner` and the
//! session runner. They are separate from the TOML-deserialized config in
//! `autotune_config`.

/// Immutable description of the mechanism under test.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanismCfg {
    /// Diagnostic name (logs only).
    pub name: String,
    /// Behavior does not depend on position (flywheel, unbounded mechanism);
    /// every sample lands in position bin 0.
    pub position_unique: bool,
    /// Maximum voltage magnitude the tuner may command.
    pub max_volts: f64,
}

impl MechanismCfg {
    pub fn new(name: impl Into<String>, position_unique: bool, max_volts: f64) -> Self {
        Self {
            name: name.into(),
            position_unique,
            max_volts,
        }
    }
}

/// Absolute travel limits and the soft-envelope inset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsCfg {
    pub min: f64,
    pub max: f64,
    /// Soft bounds are inset by `(max - min) / test_inset_fraction` on each side.
    /// 0 disables the inset. Default: 12 (1/12th of the range).
    pub test_inset_fraction: f64,
}

impl Default for BoundsCfg {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            test_inset_fraction: 12.0,
        }
    }
}

/// Grid resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCfg {
    /// Number of cells on each axis.
    pub density: u32,
    /// Floor applied to a cell size derived from a degenerate (zero) range.
    pub min_cell_size: f64,
}

impl Default for GridCfg {
    fn default() -> Self {
        Self {
            density: 50,
            min_cell_size: 1e-3,
        }
    }
}

/// Termination policy for the velocity-range sweep.
///
/// The sweep ends once `min_ticks` have elapsed, the extrema have been stable
/// for `stable_ticks` consecutive samples and the span reaches
/// `min_velocity_span`; or unconditionally after `max_ticks`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepCfg {
    pub min_ticks: u32,
    pub stable_ticks: u32,
    pub max_ticks: u32,
    pub min_velocity_span: f64,
}

impl Default for SweepCfg {
    fn default() -> Self {
        Self {
            min_ticks: 50,
            stable_ticks: 25,
            max_ticks: 2_000,
            min_velocity_span: 0.0,
        }
    }
}

/// Known velocity extremes; supplying these skips the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityRange {
    pub min: f64,
    pub max: f64,
}

impl VelocityRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Session runner pacing and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerCfg {
    /// Control tick rate.
    pub sample_rate_hz: u32,
    /// Ticks after which the session is finished. 0 runs until interrupted.
    pub max_ticks: u64,
    /// Max wait per pose read (ms).
    pub pose_timeout_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50,
            max_ticks: 3_000,
            pose_timeout_ms: 100,
        }
    }
}

/// External excitation applied while the tuner is not overriding the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcitationCfg {
    pub amplitude_volts: f64,
    /// Sine period in ticks. 0 disables excitation.
    pub period_ticks: u32,
}

impl Default for ExcitationCfg {
    fn default() -> Self {
        Self {
            amplitude_volts: 4.0,
            period_ticks: 200,
        }
    }
}
