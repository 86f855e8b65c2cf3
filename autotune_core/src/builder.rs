//! Type-state builder for `MotorAutotuner`.

use std::marker::PhantomData;

use crate::bounds::{Bounds, validate_inset_fraction};
use crate::config::{BoundsCfg, GridCfg, MechanismCfg, SweepCfg, VelocityRange};
use crate::error::{AutotuneError, BuildError, Result};
use crate::grid::{GridSizes, GridStore};
use crate::pose::MotorPose;
use crate::state::TunerState;
use crate::sweep::VelocitySweep;
use crate::tuner::{MotorAutotuner, TunerStats};

pub struct Missing;
pub struct Set;

/// Builder for `MotorAutotuner`. All fields are validated on `build()`.
pub struct AutotunerBuilder<M> {
    mechanism: Option<MechanismCfg>,
    bounds: Option<BoundsCfg>,
    grid: Option<GridCfg>,
    sweep: Option<SweepCfg>,
    known_velocity: Option<VelocityRange>,
    _m: PhantomData<M>,
}

impl Default for AutotunerBuilder<Missing> {
    fn default() -> Self {
        Self {
            mechanism: None,
            bounds: None,
            grid: None,
            sweep: None,
            known_velocity: None,
            _m: PhantomData,
        }
    }
}

/// Validate configuration and construct an idle autotuner with derived bounds
/// and cell sizes in place.
fn validate_and_build(
    mechanism: MechanismCfg,
    bounds: BoundsCfg,
    grid: GridCfg,
    sweep: SweepCfg,
    known_velocity: Option<VelocityRange>,
) -> Result<MotorAutotuner> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !mechanism.max_volts.is_finite() || mechanism.max_volts <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_volts must be finite and > 0",
        )));
    }
    if !bounds.min.is_finite() || !bounds.max.is_finite() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "bounds must be finite",
        )));
    }
    let inset_fraction =
        validate_inset_fraction(bounds.test_inset_fraction).map_err(eyre::Report::new)?;
    if grid.density == 0 {
        return Err(eyre::Report::new(AutotuneError::InvalidDensity(0)));
    }
    if !grid.min_cell_size.is_finite() || grid.min_cell_size <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "min_cell_size must be finite and > 0",
        )));
    }
    if sweep.max_ticks == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sweep max_ticks must be >= 1",
        )));
    }
    if !sweep.min_velocity_span.is_finite() || sweep.min_velocity_span.is_sign_negative() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sweep min_velocity_span must be finite and >= 0",
        )));
    }
    if let Some(v) = known_velocity {
        if !(v.min.is_finite() && v.max.is_finite() && v.max > v.min) {
            return Err(eyre::Report::new(AutotuneError::InvalidVelocityRange {
                min: v.min,
                max: v.max,
            }));
        }
    }

    // ── Precompute ───────────────────────────────────────────────────────────
    let mut tuner = MotorAutotuner {
        mechanism,
        state: TunerState::Idle,
        curr: MotorPose::default(),
        prev: MotorPose::default(),
        bounds: Bounds::compute(bounds.min, bounds.max, inset_fraction),
        inset_fraction,
        grid_cfg: grid,
        sizes: GridSizes::default(),
        sweep: VelocitySweep::new(sweep),
        velocity_range: known_velocity,
        velocity_degenerate: false,
        grid: GridStore::new(),
        stats: TunerStats::default(),
    };
    tuner.recalc();
    tracing::debug!(
        name = %tuner.mechanism.name,
        center = tuner.bounds.center,
        test_min = tuner.bounds.test_min,
        test_max = tuner.bounds.test_max,
        position_cell = tuner.sizes.position,
        velocity_cell = ?tuner.sizes.velocity,
        "autotuner built"
    );
    Ok(tuner)
}

impl<M> AutotunerBuilder<M> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<MotorAutotuner> {
        let mechanism = self
            .mechanism
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMechanism))?;
        validate_and_build(
            mechanism,
            self.bounds.unwrap_or_default(),
            self.grid.unwrap_or_default(),
            self.sweep.unwrap_or_default(),
            self.known_velocity,
        )
    }

    pub fn with_bounds(mut self, bounds: BoundsCfg) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_grid(mut self, grid: GridCfg) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_sweep(mut self, sweep: SweepCfg) -> Self {
        self.sweep = Some(sweep);
        self
    }

    /// Skip the sweep by supplying the velocity extremes up front.
    pub fn with_known_velocity_range(mut self, range: VelocityRange) -> Self {
        self.known_velocity = Some(range);
        self
    }
}

impl AutotunerBuilder<Missing> {
    pub fn with_mechanism(self, mechanism: MechanismCfg) -> AutotunerBuilder<Set> {
        AutotunerBuilder {
            mechanism: Some(mechanism),
            bounds: self.bounds,
            grid: self.grid,
            sweep: self.sweep,
            known_velocity: self.known_velocity,
            _m: PhantomData,
        }
    }
}

impl AutotunerBuilder<Set> {
    /// Build once the mechanism has been supplied.
    pub fn build(self) -> Result<MotorAutotuner> {
        self.try_build()
    }
}
