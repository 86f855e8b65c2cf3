//! `From` implementations bridging `autotune_config` types to `autotune_core` types.

#[cfg(feature = "hardware")]
use autotune_hardware::SimParams;

use crate::config::{
    BoundsCfg, ExcitationCfg, GridCfg, MechanismCfg, RunnerCfg, SweepCfg, VelocityRange,
};
use crate::error::Result;
use crate::tuner::MotorAutotuner;

// ── MechanismCfg ─────────────────────────────────────────────────────────────

impl From<&autotune_config::Mechanism> for MechanismCfg {
    fn from(c: &autotune_config::Mechanism) -> Self {
        Self::new(c.name.clone(), c.position_unique, c.max_volts)
    }
}

// ── BoundsCfg ────────────────────────────────────────────────────────────────

impl From<&autotune_config::Bounds> for BoundsCfg {
    fn from(c: &autotune_config::Bounds) -> Self {
        Self {
            min: c.min,
            max: c.max,
            test_inset_fraction: c.test_inset_fraction,
        }
    }
}

// ── GridCfg ──────────────────────────────────────────────────────────────────

impl From<&autotune_config::Grid> for GridCfg {
    fn from(c: &autotune_config::Grid) -> Self {
        Self {
            density: c.density,
            min_cell_size: c.min_cell_size,
        }
    }
}

// ── SweepCfg ─────────────────────────────────────────────────────────────────

impl From<&autotune_config::Sweep> for SweepCfg {
    fn from(c: &autotune_config::Sweep) -> Self {
        Self {
            min_ticks: c.min_ticks,
            stable_ticks: c.stable_ticks,
            max_ticks: c.max_ticks,
            min_velocity_span: c.min_velocity_span,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

impl From<&autotune_config::Runner> for RunnerCfg {
    fn from(c: &autotune_config::Runner) -> Self {
        Self {
            sample_rate_hz: c.sample_rate_hz,
            max_ticks: c.max_ticks,
            pose_timeout_ms: c.pose_timeout_ms,
        }
    }
}

// ── ExcitationCfg ────────────────────────────────────────────────────────────

impl From<&autotune_config::Excitation> for ExcitationCfg {
    fn from(c: &autotune_config::Excitation) -> Self {
        Self {
            amplitude_volts: c.amplitude_volts,
            period_ticks: c.period_ticks,
        }
    }
}

// ── Simulated plant ──────────────────────────────────────────────────────────

/// Plant parameters, integrated once per control period.
#[cfg(feature = "hardware")]
pub fn sim_params(cfg: &autotune_config::Config) -> SimParams {
    let period_us = crate::util::period_us(cfg.runner.sample_rate_hz);
    SimParams {
        kv: cfg.simulation.kv,
        ka: cfg.simulation.ka,
        ks: cfg.simulation.ks,
        kg: cfg.simulation.kg,
        dt_s: period_us as f64 / crate::util::MICROS_PER_SEC as f64,
        initial_position: cfg.simulation.initial_position,
    }
}

// ── MotorAutotuner ───────────────────────────────────────────────────────────

impl TryFrom<&autotune_config::Config> for MotorAutotuner {
    type Error = eyre::Report;

    fn try_from(cfg: &autotune_config::Config) -> Result<Self> {
        let mut builder = MotorAutotuner::builder()
            .with_mechanism(MechanismCfg::from(&cfg.mechanism))
            .with_bounds(BoundsCfg::from(&cfg.bounds))
            .with_grid(GridCfg::from(&cfg.grid))
            .with_sweep(SweepCfg::from(&cfg.sweep));
        if let Some([min, max]) = cfg.sweep.known_velocity_range {
            builder = builder.with_known_velocity_range(VelocityRange::new(min, max));
        }
        builder.build()
    }
}
