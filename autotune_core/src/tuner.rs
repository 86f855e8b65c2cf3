//! The autotuning state machine (`MotorAutotuner`).
//!
//! Each control tick the caller pushes a pose in (`set_current_pose*`) and
//! pulls a voltage out (`get_voltage`). The pose path records; the voltage
//! path decides the next state and then computes the output for it.

use autotune_traits::Pose1D;

use crate::bounds::{Bounds, validate_inset_fraction};
use crate::builder::AutotunerBuilder;
use crate::builder::Missing;
use crate::config::{GridCfg, MechanismCfg, VelocityRange};
use crate::error::{AutotuneError, Result};
use crate::grid::{Coordinate, GridSizes, GridStore, cell_size, coordinate_of};
use crate::pose::MotorPose;
use crate::state::{Resume, TunerState};
use crate::sweep::VelocitySweep;

/// Counters describing a session so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunerStats {
    /// `get_voltage` calls.
    pub ticks: u64,
    /// Finite samples received while not idle.
    pub samples_received: u64,
    /// Non-finite samples dropped before any bookkeeping.
    pub rejected_samples: u64,
    /// Transitions into RECENTER.
    pub recenter_events: u64,
    /// The sweep ended on its tick cap instead of converging.
    pub sweep_hit_cap: bool,
}

pub struct MotorAutotuner {
    pub(crate) mechanism: MechanismCfg,
    pub(crate) state: TunerState,
    pub(crate) curr: MotorPose,
    pub(crate) prev: MotorPose,
    pub(crate) bounds: Bounds,
    pub(crate) inset_fraction: f64,
    pub(crate) grid_cfg: GridCfg,
    pub(crate) sizes: GridSizes,
    pub(crate) sweep: VelocitySweep,
    pub(crate) velocity_range: Option<VelocityRange>,
    pub(crate) velocity_degenerate: bool,
    pub(crate) grid: GridStore,
    pub(crate) stats: TunerStats,
}

impl core::fmt::Debug for MotorAutotuner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotorAutotuner")
            .field("name", &self.mechanism.name)
            .field("state", &self.state)
            .field("bounds", &self.bounds)
            .field("cells", &self.grid.len())
            .field("samples", &self.grid.sample_count())
            .finish()
    }
}

impl MotorAutotuner {
    /// Start building an autotuner.
    pub fn builder() -> AutotunerBuilder<Missing> {
        AutotunerBuilder::default()
    }

    /// Construct with default bounds, grid and sweep policy.
    pub fn new(name: impl Into<String>, position_unique: bool, max_volts: f64) -> Result<Self> {
        Self::builder()
            .with_mechanism(MechanismCfg::new(name, position_unique, max_volts))
            .build()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Arm the tuner. From IDLE or CALCULATING this enters the velocity sweep,
    /// or TUNING directly when the velocity range is already known.
    pub fn start(&mut self) {
        match self.state {
            TunerState::Idle | TunerState::Calculating => {
                let next = if self.velocity_range.is_some() {
                    TunerState::Tuning
                } else {
                    TunerState::FindingMaxVel
                };
                self.enter(next);
            }
            other => tracing::debug!(state = %other, "start ignored: already running"),
        }
    }

    /// Stop recording and zero the output until `start`.
    pub fn pause(&mut self) {
        self.enter(TunerState::Idle);
        self.curr.applied_volts = 0.0;
    }

    /// End the session; output stays at 0 while the grid is exported.
    ///
    /// A sweep still in progress is closed first (see `close_sweep`).
    pub fn finish(&mut self) {
        self.close_sweep();
        self.enter(TunerState::Calculating);
        self.curr.applied_volts = 0.0;
        tracing::info!(
            name = %self.mechanism.name,
            cells = self.grid.len(),
            samples = self.grid.sample_count(),
            "tuning session finished"
        );
    }

    /// Bin the samples buffered by an unfinished sweep using the extrema seen
    /// so far. No-op once the velocity range is known.
    pub fn close_sweep(&mut self) {
        if self.velocity_range.is_none() && self.sweep.buffered() > 0 {
            self.finish_sweep();
        }
    }

    // ── Per-tick I/O ────────────────────────────────────────────────────────

    /// Record a kinematic reading; the last commanded voltage is attached.
    pub fn set_current_pose(&mut self, pose: Pose1D) {
        let volts = self.curr.applied_volts;
        self.set_current_pose_full(MotorPose::from_pose(pose, volts));
    }

    /// Record a full sample including the voltage that was actually applied.
    pub fn set_current_pose_full(&mut self, pose: MotorPose) {
        if !pose.is_finite() {
            self.stats.rejected_samples += 1;
            tracing::warn!(?pose, "non-finite pose rejected");
            return;
        }
        self.prev = self.curr;
        self.curr = pose;
        if !self.state.is_recording() {
            return;
        }
        self.stats.samples_received += 1;
        if self.velocity_range.is_none() {
            self.sweep.observe(pose);
        } else {
            self.file(pose);
        }
    }

    /// Advance the state machine and return the voltage to apply this tick.
    pub fn get_voltage(&mut self) -> f64 {
        self.stats.ticks += 1;
        let next = self.decide();
        self.enter(next);
        let volts = self.output();
        self.curr.applied_volts = volts;
        tracing::trace!(
            state = %self.state,
            position = self.curr.position,
            velocity = self.curr.velocity,
            volts,
            "tick"
        );
        volts
    }

    // ── Configuration ───────────────────────────────────────────────────────

    /// Set the absolute lower limit. Ignored (`Ok(false)`) unless IDLE.
    pub fn set_min(&mut self, min: f64) -> Result<bool> {
        if !min.is_finite() {
            return Err(eyre::Report::new(AutotuneError::NonFinite("min")));
        }
        if !self.guard_idle("set_min") {
            return Ok(false);
        }
        self.bounds.min = min;
        self.recalc();
        Ok(true)
    }

    /// Set the absolute upper limit. Ignored (`Ok(false)`) unless IDLE.
    pub fn set_max(&mut self, max: f64) -> Result<bool> {
        if !max.is_finite() {
            return Err(eyre::Report::new(AutotuneError::NonFinite("max")));
        }
        if !self.guard_idle("set_max") {
            return Ok(false);
        }
        self.bounds.max = max;
        self.recalc();
        Ok(true)
    }

    /// Widen the absolute limits to include `position`. Useful for walking the
    /// mechanism to its physical stops by hand. Only while IDLE.
    pub fn add_bounds(&mut self, position: f64) -> Result<bool> {
        if !position.is_finite() {
            return Err(eyre::Report::new(AutotuneError::NonFinite("position")));
        }
        if !self.guard_idle("add_bounds") {
            return Ok(false);
        }
        let mut changed = false;
        if position > self.bounds.max {
            changed |= self.set_max(position)?;
        }
        if position < self.bounds.min {
            changed |= self.set_min(position)?;
        }
        Ok(changed)
    }

    /// Change the soft-envelope inset fraction.
    ///
    /// Only takes effect while NOT idle, the inverse of the limit setters.
    /// The initial fraction comes from the builder.
    pub fn set_degree_testing_bounds(&mut self, fraction: f64) -> Result<bool> {
        let fraction = validate_inset_fraction(fraction).map_err(eyre::Report::new)?;
        if self.state == TunerState::Idle {
            tracing::debug!(fraction, "set_degree_testing_bounds ignored while IDLE");
            return Ok(false);
        }
        self.inset_fraction = fraction;
        self.recalc();
        Ok(true)
    }

    /// Set the number of cells per axis. 0 is rejected.
    pub fn set_density(&mut self, density: u32) -> Result<bool> {
        if density == 0 {
            return Err(eyre::Report::new(AutotuneError::InvalidDensity(density)));
        }
        self.grid_cfg.density = density;
        self.recalc();
        Ok(true)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn state(&self) -> TunerState {
        self.state
    }

    pub fn mechanism(&self) -> &MechanismCfg {
        &self.mechanism
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn inset_fraction(&self) -> f64 {
        self.inset_fraction
    }

    pub fn density(&self) -> u32 {
        self.grid_cfg.density
    }

    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    pub fn grid_sizes(&self) -> GridSizes {
        self.sizes
    }

    /// Velocity extremes once known (from the sweep or supplied up front).
    pub fn velocity_range(&self) -> Option<VelocityRange> {
        self.velocity_range
    }

    /// The velocity cell size was floored because the observed range was zero.
    pub fn velocity_range_degenerate(&self) -> bool {
        self.velocity_degenerate
    }

    /// Samples waiting for the sweep to end.
    pub fn sweep_buffered(&self) -> usize {
        self.sweep.buffered()
    }

    pub fn current_pose(&self) -> MotorPose {
        self.curr
    }

    pub fn previous_pose(&self) -> MotorPose {
        self.prev
    }

    pub fn stats(&self) -> TunerStats {
        self.stats
    }

    /// Cell a sample would be filed in under the current grid sizes.
    pub fn coordinate_of(&self, pose: &MotorPose) -> Option<Coordinate> {
        coordinate_of(pose, &self.sizes, self.mechanism.position_unique)
    }

    // ── Private: state machine ──────────────────────────────────────────────

    /// Next state for this tick, from the current state and the latest poses.
    fn decide(&self) -> TunerState {
        let out_of_bounds = !self.bounds.in_test_bounds(self.curr.position);
        match self.state {
            TunerState::Idle => TunerState::Idle,
            TunerState::Calculating => TunerState::Calculating,
            TunerState::FindingMaxVel => {
                let resume = if self.sweep.is_complete() {
                    Resume::Tuning
                } else {
                    Resume::FindingMaxVel
                };
                Self::supervise(resume, out_of_bounds)
            }
            TunerState::Tuning => Self::supervise(Resume::Tuning, out_of_bounds),
            TunerState::Recenter { resume } => {
                if !self.crossed_center() {
                    return TunerState::Recenter { resume };
                }
                let resume = match resume {
                    Resume::FindingMaxVel if self.sweep.is_complete() => Resume::Tuning,
                    other => other,
                };
                // A jump straight across center can still land outside the
                // soft bounds; keep driving toward center in that case.
                Self::supervise(resume, out_of_bounds)
            }
        }
    }

    #[inline]
    fn supervise(resume: Resume, out_of_bounds: bool) -> TunerState {
        if out_of_bounds {
            TunerState::Recenter { resume }
        } else {
            resume.state()
        }
    }

    /// Voltage for the current state.
    fn output(&self) -> f64 {
        match self.state {
            TunerState::Idle
            | TunerState::Calculating
            | TunerState::FindingMaxVel
            | TunerState::Tuning => 0.0,
            TunerState::Recenter { .. } => {
                if self.curr.position > self.bounds.center {
                    -self.mechanism.max_volts
                } else {
                    self.mechanism.max_volts
                }
            }
        }
    }

    fn crossed_center(&self) -> bool {
        let above = self.curr.position > self.bounds.center;
        let was_above = self.prev.position > self.bounds.center;
        above ^ was_above
    }

    fn enter(&mut self, next: TunerState) {
        if next == self.state {
            return;
        }
        let leaves_sweep = matches!(
            next,
            TunerState::Tuning
                | TunerState::Recenter {
                    resume: Resume::Tuning
                }
        );
        if leaves_sweep && self.velocity_range.is_none() {
            self.finish_sweep();
        }
        if next.is_overriding() && !self.state.is_overriding() {
            self.stats.recenter_events += 1;
            tracing::debug!(
                position = self.curr.position,
                test_min = self.bounds.test_min,
                test_max = self.bounds.test_max,
                "left soft bounds, recentering"
            );
        }
        tracing::debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn finish_sweep(&mut self) {
        let range = self.sweep.range();
        self.stats.sweep_hit_cap = self.sweep.hit_cap();
        if self.stats.sweep_hit_cap {
            tracing::warn!(
                ticks = self.sweep.ticks(),
                min = range.min,
                max = range.max,
                "velocity sweep ended on tick cap before converging"
            );
        }
        self.velocity_range = Some(range);
        self.update_velocity_size();
        let buffered = self.sweep.take_buffer();
        tracing::info!(
            min = range.min,
            max = range.max,
            cell = ?self.sizes.velocity,
            buffered = buffered.len(),
            "velocity sweep complete"
        );
        for pose in buffered {
            self.file(pose);
        }
    }

    fn file(&mut self, pose: MotorPose) {
        match coordinate_of(&pose, &self.sizes, self.mechanism.position_unique) {
            Some(c) => self.grid.push(c, pose),
            None => {
                self.stats.rejected_samples += 1;
                tracing::warn!(?pose, "sample could not be binned");
            }
        }
    }

    fn guard_idle(&self, op: &'static str) -> bool {
        if self.state == TunerState::Idle {
            true
        } else {
            tracing::debug!(op, state = %self.state, "bounds change ignored outside IDLE");
            false
        }
    }

    /// Recompute the envelope and cell sizes after any bound, density or inset change.
    pub(crate) fn recalc(&mut self) {
        self.bounds = Bounds::compute(self.bounds.min, self.bounds.max, self.inset_fraction);
        if !self.bounds.is_ordered() {
            tracing::warn!(
                min = self.bounds.min,
                max = self.bounds.max,
                "min > max; using the ordered pair for the test envelope"
            );
        }
        let (pos_size, floored) = cell_size(
            self.bounds.range(),
            self.grid_cfg.density,
            self.grid_cfg.min_cell_size,
        );
        if floored && !self.mechanism.position_unique {
            tracing::debug!(
                range = self.bounds.range(),
                cell = pos_size,
                "position range empty; cell size floored"
            );
        }
        self.sizes.position = pos_size;
        if self.velocity_range.is_some() {
            self.update_velocity_size();
        }
    }

    fn update_velocity_size(&mut self) {
        let Some(range) = self.velocity_range else {
            return;
        };
        let (vel_size, floored) = cell_size(
            range.span(),
            self.grid_cfg.density,
            self.grid_cfg.min_cell_size,
        );
        if floored && !self.velocity_degenerate {
            tracing::warn!(
                min = range.min,
                max = range.max,
                cell = vel_size,
                "velocity range degenerate; cell size floored"
            );
        }
        self.velocity_degenerate = floored;
        self.sizes.velocity = Some(vel_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundsCfg, SweepCfg};

    fn tuner(max_volts: f64) -> MotorAutotuner {
        MotorAutotuner::builder()
            .with_mechanism(MechanismCfg::new("arm", false, max_volts))
            .with_bounds(BoundsCfg {
                min: -10.0,
                max: 10.0,
                test_inset_fraction: 10.0,
            })
            .with_known_velocity_range(VelocityRange::new(-4.0, 6.0))
            .build()
            .unwrap()
    }

    fn tick(t: &mut MotorAutotuner, position: f64) -> f64 {
        t.set_current_pose(Pose1D::new(position, 0.0, 0.0));
        t.get_voltage()
    }

    #[test]
    fn leaving_soft_bounds_recenters_on_the_same_tick() {
        let mut t = tuner(6.0);
        t.start();
        assert_eq!(tick(&mut t, 8.5), 0.0);
        assert_eq!(t.state(), TunerState::Tuning);
        assert_eq!(tick(&mut t, 9.0), -6.0);
        assert!(t.state().is_overriding());
        assert_eq!(tick(&mut t, 9.0), -6.0);
        assert_eq!(t.stats().recenter_events, 1);
    }

    #[test]
    fn crossing_center_returns_to_tuning() {
        let mut t = tuner(6.0);
        t.start();
        tick(&mut t, 9.0);
        assert_eq!(tick(&mut t, 1.0), -6.0);
        assert_eq!(tick(&mut t, -1.0), 0.0);
        assert_eq!(t.state(), TunerState::Tuning);
    }

    #[test]
    fn jump_across_center_out_of_bounds_keeps_recentering() {
        let mut t = tuner(6.0);
        t.start();
        tick(&mut t, 9.0);
        // Crosses center but lands below test_min.
        assert_eq!(tick(&mut t, -9.0), 6.0);
        assert_eq!(
            t.state(),
            TunerState::Recenter {
                resume: Resume::Tuning
            }
        );
        assert_eq!(tick(&mut t, -8.5), 6.0);
        assert_eq!(tick(&mut t, 0.5), 0.0);
        assert_eq!(t.state(), TunerState::Tuning);
    }

    #[test]
    fn idle_never_records_and_outputs_zero() {
        let mut t = tuner(6.0);
        for p in [-20.0, 0.0, 20.0] {
            assert_eq!(tick(&mut t, p), 0.0);
        }
        assert!(t.grid().is_empty());
        assert_eq!(t.stats().samples_received, 0);
        assert_eq!(t.state(), TunerState::Idle);
    }

    #[test]
    fn pause_zeroes_output_and_narrow_pose_voltage() {
        let mut t = tuner(6.0);
        t.start();
        assert_eq!(tick(&mut t, 9.5), -6.0);
        t.pause();
        assert_eq!(t.get_voltage(), 0.0);
        t.set_current_pose(Pose1D::new(0.0, 0.0, 0.0));
        assert_eq!(t.current_pose().applied_volts, 0.0);
    }

    #[test]
    fn finish_freezes_output() {
        let mut t = tuner(6.0);
        t.start();
        tick(&mut t, 9.5);
        t.finish();
        assert_eq!(tick(&mut t, 9.5), 0.0);
        assert_eq!(t.state(), TunerState::Calculating);
    }

    #[test]
    fn setters_only_apply_while_idle() {
        let mut t = tuner(6.0);
        assert!(t.set_max(12.0).unwrap());
        t.start();
        assert!(!t.set_max(20.0).unwrap());
        assert!(!t.set_min(-20.0).unwrap());
        assert!(!t.add_bounds(30.0).unwrap());
        assert_eq!(t.bounds().max, 12.0);
    }

    #[test]
    fn inset_fraction_only_applies_while_running() {
        let mut t = tuner(6.0);
        assert!(!t.set_degree_testing_bounds(4.0).unwrap());
        assert_eq!(t.bounds().test_max, 8.0);
        t.start();
        assert!(t.set_degree_testing_bounds(4.0).unwrap());
        assert_eq!(t.bounds().test_max, 5.0);
        assert!(t.set_degree_testing_bounds(1.0).is_err());
    }

    #[test]
    fn add_bounds_only_widens() {
        let mut t = tuner(6.0);
        assert!(!t.add_bounds(3.0).unwrap());
        assert!(t.add_bounds(15.0).unwrap());
        assert!(t.add_bounds(-12.0).unwrap());
        assert_eq!((t.bounds().min, t.bounds().max), (-12.0, 15.0));
    }

    #[test]
    fn zero_density_is_rejected() {
        let mut t = tuner(6.0);
        let err = t.set_density(0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AutotuneError>(),
            Some(&AutotuneError::InvalidDensity(0))
        );
        assert_eq!(t.density(), 50);
    }

    #[test]
    fn density_change_rescales_both_axes() {
        let mut t = tuner(6.0);
        t.set_density(10).unwrap();
        let sizes = t.grid_sizes();
        assert_eq!(sizes.position, 2.0);
        assert_eq!(sizes.velocity, Some(1.0));
    }

    #[test]
    fn sweep_bins_buffered_samples_after_range_is_known() {
        let mut t = MotorAutotuner::builder()
            .with_mechanism(MechanismCfg::new("arm", false, 6.0))
            .with_bounds(BoundsCfg {
                min: -10.0,
                max: 10.0,
                test_inset_fraction: 10.0,
            })
            .with_sweep(SweepCfg {
                min_ticks: 3,
                stable_ticks: 1,
                max_ticks: 100,
                min_velocity_span: 0.0,
            })
            .build()
            .unwrap();
        t.start();
        assert_eq!(t.state(), TunerState::FindingMaxVel);
        for v in [-4.0, 6.0, 3.0] {
            t.set_current_pose_full(MotorPose::new(0.0, v, 0.0, 0.0));
            t.get_voltage();
        }
        assert_eq!(t.state(), TunerState::Tuning);
        assert_eq!(t.grid_sizes().velocity, Some(0.2));
        assert_eq!(t.grid().sample_count(), 3);
        assert_eq!(t.sweep_buffered(), 0);
        let c = t
            .coordinate_of(&MotorPose::new(0.0, 3.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(c.velocity, 15);
        assert_eq!(t.grid().get(&c).map(<[MotorPose]>::len), Some(1));
    }

    #[test]
    fn small_travel_keeps_exact_cell_sizes() {
        let t = MotorAutotuner::builder()
            .with_mechanism(MechanismCfg::new("pincer", false, 3.0))
            .with_bounds(BoundsCfg {
                min: 0.0,
                max: 0.04,
                test_inset_fraction: 12.0,
            })
            .with_known_velocity_range(VelocityRange::new(-0.02, 0.02))
            .build()
            .unwrap();
        let sizes = t.grid_sizes();
        assert!((sizes.position - 0.0008).abs() < 1e-15);
        assert!((sizes.velocity.unwrap() - 0.0008).abs() < 1e-15);
        assert!(!t.velocity_range_degenerate());
        let c = t
            .coordinate_of(&MotorPose::new(0.039, 0.019, 0.0, 0.0))
            .unwrap();
        assert_eq!(c, Coordinate::new(48, 23));
    }

    #[test]
    fn inverted_limits_keep_the_envelope_ordered() {
        let mut t = tuner(6.0);
        assert!(t.set_min(20.0).unwrap());
        let b = *t.bounds();
        assert_eq!((b.min, b.max), (20.0, 10.0));
        assert_eq!(b.center, 15.0);
        assert!(b.test_min <= b.center && b.center <= b.test_max);
        assert_eq!((b.test_min, b.test_max), (11.0, 19.0));
        assert_eq!(t.grid_sizes().position, 0.2);

        t.start();
        assert_eq!(tick(&mut t, 19.5), -6.0);
        assert_eq!(tick(&mut t, 14.0), 0.0);
        assert_eq!(t.state(), TunerState::Tuning);
        assert_eq!(tick(&mut t, 10.5), 6.0);
        assert!(t.state().is_overriding());
    }

    #[test]
    fn close_sweep_bins_buffer_and_is_idempotent() {
        let mut t = MotorAutotuner::builder()
            .with_mechanism(MechanismCfg::new("arm", false, 6.0))
            .build()
            .unwrap();
        t.start();
        for v in [0.5, -0.5, 1.0] {
            t.set_current_pose_full(MotorPose::new(0.0, v, 0.0, 0.0));
            t.get_voltage();
        }
        assert_eq!(t.sweep_buffered(), 3);
        t.close_sweep();
        assert_eq!(t.sweep_buffered(), 0);
        assert_eq!(t.grid().sample_count(), 3);
        assert_eq!(t.velocity_range(), Some(VelocityRange::new(-0.5, 1.0)));
        t.close_sweep();
        assert_eq!(t.grid().sample_count(), 3);
    }

    #[test]
    fn non_finite_pose_is_rejected_without_moving_tracking() {
        let mut t = tuner(6.0);
        t.start();
        tick(&mut t, 1.0);
        t.set_current_pose(Pose1D::new(f64::NAN, 0.0, 0.0));
        assert_eq!(t.current_pose().position, 1.0);
        assert_eq!(t.stats().rejected_samples, 1);
        assert_eq!(t.grid().sample_count(), 1);
    }
}
