//! Velocity range discovery.
//!
//! Samples seen before the velocity cell size is known are buffered here and
//! handed back for binning once the sweep terminates.

use crate::config::{SweepCfg, VelocityRange};
use crate::pose::MotorPose;

#[derive(Debug, Clone)]
pub struct VelocitySweep {
    cfg: SweepCfg,
    // Both start at 0: the mechanism has to be driven both ways to widen them.
    max_seen: f64,
    min_seen: f64,
    ticks: u32,
    stable_for: u32,
    buffer: Vec<MotorPose>,
}

impl VelocitySweep {
    pub fn new(cfg: SweepCfg) -> Self {
        Self {
            cfg,
            max_seen: 0.0,
            min_seen: 0.0,
            ticks: 0,
            stable_for: 0,
            buffer: Vec::new(),
        }
    }

    /// Track extrema and buffer the sample. Caller filters non-finite samples.
    pub fn observe(&mut self, pose: MotorPose) {
        let mut widened = false;
        if pose.velocity > self.max_seen {
            self.max_seen = pose.velocity;
            widened = true;
        }
        if pose.velocity < self.min_seen {
            self.min_seen = pose.velocity;
            widened = true;
        }
        self.stable_for = if widened {
            0
        } else {
            self.stable_for.saturating_add(1)
        };
        self.ticks = self.ticks.saturating_add(1);
        self.buffer.push(pose);
    }

    /// Termination predicate; see `SweepCfg`.
    pub fn is_complete(&self) -> bool {
        self.hit_cap() || self.converged()
    }

    fn converged(&self) -> bool {
        self.ticks >= self.cfg.min_ticks
            && self.stable_for >= self.cfg.stable_ticks
            && self.span() >= self.cfg.min_velocity_span
    }

    /// The hard tick cap was reached before the extrema converged.
    pub fn hit_cap(&self) -> bool {
        self.cfg.max_ticks > 0 && self.ticks >= self.cfg.max_ticks && !self.converged()
    }

    pub fn range(&self) -> VelocityRange {
        VelocityRange::new(self.min_seen, self.max_seen)
    }

    pub fn span(&self) -> f64 {
        self.max_seen - self.min_seen
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drain buffered samples in arrival order.
    pub fn take_buffer(&mut self) -> Vec<MotorPose> {
        std::mem::take(&mut self.buffer)
    }
}
