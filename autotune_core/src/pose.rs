//! Per-tick sample type filed into the grid.

use autotune_traits::Pose1D;

/// One tick's kinematic reading plus the voltage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorPose {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub applied_volts: f64,
}

impl MotorPose {
    pub const fn new(position: f64, velocity: f64, acceleration: f64, applied_volts: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
            applied_volts,
        }
    }

    /// Merge a narrow pose reading with the voltage that was applied for it.
    pub const fn from_pose(pose: Pose1D, applied_volts: f64) -> Self {
        Self::new(pose.position, pose.velocity, pose.acceleration, applied_volts)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.acceleration.is_finite()
            && self.applied_volts.is_finite()
    }

    pub const fn kinematics(&self) -> Pose1D {
        Pose1D::new(self.position, self.velocity, self.acceleration)
    }
}
