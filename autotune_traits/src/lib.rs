pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// One tick's kinematic reading of a single-axis mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose1D {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl Pose1D {
    pub const fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
        }
    }
}

/// Supplies one pose per control tick (encoder + estimator, simulator, recorded trace).
pub trait PoseSource {
    fn read_pose(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Pose1D, Box<dyn std::error::Error + Send + Sync>>;
}

/// Applies the commanded voltage to the mechanism.
pub trait Actuator {
    fn set_voltage(&mut self, volts: f64) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
