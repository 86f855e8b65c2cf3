//! Mechanism backends for the autotuner.
//!
//! `SimulatedMechanism` is a single-axis DC-motor plant following the usual
//! feedforward model `V = kS·sgn(v) + kV·v + kA·a + kG`, integrated once per
//! pose read. It hands out an encoder (`PoseSource`) and a motor
//! (`Actuator`) that share the same plant state.

pub mod error;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use autotune_traits::{Actuator, Pose1D, PoseSource};

use crate::error::HwError;

/// Plant constants and integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Volts per unit velocity.
    pub kv: f64,
    /// Volts per unit acceleration. Must be > 0.
    pub ka: f64,
    /// Static/kinetic friction (volts).
    pub ks: f64,
    /// Constant gravity load (volts).
    pub kg: f64,
    /// Integration step in seconds, normally the control period.
    pub dt_s: f64,
    pub initial_position: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            kv: 1.0,
            ka: 0.1,
            ks: 0.05,
            kg: 0.0,
            dt_s: 0.02,
            initial_position: 0.0,
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> crate::error::Result<()> {
        let all_finite = [
            self.kv,
            self.ka,
            self.ks,
            self.kg,
            self.dt_s,
            self.initial_position,
        ]
        .iter()
        .all(|x| x.is_finite());
        if !all_finite {
            return Err(HwError::InvalidParams("all plant parameters must be finite"));
        }
        if self.ka <= 0.0 {
            return Err(HwError::InvalidParams("ka must be > 0"));
        }
        if self.dt_s <= 0.0 {
            return Err(HwError::InvalidParams("dt_s must be > 0"));
        }
        if self.kv < 0.0 || self.ks < 0.0 {
            return Err(HwError::InvalidParams("kv and ks must be >= 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PlantState {
    pose: Pose1D,
    volts: f64,
    reads: u64,
}

/// Shared simulated plant.
#[derive(Debug, Clone)]
pub struct SimulatedMechanism {
    params: SimParams,
    state: Rc<Cell<PlantState>>,
    fail_reads_after: Option<u64>,
}

impl SimulatedMechanism {
    pub fn new(params: SimParams) -> crate::error::Result<Self> {
        params.validate()?;
        let state = PlantState {
            pose: Pose1D::new(params.initial_position, 0.0, 0.0),
            ..PlantState::default()
        };
        Ok(Self {
            params,
            state: Rc::new(Cell::new(state)),
            fail_reads_after: None,
        })
    }

    /// Make every pose read after the first `n` time out. For fault testing.
    pub fn with_dropout_after(mut self, n: u64) -> Self {
        self.fail_reads_after = Some(n);
        self
    }

    /// Encoder/motor pair bound to this plant.
    pub fn split(&self) -> (SimEncoder, SimMotor) {
        (
            SimEncoder {
                params: self.params,
                state: Rc::clone(&self.state),
                fail_reads_after: self.fail_reads_after,
            },
            SimMotor {
                state: Rc::clone(&self.state),
            },
        )
    }

    pub fn pose(&self) -> Pose1D {
        self.state.get().pose
    }

    pub fn applied_volts(&self) -> f64 {
        self.state.get().volts
    }
}

/// Acceleration produced by `volts` at `velocity`.
fn acceleration(p: &SimParams, velocity: f64, volts: f64) -> f64 {
    let drive = volts - p.kg;
    if velocity == 0.0 {
        // Stiction holds the mechanism until the drive exceeds ks.
        if drive.abs() <= p.ks {
            return 0.0;
        }
        return (drive - p.ks * drive.signum()) / p.ka;
    }
    (drive - p.ks * velocity.signum() - p.kv * velocity) / p.ka
}

/// Advance the plant one step (semi-implicit Euler).
fn step(p: &SimParams, pose: Pose1D, volts: f64) -> Pose1D {
    let a = acceleration(p, pose.velocity, volts);
    let mut v = pose.velocity + a * p.dt_s;
    // Friction alone must not reverse the direction of travel.
    if pose.velocity != 0.0 && v.signum() != pose.velocity.signum() && (volts - p.kg).abs() <= p.ks
    {
        v = 0.0;
    }
    Pose1D::new(pose.position + v * p.dt_s, v, a)
}

/// Encoder side of the simulated plant.
pub struct SimEncoder {
    params: SimParams,
    state: Rc<Cell<PlantState>>,
    fail_reads_after: Option<u64>,
}

impl PoseSource for SimEncoder {
    fn read_pose(
        &mut self,
        _timeout: Duration,
    ) -> Result<Pose1D, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.get();
        if self.fail_reads_after.is_some_and(|n| s.reads >= n) {
            tracing::warn!(reads = s.reads, "simulated encoder dropout");
            return Err(Box::new(HwError::Timeout));
        }
        s.pose = step(&self.params, s.pose, s.volts);
        s.reads += 1;
        self.state.set(s);
        tracing::trace!(
            position = s.pose.position,
            velocity = s.pose.velocity,
            "simulated pose"
        );
        Ok(s.pose)
    }
}

/// Motor side of the simulated plant.
pub struct SimMotor {
    state: Rc<Cell<PlantState>>,
}

impl Actuator for SimMotor {
    fn set_voltage(&mut self, volts: f64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !volts.is_finite() {
            return Err(Box::new(HwError::NonFiniteCommand(volts)));
        }
        let mut s = self.state.get();
        s.volts = volts;
        self.state.set(s);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.get();
        s.volts = 0.0;
        self.state.set(s);
        tracing::debug!("simulated motor stopped");
        Ok(())
    }
}
