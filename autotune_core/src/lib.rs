#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motor autotuning core (hardware-agnostic).
//!
//! A `MotorAutotuner` characterizes a single-axis mechanism by recording
//! (position, velocity, acceleration, applied voltage) samples into a grid of
//! (position, velocity) cells while keeping the mechanism inside a soft
//! envelope. All hardware interaction goes through the
//! `autotune_traits::PoseSource` and `autotune_traits::Actuator` traits.
//!
//! ## Architecture
//!
//! - **Bounds**: absolute limits, center and inset soft envelope (`bounds`)
//! - **Sweep**: velocity-range discovery before binning starts (`sweep`)
//! - **Grid**: coordinate mapping and the append-only sample store (`grid`)
//! - **State machine**: IDLE → FINDING_MAX_VEL → TUNING ⇄ RECENTER → CALCULATING (`tuner`)
//! - **Runner**: fixed-rate session loop with excitation, and offline replay (`runner`)
//!
//! The tuner itself never blocks and never reads a clock; the runner owns pacing.

pub mod bounds;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod grid;
pub mod pose;
pub mod runner;
pub mod state;
pub mod sweep;
pub mod tuner;
pub mod util;

pub use autotune_traits::Pose1D;
pub use bounds::Bounds;
pub use builder::AutotunerBuilder;
pub use config::{BoundsCfg, ExcitationCfg, GridCfg, MechanismCfg, RunnerCfg, SweepCfg, VelocityRange};
pub use error::{AutotuneError, BuildError, Result};
pub use grid::{CellSummary, Coordinate, GridSizes, GridStore};
pub use pose::MotorPose;
pub use runner::{Excitation, NoExcitation, SessionReport, SineExcitation, replay, run_session};
pub use state::{Resume, TunerState};
pub use tuner::{MotorAutotuner, TunerStats};
