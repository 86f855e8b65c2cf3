//! Fixed-rate session runner and offline replay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(feature = "hardware")]
use autotune_hardware::error::HwError;
use autotune_traits::{Actuator, Clock, PoseSource};

use crate::config::{ExcitationCfg, RunnerCfg, VelocityRange};
use crate::error::{AutotuneError, Result};
use crate::pose::MotorPose;
use crate::state::TunerState;
use crate::tuner::MotorAutotuner;

/// Voltage source that moves the mechanism while the tuner only supervises.
pub trait Excitation {
    fn volts(&mut self, tick: u64) -> f64;
}

/// No excitation; the mechanism only moves under recentering.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExcitation;

impl Excitation for NoExcitation {
    fn volts(&mut self, _tick: u64) -> f64 {
        0.0
    }
}

/// `amplitude · sin(2π · tick / period)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineExcitation {
    amplitude: f64,
    period_ticks: u32,
}

impl SineExcitation {
    pub fn new(amplitude: f64, period_ticks: u32) -> Self {
        Self {
            amplitude,
            period_ticks,
        }
    }
}

impl From<ExcitationCfg> for SineExcitation {
    fn from(c: ExcitationCfg) -> Self {
        Self::new(c.amplitude_volts, c.period_ticks)
    }
}

impl Excitation for SineExcitation {
    fn volts(&mut self, tick: u64) -> f64 {
        if self.period_ticks == 0 {
            return 0.0;
        }
        let phase = (tick % u64::from(self.period_ticks)) as f64 / f64::from(self.period_ticks);
        self.amplitude * (std::f64::consts::TAU * phase).sin()
    }
}

/// Outcome of a session or replay.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub name: String,
    pub ticks: u64,
    pub final_state: TunerState,
    pub cells: usize,
    pub samples: usize,
    pub rejected_samples: u64,
    pub recenter_events: u64,
    pub velocity_range: Option<VelocityRange>,
    pub velocity_range_degenerate: bool,
    pub sweep_hit_cap: bool,
    pub interrupted: bool,
}

impl SessionReport {
    pub fn from_tuner(tuner: &MotorAutotuner, interrupted: bool) -> Self {
        let stats = tuner.stats();
        Self {
            name: tuner.mechanism().name.clone(),
            ticks: stats.ticks,
            final_state: tuner.state(),
            cells: tuner.grid().len(),
            samples: tuner.grid().sample_count(),
            rejected_samples: stats.rejected_samples,
            recenter_events: stats.recenter_events,
            velocity_range: tuner.velocity_range(),
            velocity_range_degenerate: tuner.velocity_range_degenerate(),
            sweep_hit_cap: stats.sweep_hit_cap,
            interrupted,
        }
    }
}

#[cfg(feature = "hardware")]
fn map_pose_error(e: &(dyn std::error::Error + Send + Sync + 'static)) -> AutotuneError {
    match e.downcast_ref::<HwError>() {
        Some(HwError::Timeout) => AutotuneError::Timeout,
        _ => AutotuneError::PoseSource(e.to_string()),
    }
}

#[cfg(not(feature = "hardware"))]
fn map_pose_error(e: &(dyn std::error::Error + Send + Sync + 'static)) -> AutotuneError {
    AutotuneError::PoseSource(e.to_string())
}

/// Drive a tuning session until `cfg.max_ticks` or `shutdown`.
///
/// Each tick: read pose, file it with the voltage applied last tick, ask the
/// tuner for its voltage, add excitation unless the tuner is overriding, apply.
/// The actuator is stopped on every exit path.
pub fn run_session<P, A, E, C>(
    tuner: &mut MotorAutotuner,
    source: &mut P,
    actuator: &mut A,
    excitation: &mut E,
    clock: &C,
    cfg: &RunnerCfg,
    shutdown: &AtomicBool,
) -> Result<SessionReport>
where
    P: PoseSource + ?Sized,
    A: Actuator + ?Sized,
    E: Excitation + ?Sized,
    C: Clock + ?Sized,
{
    let period = Duration::from_micros(crate::util::period_us(cfg.sample_rate_hz));
    let timeout = Duration::from_millis(cfg.pose_timeout_ms.max(1));
    let max_volts = tuner.mechanism().max_volts;

    tuner.start();
    tracing::info!(
        name = %tuner.mechanism().name,
        rate_hz = cfg.sample_rate_hz,
        max_ticks = cfg.max_ticks,
        "tuning session start"
    );

    let mut applied = 0.0;
    let mut tick: u64 = 0;
    let mut deadline = clock.now();
    let mut interrupted = false;
    while cfg.max_ticks == 0 || tick < cfg.max_ticks {
        if shutdown.load(Ordering::Relaxed) {
            interrupted = true;
            break;
        }
        let pose = match source.read_pose(timeout) {
            Ok(p) => p,
            Err(e) => {
                let err = map_pose_error(e.as_ref());
                tracing::error!(error = %err, tick, "pose read failed");
                tuner.pause();
                let _ = actuator.stop();
                return Err(eyre::Report::new(err));
            }
        };
        tuner.set_current_pose_full(MotorPose::from_pose(pose, applied));
        let tuner_volts = tuner.get_voltage();
        let volts = match tuner.state() {
            TunerState::FindingMaxVel | TunerState::Tuning => {
                excitation.volts(tick).clamp(-max_volts, max_volts)
            }
            _ => tuner_volts,
        };
        if let Err(e) = actuator.set_voltage(volts) {
            tracing::error!(error = %e, tick, volts, "actuator command failed");
            tuner.pause();
            let _ = actuator.stop();
            return Err(eyre::Report::new(AutotuneError::Actuator(e.to_string())));
        }
        applied = volts;
        tick += 1;
        deadline += period;
        clock.sleep_until(deadline);
    }

    if interrupted {
        tracing::warn!(tick, "session interrupted");
        // Keep what the sweep recorded in the exported grid.
        tuner.close_sweep();
        tuner.pause();
    } else {
        tuner.finish();
    }
    actuator
        .stop()
        .map_err(|e| eyre::Report::new(AutotuneError::Actuator(e.to_string())))?;
    Ok(SessionReport::from_tuner(tuner, interrupted))
}

/// Feed recorded samples through the tuner without actuation.
///
/// Each sample carries the voltage that was applied when it was recorded.
pub fn replay<I>(tuner: &mut MotorAutotuner, samples: I) -> SessionReport
where
    I: IntoIterator<Item = MotorPose>,
{
    tuner.start();
    for sample in samples {
        tuner.set_current_pose_full(sample);
        let _ = tuner.get_voltage();
    }
    tuner.finish();
    SessionReport::from_tuner(tuner, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_excitation_shape() {
        let mut s = SineExcitation::new(2.0, 4);
        assert_eq!(s.volts(0), 0.0);
        assert!((s.volts(1) - 2.0).abs() < 1e-12);
        assert!((s.volts(3) + 2.0).abs() < 1e-12);
        assert!((s.volts(5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_period_disables_excitation() {
        let mut s = SineExcitation::from(ExcitationCfg {
            amplitude_volts: 5.0,
            period_ticks: 0,
        });
        assert_eq!(s.volts(17), 0.0);
        assert_eq!(NoExcitation.volts(3), 0.0);
    }

    #[cfg(feature = "hardware")]
    #[test]
    fn timeout_maps_to_typed_error() {
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::Timeout);
        assert_eq!(map_pose_error(e.as_ref()), AutotuneError::Timeout);
        let e: Box<dyn std::error::Error + Send + Sync> = "wire cut".into();
        assert!(matches!(
            map_pose_error(e.as_ref()),
            AutotuneError::PoseSource(_)
        ));
    }
}
