use std::sync::atomic::AtomicBool;
use std::time::Duration;

use autotune_core::{
    AutotuneError, BoundsCfg, Excitation, MechanismCfg, MotorAutotuner, MotorPose, NoExcitation,
    RunnerCfg, SineExcitation, SweepCfg, TunerState, VelocityRange, replay, run_session,
};
use autotune_hardware::{SimParams, SimulatedMechanism};
use autotune_traits::clock::manual::ManualClock;
use autotune_traits::{Actuator, Pose1D, PoseSource};
use rstest::rstest;

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

fn arm(known: Option<VelocityRange>) -> MotorAutotuner {
    let b = MotorAutotuner::builder()
        .with_mechanism(MechanismCfg::new("arm", false, 6.0))
        .with_bounds(BoundsCfg {
            min: -10.0,
            max: 10.0,
            test_inset_fraction: 10.0,
        });
    match known {
        Some(r) => b.with_known_velocity_range(r).build().unwrap(),
        None => b.build().unwrap(),
    }
}

fn runner(max_ticks: u64) -> RunnerCfg {
    RunnerCfg {
        sample_rate_hz: 50,
        max_ticks,
        pose_timeout_ms: 100,
    }
}

/// Always reports the same position.
struct Parked(f64);

impl PoseSource for Parked {
    fn read_pose(&mut self, _timeout: Duration) -> Result<Pose1D, BoxErr> {
        Ok(Pose1D::new(self.0, 0.0, 0.0))
    }
}

#[derive(Default)]
struct Recorder {
    volts: Vec<f64>,
    stops: usize,
    fail: bool,
}

impl Actuator for Recorder {
    fn set_voltage(&mut self, volts: f64) -> Result<(), BoxErr> {
        if self.fail {
            return Err("driver fault".into());
        }
        self.volts.push(volts);
        Ok(())
    }
    fn stop(&mut self) -> Result<(), BoxErr> {
        self.stops += 1;
        Ok(())
    }
}

struct Constant(f64);

impl Excitation for Constant {
    fn volts(&mut self, _tick: u64) -> f64 {
        self.0
    }
}

#[rstest]
fn simulated_session_sweeps_and_fills_grid() {
    let sim = SimulatedMechanism::new(SimParams::default()).unwrap();
    let (mut enc, mut motor) = sim.split();
    let mut t = arm(None);
    let clock = ManualClock::new();
    let stop = AtomicBool::new(false);

    let report = run_session(
        &mut t,
        &mut enc,
        &mut motor,
        &mut SineExcitation::new(4.0, 200),
        &clock,
        &runner(1_000),
        &stop,
    )
    .unwrap();

    assert_eq!(report.ticks, 1_000);
    assert_eq!(report.final_state, TunerState::Calculating);
    assert!(!report.interrupted);
    assert_eq!(report.samples, 1_000);
    assert!(report.cells > 1);
    assert!(report.velocity_range.is_some());
    assert_eq!(clock.elapsed(), Duration::from_millis(20 * 1_000));
    assert_eq!(sim.applied_volts(), 0.0);
}

#[rstest]
fn starting_outside_soft_bounds_recenters_first() {
    let sim = SimulatedMechanism::new(SimParams {
        initial_position: 9.5,
        ..SimParams::default()
    })
    .unwrap();
    let (mut enc, mut motor) = sim.split();
    let mut t = MotorAutotuner::builder()
        .with_mechanism(MechanismCfg::new("arm", false, 6.0))
        .with_bounds(BoundsCfg {
            min: -10.0,
            max: 10.0,
            test_inset_fraction: 10.0,
        })
        .with_sweep(SweepCfg {
            min_ticks: 20,
            stable_ticks: 10,
            max_ticks: 200,
            min_velocity_span: 0.0,
        })
        .build()
        .unwrap();

    let report = run_session(
        &mut t,
        &mut enc,
        &mut motor,
        &mut NoExcitation,
        &ManualClock::new(),
        &runner(400),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert!(report.recenter_events >= 1);
    let v = report.velocity_range.unwrap();
    assert!(v.min < -5.0, "sweep saw recenter speed: {v:?}");
    let p = sim.pose().position;
    assert!(t.bounds().in_test_bounds(p), "ended at {p}");
}

#[rstest]
fn excitation_is_clamped_and_recenter_overrides_it() {
    let mut t = arm(Some(VelocityRange::new(-1.0, 1.0)));
    let mut act = Recorder::default();
    run_session(
        &mut t,
        &mut Parked(0.0),
        &mut act,
        &mut Constant(10.0),
        &ManualClock::new(),
        &runner(5),
        &AtomicBool::new(false),
    )
    .unwrap();
    assert_eq!(act.volts, vec![6.0; 5]);
    assert_eq!(act.stops, 1);

    let mut t = arm(Some(VelocityRange::new(-1.0, 1.0)));
    let mut act = Recorder::default();
    run_session(
        &mut t,
        &mut Parked(9.5),
        &mut act,
        &mut Constant(3.0),
        &ManualClock::new(),
        &runner(3),
        &AtomicBool::new(false),
    )
    .unwrap();
    assert_eq!(act.volts, vec![-6.0; 3]);
}

#[rstest]
fn shutdown_flag_pauses_before_first_tick() {
    let mut t = arm(None);
    let mut act = Recorder::default();
    let report = run_session(
        &mut t,
        &mut Parked(0.0),
        &mut act,
        &mut NoExcitation,
        &ManualClock::new(),
        &runner(0),
        &AtomicBool::new(true),
    )
    .unwrap();
    assert!(report.interrupted);
    assert_eq!(report.ticks, 0);
    assert_eq!(t.state(), TunerState::Idle);
    assert_eq!(act.stops, 1);
}

/// Raises the shutdown flag on its `n`th read, with a growing velocity.
struct StopAfter<'a> {
    n: usize,
    reads: usize,
    flag: &'a AtomicBool,
}

impl PoseSource for StopAfter<'_> {
    fn read_pose(&mut self, _timeout: Duration) -> Result<Pose1D, BoxErr> {
        self.reads += 1;
        if self.reads >= self.n {
            self.flag.store(true, std::sync::atomic::Ordering::Relaxed);
        }
        Ok(Pose1D::new(0.0, self.reads as f64 * 0.1, 0.0))
    }
}

#[rstest]
fn interrupt_during_sweep_keeps_recorded_samples() {
    let stop = AtomicBool::new(false);
    let mut source = StopAfter {
        n: 10,
        reads: 0,
        flag: &stop,
    };
    let mut t = arm(None);
    let mut act = Recorder::default();
    let report = run_session(
        &mut t,
        &mut source,
        &mut act,
        &mut NoExcitation,
        &ManualClock::new(),
        &runner(1_000),
        &stop,
    )
    .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.ticks, 10);
    assert_eq!(report.final_state, TunerState::Idle);
    assert_eq!(report.samples, 10);
    assert_eq!(t.sweep_buffered(), 0);
    let v = report.velocity_range.unwrap();
    assert_eq!(v.min, 0.0);
    assert!((v.max - 1.0).abs() < 1e-12);
}

#[rstest]
fn encoder_dropout_surfaces_typed_timeout() {
    let sim = SimulatedMechanism::new(SimParams::default())
        .unwrap()
        .with_dropout_after(5);
    let (mut enc, mut motor) = sim.split();
    let mut t = arm(None);
    let err = run_session(
        &mut t,
        &mut enc,
        &mut motor,
        &mut SineExcitation::new(4.0, 50),
        &ManualClock::new(),
        &runner(100),
        &AtomicBool::new(false),
    )
    .unwrap_err();
    assert_eq!(err.downcast_ref::<AutotuneError>(), Some(&AutotuneError::Timeout));
    assert_eq!(t.state(), TunerState::Idle);
    assert_eq!(sim.applied_volts(), 0.0);
}

#[rstest]
fn actuator_fault_stops_session() {
    let mut t = arm(None);
    let mut act = Recorder {
        fail: true,
        ..Recorder::default()
    };
    let err = run_session(
        &mut t,
        &mut Parked(0.0),
        &mut act,
        &mut NoExcitation,
        &ManualClock::new(),
        &runner(10),
        &AtomicBool::new(false),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AutotuneError>(),
        Some(AutotuneError::Actuator(_))
    ));
    assert_eq!(act.stops, 1);
}

#[rstest]
fn replay_files_every_finite_sample() {
    let mut t = arm(Some(VelocityRange::new(-4.0, 6.0)));
    let mut trace: Vec<MotorPose> = (0..40)
        .map(|i| {
            let x = f64::from(i) * 0.1;
            MotorPose::new(x.sin(), x.cos(), -x.sin(), 1.5)
        })
        .collect();
    trace.push(MotorPose::new(f64::NAN, 0.0, 0.0, 0.0));
    let report = replay(&mut t, trace);
    assert_eq!(report.final_state, TunerState::Calculating);
    assert_eq!(report.samples, 40);
    assert_eq!(report.rejected_samples, 1);
    assert_eq!(report.ticks, 41);
}
