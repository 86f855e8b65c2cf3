#![no_main]
use autotune_core::{BoundsCfg, MechanismCfg, MotorAutotuner, MotorPose};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|samples: Vec<(f64, f64, f64, f64)>| {
    let Ok(mut t) = MotorAutotuner::builder()
        .with_mechanism(MechanismCfg::new("fuzz", false, 12.0))
        .with_bounds(BoundsCfg {
            min: -10.0,
            max: 10.0,
            test_inset_fraction: 12.0,
        })
        .build()
    else {
        return;
    };
    t.start();
    for (p, v, a, u) in samples {
        t.set_current_pose_full(MotorPose::new(p, v, a, u));
        let volts = t.get_voltage();
        assert!(volts.abs() <= 12.0, "output {volts} exceeds max_volts");
    }
    t.finish();
});
