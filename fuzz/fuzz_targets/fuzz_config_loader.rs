#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation must reject bad input with an error, never a panic.
    if let Ok(cfg) = autotune_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // Anything that validates must also build a tuner.
            let _ = autotune_core::MotorAutotuner::try_from(&cfg);
        }
    }
});
