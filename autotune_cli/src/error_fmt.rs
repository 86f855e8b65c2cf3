//! Human-readable error descriptions, exit codes and structured JSON error formatting.

use autotune_core::error::{AutotuneError, BuildError};
use autotune_hardware::error::HwError;

/// Exit code for a session stopped by Ctrl-C (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMechanism => {
                "What happened: No mechanism was provided to the autotuner.\nLikely causes: The builder was used without with_mechanism(...).\nHow to fix: Add a [mechanism] section with name and max_volts to the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `autotune self-check`."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<AutotuneError>() {
        return match ae {
            AutotuneError::Timeout => "What happened: Pose read timed out.\nLikely causes: Encoder disconnected, estimator stalled, or runner.pose_timeout_ms too low for the sample rate.\nHow to fix: Check the encoder, then consider raising runner.pose_timeout_ms.".to_string(),
            AutotuneError::PoseSource(msg) => format!(
                "What happened: The pose source failed ({msg}).\nLikely causes: Encoder fault or estimator error.\nHow to fix: Inspect the sensor chain; re-run with --log-level=debug for detail."
            ),
            AutotuneError::Actuator(msg) => format!(
                "What happened: The actuator rejected a command ({msg}).\nLikely causes: Motor driver fault or a non-finite voltage command.\nHow to fix: Check the driver and mechanism.max_volts, then start a new session."
            ),
            AutotuneError::InvalidDensity(_)
            | AutotuneError::InvalidInsetFraction(_)
            | AutotuneError::NonFinite(_)
            | AutotuneError::InvalidVelocityRange { .. } => format!(
                "What happened: {ae}.\nLikely causes: Out-of-range value in [grid], [bounds] or [sweep].\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(he) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Simulated mechanism error ({he}).\nLikely causes: Invalid [simulation] parameters.\nHow to fix: Use positive kv/ka, non-negative ks, and finite values."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    let detail = err
        .chain()
        .nth(1)
        .map(|c| format!(" Cause: {c}"))
        .unwrap_or_default();

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete.{detail}\nLikely causes: Missing [mechanism] section or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("trace csv must have headers") {
        return "Invalid headers in trace CSV. Expected 'position,velocity,acceleration,volts'."
            .to_string();
    }

    if lower.starts_with("read config") {
        return format!(
            "What happened: Could not read the config file.{detail}\nHow to fix: Pass an existing file with --config <FILE>."
        );
    }

    // Generic fallback
    format!(
        "Something went wrong.{detail}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 timeout, 4 I/O fault, 5 bad parameters, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 5;
    }
    if let Some(ae) = err.downcast_ref::<AutotuneError>() {
        return match ae {
            AutotuneError::Timeout => 3,
            AutotuneError::PoseSource(_) | AutotuneError::Actuator(_) => 4,
            _ => 5,
        };
    }
    match err.downcast_ref::<HwError>() {
        Some(HwError::Timeout) => 3,
        Some(_) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<AutotuneError>() {
        Some(AutotuneError::Timeout) => "Timeout",
        Some(AutotuneError::PoseSource(_)) => "PoseSource",
        Some(AutotuneError::Actuator(_)) => "Actuator",
        Some(_) => "InvalidValue",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
