use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[mechanism]
name = "arm"
max_volts = 6.0

[bounds]
min = -10.0
max = 10.0
test_inset_fraction = 10.0

[sweep]
known_velocity_range = [-5.0, 5.0]
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn stdout_lines(out: &std::process::Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON: {l}: {e}")))
        .collect()
}

/// The summary line carries every report key with the expected type.
#[rstest]
fn json_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("autotune").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--config")
        .arg(&cfg)
        .arg("simulate")
        .arg("--ticks")
        .arg("250");
    let out = cmd.output().unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let lines = stdout_lines(&out);
    assert_eq!(lines.len(), 1);
    let v = &lines[0];
    assert_eq!(v["name"], "arm");
    assert_eq!(v["state"], "CALCULATING");
    assert_eq!(v["ticks"], 250);
    assert_eq!(v["velocity_min"], -5.0);
    assert_eq!(v["velocity_max"], 5.0);
    assert_eq!(v["interrupted"], false);
    for key in ["cells", "samples", "rejected_samples", "recenter_events"] {
        assert!(v[key].is_u64(), "{key} should be an integer: {v}");
    }
    for key in ["velocity_range_degenerate", "sweep_hit_cap"] {
        assert!(v[key].is_boolean(), "{key} should be a bool: {v}");
    }
}

/// `--dump-grid` emits one line per cell after the summary; counts add up.
#[rstest]
fn grid_dump_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("autotune").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("simulate")
        .arg("--ticks")
        .arg("250")
        .arg("--dump-grid");
    let out = cmd.output().unwrap();
    assert!(out.status.success());

    let lines = stdout_lines(&out);
    let (summary, cells) = lines.split_first().unwrap();
    assert_eq!(summary["cells"].as_u64().unwrap() as usize, cells.len());

    let mut total = 0;
    for c in cells {
        assert!(c["position_bin"].is_i64());
        assert!(c["velocity_bin"].is_i64());
        for key in ["mean_position", "mean_velocity", "mean_acceleration", "mean_volts"] {
            assert!(c[key].is_f64(), "{key} missing: {c}");
        }
        total += c["count"].as_u64().unwrap();
    }
    assert_eq!(summary["samples"].as_u64().unwrap(), total);
}

/// Errors in JSON mode are a single object on stderr.
#[rstest]
fn json_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("autotune").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("AUTOTUNE_TEST_SIM_DROPOUT", "3")
        .arg("--json")
        .arg("--log-level")
        .arg("off")
        .arg("--config")
        .arg(&cfg)
        .arg("simulate");
    let out = cmd.output().unwrap();
    assert_eq!(out.status.code(), Some(3));

    let stderr = String::from_utf8_lossy(&out.stderr);
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Timeout");
    assert!(v["message"].is_string());
}
