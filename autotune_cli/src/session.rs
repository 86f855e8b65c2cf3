//! Session assembly: config mapping, simulated plant, replay, and report output.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use autotune_core::conversions::sim_params;
use autotune_core::{
    CellSummary, ExcitationCfg, MotorAutotuner, MotorPose, RunnerCfg, SessionReport,
    SineExcitation, replay, run_session,
};
use autotune_hardware::SimulatedMechanism;
use autotune_traits::MonotonicClock;
use autotune_traits::clock::manual::ManualClock;
use serde_json::json;

/// Test hook: make the simulated encoder time out after this many reads.
const SIM_DROPOUT_ENV: &str = "AUTOTUNE_TEST_SIM_DROPOUT";

fn sim_dropout() -> Option<u64> {
    std::env::var(SIM_DROPOUT_ENV)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

pub fn run_simulate(
    cfg: &autotune_config::Config,
    ticks: Option<u64>,
    realtime: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<(SessionReport, MotorAutotuner)> {
    let mut tuner = MotorAutotuner::try_from(cfg)?;
    let mut runner = RunnerCfg::from(&cfg.runner);
    if let Some(n) = ticks {
        runner.max_ticks = n;
    }

    let mut sim = SimulatedMechanism::new(sim_params(cfg)).map_err(eyre::Report::new)?;
    if let Some(n) = sim_dropout() {
        tracing::warn!(reads = n, "simulated encoder dropout armed");
        sim = sim.with_dropout_after(n);
    }
    let (mut encoder, mut motor) = sim.split();
    let mut excitation = SineExcitation::from(ExcitationCfg::from(&cfg.excitation));

    let report = if realtime {
        run_session(
            &mut tuner,
            &mut encoder,
            &mut motor,
            &mut excitation,
            &MonotonicClock::new(),
            &runner,
            shutdown,
        )?
    } else {
        run_session(
            &mut tuner,
            &mut encoder,
            &mut motor,
            &mut excitation,
            &ManualClock::new(),
            &runner,
            shutdown,
        )?
    };
    Ok((report, tuner))
}

pub fn run_replay(
    cfg: &autotune_config::Config,
    trace: &Path,
) -> eyre::Result<(SessionReport, MotorAutotuner)> {
    let rows = autotune_config::load_trace_csv(trace)?;
    tracing::info!(rows = rows.len(), path = %trace.display(), "trace loaded");
    let mut tuner = MotorAutotuner::try_from(cfg)?;
    let samples = rows
        .iter()
        .map(|r| MotorPose::new(r.position, r.velocity, r.acceleration, r.volts));
    let report = replay(&mut tuner, samples);
    Ok((report, tuner))
}

/// Build everything a session needs without moving anything.
pub fn self_check(cfg: &autotune_config::Config, json_mode: bool) -> eyre::Result<()> {
    let tuner = MotorAutotuner::try_from(cfg)?;
    SimulatedMechanism::new(sim_params(cfg)).map_err(eyre::Report::new)?;
    let b = tuner.bounds();
    if json_mode {
        println!(
            "{}",
            json!({
                "status": "ok",
                "name": tuner.mechanism().name,
                "center": b.center,
                "test_min": b.test_min,
                "test_max": b.test_max,
                "position_cell": tuner.grid_sizes().position,
                "velocity_cell": tuner.grid_sizes().velocity,
            })
        );
    } else {
        println!(
            "self-check ok: mechanism '{}' center {:.3} soft bounds [{:.3}, {:.3}]",
            tuner.mechanism().name,
            b.center,
            b.test_min,
            b.test_max
        );
    }
    Ok(())
}

pub fn report_json(r: &SessionReport) -> serde_json::Value {
    json!({
        "name": r.name,
        "state": r.final_state.name(),
        "ticks": r.ticks,
        "cells": r.cells,
        "samples": r.samples,
        "rejected_samples": r.rejected_samples,
        "recenter_events": r.recenter_events,
        "velocity_min": r.velocity_range.map(|v| v.min),
        "velocity_max": r.velocity_range.map(|v| v.max),
        "velocity_range_degenerate": r.velocity_range_degenerate,
        "sweep_hit_cap": r.sweep_hit_cap,
        "interrupted": r.interrupted,
    })
}

pub fn print_report(r: &SessionReport, json_mode: bool) {
    if json_mode {
        println!("{}", report_json(r));
        return;
    }
    println!("mechanism: {}", r.name);
    println!("state: {}", r.final_state);
    println!("ticks: {}", r.ticks);
    println!(
        "samples: {} in {} cells (rejected {})",
        r.samples, r.cells, r.rejected_samples
    );
    match r.velocity_range {
        Some(v) => println!(
            "velocity range: [{:.3}, {:.3}]{}",
            v.min,
            v.max,
            if r.velocity_range_degenerate {
                " (degenerate)"
            } else {
                ""
            }
        ),
        None => println!("velocity range: unknown (sweep incomplete)"),
    }
    println!("recenter events: {}", r.recenter_events);
    if r.sweep_hit_cap {
        println!("note: velocity sweep ended on its tick cap");
    }
    if r.interrupted {
        println!("note: session interrupted");
    }
}

pub fn cell_json(c: &CellSummary) -> serde_json::Value {
    json!({
        "position_bin": c.coordinate.position,
        "velocity_bin": c.coordinate.velocity,
        "count": c.count,
        "mean_position": c.mean_position,
        "mean_velocity": c.mean_velocity,
        "mean_acceleration": c.mean_acceleration,
        "mean_volts": c.mean_volts,
    })
}

/// One JSON line per cell, sorted by coordinate.
pub fn print_grid(tuner: &MotorAutotuner) {
    for c in tuner.grid().summaries() {
        println!("{}", cell_json(&c));
    }
}
