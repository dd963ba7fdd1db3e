//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use bess_arbitrage::config::ScenarioConfig;
use bess_arbitrage::profiles::synthetic_horizon;
use bess_arbitrage::sim::engine::{Engine, PipelineConfig, RunOutcome};
use bess_arbitrage::sim::types::{BatteryParams, Horizon};

/// Default battery (1000 kWh, 1000 kW, one cycle per day).
pub fn default_battery() -> BatteryParams {
    BatteryParams::new(1000.0, 1000.0, 1.0).expect("valid battery")
}

/// Midnight of 2025-01-01.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date")
}

/// Horizon with constant load, no PV and an idle baseline.
pub fn idle_horizon(prices: &[f64]) -> Horizon {
    let n = prices.len();
    Horizon::from_columns(start(), &vec![2000.0; n], &vec![0.0; n], &vec![0.0; n], prices)
        .expect("valid horizon")
}

/// Eight flat intervals priced `[10, 10, 10, 10, 90, 90, 90, 90]`.
pub fn spread_horizon() -> Horizon {
    idle_horizon(&[10.0, 10.0, 10.0, 10.0, 90.0, 90.0, 90.0, 90.0])
}

/// Battery, synthetic horizon and pipeline settings of a built-in preset.
pub fn preset(name: &str) -> (BatteryParams, Horizon, PipelineConfig) {
    let cfg = ScenarioConfig::from_preset(name).expect("known preset");
    let battery = cfg.battery_params().expect("valid battery");
    let horizon = synthetic_horizon(&cfg.synthetic, &battery).expect("synthetic horizon");
    let pipeline = cfg.pipeline_config().expect("valid pipeline");
    (battery, horizon, pipeline)
}

/// Runs a preset end to end.
pub fn run_preset(name: &str) -> (BatteryParams, Horizon, RunOutcome) {
    let (battery, horizon, pipeline) = preset(name);
    let outcome = Engine::new(battery, pipeline).run(&horizon);
    (battery, horizon, outcome)
}

/// Writes `index;timestamp;value` rows with a decimal comma.
pub fn write_series(dir: &Path, name: &str, values: &[f64]) -> PathBuf {
    let mut text = String::from("index;timestamp;value\n");
    for (i, v) in values.iter().enumerate() {
        let ts = start() + TimeDelta::minutes(15 * i as i64);
        text.push_str(&format!(
            "{i};{};{}\n",
            ts.format("%Y-%m-%d %H:%M:%S"),
            format!("{v}").replace('.', ",")
        ));
    }
    let path = dir.join(name);
    fs::write(&path, text).expect("write series");
    path
}
