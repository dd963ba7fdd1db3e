//! CSV inputs in, schedule and report out.

mod common;

use std::fs;

use approx::assert_relative_eq;

use bess_arbitrage::error::ScheduleError;
use bess_arbitrage::io::export::{export_report_json, export_schedule_csv};
use bess_arbitrage::io::series::{InputPaths, load_horizon};
use bess_arbitrage::sim::engine::{Engine, PipelineConfig};

fn spread_inputs(dir: &std::path::Path) -> InputPaths {
    let prices = [10.0, 10.0, 10.0, 10.0, 90.5, 90.5, 90.5, 90.5];
    InputPaths {
        load: common::write_series(dir, "load.csv", &[2000.0; 8]),
        pv: common::write_series(dir, "pv.csv", &[0.0; 8]),
        baseline: common::write_series(dir, "baseline.csv", &[0.0; 8]),
        price: common::write_series(dir, "price.csv", &prices),
    }
}

#[test]
fn csv_inputs_drive_the_pipeline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let horizon = load_horizon(&spread_inputs(dir.path())).expect("inputs load");
    assert_eq!(horizon.len(), 8);
    assert_relative_eq!(horizon.intervals()[7].price_ct_per_kwh, 90.5);

    let outcome = Engine::new(common::default_battery(), PipelineConfig::default()).run(&horizon);
    assert_eq!(outcome.accepted.len(), 1);

    let schedule_path = dir.path().join("schedule.csv");
    export_schedule_csv(&horizon, &outcome, &schedule_path).expect("schedule export");
    let text = fs::read_to_string(&schedule_path).expect("read schedule");
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0], "index;timestamp;action_kw;soc_kwh");

    // actions in the export match the schedule to two decimals
    for (row, &action) in rows[1..].iter().zip(&outcome.schedule.actions_kw) {
        let exported: f64 = row
            .split(';')
            .nth(2)
            .expect("action column")
            .replace(',', ".")
            .parse()
            .expect("number");
        assert!((exported - action).abs() <= 0.005 + 1e-9);
    }

    let report_path = dir.path().join("report.json");
    export_report_json(&common::default_battery(), &outcome, &report_path).expect("report export");
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("read report"))
            .expect("valid json");
    assert_eq!(report["strategies"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["strategies"][0]["zeitraum_id"], 1);
    assert_eq!(
        report["strategies"][0]["strategie_details"]
            .as_array()
            .map(Vec::len),
        Some(8)
    );
    assert_relative_eq!(
        report["total_profit_euro"].as_f64().expect("profit"),
        outcome.total_profit_euro(),
        epsilon = 1e-9
    );
}

#[test]
fn misaligned_inputs_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut paths = spread_inputs(dir.path());
    paths.pv = common::write_series(dir.path(), "pv_short.csv", &[0.0; 7]);
    assert!(matches!(
        load_horizon(&paths),
        Err(ScheduleError::InputShape { series: "pv", .. })
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut paths = spread_inputs(dir.path());
    paths.price = dir.path().join("nope.csv");
    assert!(matches!(load_horizon(&paths), Err(ScheduleError::Io(_))));
}
