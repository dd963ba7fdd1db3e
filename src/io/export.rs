//! Schedule CSV and strategy report JSON export.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::sim::band::BaselineCorrection;
use crate::sim::engine::{RunOutcome, RunStats};
use crate::sim::implement::Violation;
use crate::sim::types::{BatteryParams, Horizon};
use crate::strategy::{CycleBudget, StrategyCandidate};

/// Column header of the schedule export.
const HEADER: [&str; 4] = ["index", "timestamp", "action_kw", "soc_kwh"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats with two decimals and a decimal comma.
fn decimal_comma(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}

/// Exports the implemented schedule to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_schedule_csv(horizon: &Horizon, outcome: &RunOutcome, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_schedule_csv(horizon, outcome, io::BufWriter::new(file))
}

/// Writes the implemented schedule as semicolon-delimited CSV.
///
/// One row per interval; `soc_kwh` is the SoC after the interval's action.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_schedule_csv(
    horizon: &Horizon,
    outcome: &RunOutcome,
    writer: impl Write,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(writer);

    wtr.write_record(HEADER)?;

    let schedule = &outcome.schedule;
    for (iv, &action) in horizon.intervals().iter().zip(&schedule.actions_kw) {
        wtr.write_record(&[
            iv.index.to_string(),
            iv.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            decimal_comma(action),
            decimal_comma(schedule.soc_after(iv.index)),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// JSON envelope for one run.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub battery: &'a BatteryParams,
    pub stats: &'a RunStats,
    pub budget: &'a CycleBudget,
    pub total_profit_euro: f64,
    pub strategies: &'a [StrategyCandidate],
    pub violations: &'a [Violation],
    pub band_corrections: &'a [BaselineCorrection],
    pub schedule_corrections: &'a [BaselineCorrection],
}

impl<'a> Report<'a> {
    pub fn new(battery: &'a BatteryParams, outcome: &'a RunOutcome) -> Self {
        Self {
            battery,
            stats: &outcome.stats,
            budget: &outcome.budget,
            total_profit_euro: outcome.total_profit_euro(),
            strategies: &outcome.accepted,
            violations: &outcome.schedule.violations,
            band_corrections: &outcome.band_corrections,
            schedule_corrections: &outcome.schedule_corrections,
        }
    }
}

/// Exports the run report as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if file creation, serialization or writing fails.
pub fn export_report_json(
    battery: &BatteryParams,
    outcome: &RunOutcome,
    path: &Path,
) -> Result<()> {
    let file = File::create(path)?;
    write_report_json(battery, outcome, io::BufWriter::new(file))
}

/// Writes the run report as pretty-printed JSON to any writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_report_json(
    battery: &BatteryParams,
    outcome: &RunOutcome,
    mut writer: impl Write,
) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, &Report::new(battery, outcome))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
