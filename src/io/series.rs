//! Reader for `index;timestamp;value` input series.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::error::{Result, ScheduleError};
use crate::sim::types::{Horizon, Interval};

/// Timestamp layouts accepted in the second column.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];

/// One row of an input series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Locations of the four series that make up a horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub load: PathBuf,
    pub pv: PathBuf,
    pub baseline: PathBuf,
    pub price: PathBuf,
}

/// Reads one series file.
///
/// # Errors
///
/// Returns [`ScheduleError::Io`] if the file cannot be opened and
/// [`ScheduleError::Parse`] for malformed rows.
pub fn read_series(path: &Path) -> Result<Vec<SeriesPoint>> {
    let file = File::open(path)?;
    parse_series(file, path)
}

/// Parses a semicolon-delimited series with a header row.
///
/// Values may use a decimal comma. `path` is only used in error messages.
///
/// # Errors
///
/// Returns [`ScheduleError::Parse`] naming the 1-based line of the first
/// malformed row, or [`ScheduleError::Csv`] if the reader itself fails.
pub fn parse_series(reader: impl Read, path: &Path) -> Result<Vec<SeriesPoint>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut points = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let parse_err = |message: String| ScheduleError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };

        if record.len() < 3 {
            return Err(parse_err(format!(
                "expected 3 columns, found {}",
                record.len()
            )));
        }

        let index = record[0]
            .parse::<usize>()
            .map_err(|e| parse_err(format!("index \"{}\": {e}", &record[0])))?;
        let timestamp = parse_timestamp(&record[1])
            .ok_or_else(|| parse_err(format!("unrecognised timestamp \"{}\"", &record[1])))?;
        let value = parse_decimal(&record[2])
            .ok_or_else(|| parse_err(format!("value \"{}\" is not a number", &record[2])))?;

        points.push(SeriesPoint {
            index,
            timestamp,
            value,
        });
    }
    Ok(points)
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Accepts `12.5`, `12,5` and `1.234,5`.
fn parse_decimal(s: &str) -> Option<f64> {
    if s.contains(',') {
        s.replace('.', "").replace(',', ".").parse().ok()
    } else {
        s.parse().ok()
    }
}

impl Horizon {
    /// Joins four parsed series into a horizon.
    ///
    /// Rows are matched by position; the load series is the reference for
    /// index and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InputShape`] for differing lengths,
    /// [`ScheduleError::Misaligned`] when a row's index or timestamp disagrees
    /// with the load row, plus everything [`Horizon::new`] rejects.
    pub fn from_series(
        load: &[SeriesPoint],
        pv: &[SeriesPoint],
        baseline: &[SeriesPoint],
        price: &[SeriesPoint],
    ) -> Result<Self> {
        let expected = load.len();
        let others = [("pv", pv), ("baseline", baseline), ("price", price)];
        for (series, points) in others {
            if points.len() != expected {
                return Err(ScheduleError::InputShape {
                    series,
                    expected,
                    actual: points.len(),
                });
            }
            if let Some(row) = load
                .iter()
                .zip(points)
                .position(|(l, p)| l.index != p.index || l.timestamp != p.timestamp)
            {
                return Err(ScheduleError::Misaligned { series, index: row });
            }
        }

        let intervals = load
            .iter()
            .enumerate()
            .map(|(i, l)| Interval {
                index: i,
                timestamp: l.timestamp,
                load_kw: l.value,
                pv_kw: pv[i].value,
                baseline_action_kw: baseline[i].value,
                price_ct_per_kwh: price[i].value,
            })
            .collect();
        Self::new(intervals)
    }
}

/// Reads all four series and joins them.
///
/// # Errors
///
/// Propagates read, parse and alignment errors.
#[instrument(skip_all, fields(load = %paths.load.display()))]
pub fn load_horizon(paths: &InputPaths) -> Result<Horizon> {
    let load = read_series(&paths.load)?;
    let pv = read_series(&paths.pv)?;
    let baseline = read_series(&paths.baseline)?;
    let price = read_series(&paths.price)?;
    let horizon = Horizon::from_series(&load, &pv, &baseline, &price)?;
    debug!(intervals = horizon.len(), "input series loaded");
    Ok(horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<SeriesPoint>> {
        parse_series(text.as_bytes(), Path::new("test.csv"))
    }

    #[test]
    fn parses_decimal_comma_and_formats() {
        let text = "index;timestamp;value\n\
                    0;2025-01-01 00:00:00;12,5\n\
                    1;2025-01-01T00:15:00;-3.25\n\
                    2;2025-01-01 00:30;1.234,5\n\
                    3;01.01.2025 00:45;7\n";
        let points = parse(text).expect("valid series");
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].value, 12.5);
        assert_eq!(points[1].value, -3.25);
        assert_eq!(points[2].value, 1234.5);
        assert_eq!(points[3].value, 7.0);
        assert_eq!(
            points[3].timestamp - points[0].timestamp,
            chrono::TimeDelta::minutes(45)
        );
    }

    #[test]
    fn reports_line_of_bad_value() {
        let text = "index;timestamp;value\n\
                    0;2025-01-01 00:00:00;1\n\
                    1;2025-01-01 00:15:00;abc\n";
        match parse(text) {
            Err(ScheduleError::Parse { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("abc"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_timestamp() {
        let text = "index;timestamp;value\n0;yesterday;1\n";
        assert!(matches!(parse(text), Err(ScheduleError::Parse { .. })));
    }

    fn series(values: &[f64]) -> Vec<SeriesPoint> {
        let start = parse_timestamp("2025-01-01 00:00:00").expect("timestamp");
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| SeriesPoint {
                index: i,
                timestamp: start + chrono::TimeDelta::minutes(15 * i as i64),
                value,
            })
            .collect()
    }

    #[test]
    fn joins_aligned_series() {
        let h = Horizon::from_series(
            &series(&[100.0, 200.0]),
            &series(&[0.0, 50.0]),
            &series(&[10.0, -10.0]),
            &series(&[8.0, 9.0]),
        )
        .expect("aligned");
        assert_eq!(h.len(), 2);
        assert_eq!(h.intervals()[1].pv_kw, 50.0);
        assert_eq!(h.intervals()[1].baseline_action_kw, -10.0);
    }

    #[test]
    fn detects_length_and_alignment_errors() {
        let load = series(&[1.0, 2.0, 3.0]);
        let short = series(&[1.0, 2.0]);
        assert!(matches!(
            Horizon::from_series(&load, &short, &load, &load),
            Err(ScheduleError::InputShape { series: "pv", .. })
        ));

        let mut shifted = series(&[1.0, 2.0, 3.0]);
        shifted[2].timestamp += chrono::TimeDelta::minutes(5);
        assert!(matches!(
            Horizon::from_series(&load, &load, &load, &shifted),
            Err(ScheduleError::Misaligned {
                series: "price",
                index: 2
            })
        ));
    }
}
