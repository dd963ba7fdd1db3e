//! Error taxonomy for input handling and pipeline setup.
//!
//! Only fatal conditions live here. Recoverable conditions (illegal baseline
//! SoC, infeasible candidates, the cycle limit, residual violations) are
//! reported as data on the run outcome instead.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised before or instead of a computation.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Two input series disagree in length.
    #[error("series `{series}` has {actual} intervals, expected {expected}")]
    InputShape {
        series: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("horizon contains no intervals")]
    EmptyHorizon,

    /// A battery parameter is zero, negative or not finite.
    #[error("battery parameter `{field}` must be > 0, got {value}")]
    InvalidBattery { field: &'static str, value: f64 },

    #[error("series `{series}` has a non-finite value at interval {index}")]
    NonFinite { series: &'static str, index: usize },

    /// Index or timestamp of a series row disagrees with the load series.
    #[error("series `{series}` is misaligned with the load series at row {index}")]
    Misaligned { series: &'static str, index: usize },

    #[error("cannot parse {}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;
