//! File formats: CSV input series and schedule/report exports.

pub mod export;
pub mod series;
