/// Flexibility band calculation around the baseline schedule.
pub mod band;
pub mod engine;
/// Final schedule assembly and SoC trajectory recomputation.
pub mod implement;
pub mod kpi;
/// Constant-SoC window detection.
pub mod segment;
pub mod soc;
pub mod types;
