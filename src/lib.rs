//! Day-ahead arbitrage scheduling for battery energy storage.
//!
//! Takes an existing battery schedule, finds windows where it leaves the
//! state of charge flat, and fills them with price arbitrage strategies
//! without ever leaving the battery's SoC bounds.

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod profiles;
/// Band, segmentation, implementation and pipeline orchestration.
pub mod sim;
pub mod strategy;

pub use error::{Result, ScheduleError};
