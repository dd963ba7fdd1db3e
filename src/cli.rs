//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Day-ahead arbitrage scheduler for battery storage.
#[derive(Debug, Parser)]
#[command(name = "bess-arbitrage", version)]
#[command(
    long_about = "Finds constant-SoC windows in an existing battery schedule and fills them \
    with price arbitrage strategies.\n\
    \nInputs come from the scenario's [inputs] CSV series, or from the seeded synthetic \
    generator when none are configured.\n\
    \nExamples:\n  \
    bess-arbitrage\n  \
    bess-arbitrage --preset volatile_prices --seed 7\n  \
    bess-arbitrage --scenario site.toml --schedule-out schedule.csv --report-out report.json"
)]
pub struct Cli {
    /// Load the scenario from a TOML file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (baseline, high_solar, volatile_prices)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Override the synthetic generator's seed
    #[arg(long, value_name = "U64")]
    pub seed: Option<u64>,

    /// Write the implemented schedule as CSV
    #[arg(long, value_name = "PATH")]
    pub schedule_out: Option<PathBuf>,

    /// Write accepted strategies, violations and corrections as JSON
    #[arg(long, value_name = "PATH")]
    pub report_out: Option<PathBuf>,

    /// Print the steps of every accepted strategy
    #[arg(long)]
    pub details: bool,

    /// Raise the default log level to debug
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Preset to use when no scenario file is given.
    pub fn preset_or_default(&self) -> &str {
        self.preset.as_deref().unwrap_or("baseline")
    }
}
