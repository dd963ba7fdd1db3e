//! bess-arbitrage entry point: CLI wiring and config-driven pipeline construction.

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bess_arbitrage::cli::Cli;
use bess_arbitrage::config::ScenarioConfig;
use bess_arbitrage::io::export::{export_report_json, export_schedule_csv};
use bess_arbitrage::io::series::load_horizon;
use bess_arbitrage::profiles::synthetic_horizon;
use bess_arbitrage::sim::engine::Engine;
use bess_arbitrage::sim::kpi::ScheduleKpis;
use bess_arbitrage::sim::types::Horizon;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bess_arbitrage=debug"
    } else {
        "bess_arbitrage=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the scenario: `--scenario` takes priority, then `--preset`, then baseline.
fn load_scenario(cli: &Cli) -> anyhow::Result<ScenarioConfig> {
    let mut scenario = match &cli.scenario {
        Some(path) => ScenarioConfig::from_toml_file(path)?,
        None => ScenarioConfig::from_preset(cli.preset_or_default())?,
    };

    if let Some(seed) = cli.seed {
        scenario.synthetic.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("scenario has {} configuration error(s)", errors.len());
    }
    Ok(scenario)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let scenario = load_scenario(&cli)?;
    let battery = scenario.battery_params()?;
    let pipeline = scenario.pipeline_config()?;

    let horizon: Horizon = match scenario.inputs.paths() {
        Some(paths) => load_horizon(&paths).context("failed to load input series")?,
        None => synthetic_horizon(&scenario.synthetic, &battery)
            .context("failed to generate synthetic inputs")?,
    };
    info!(
        intervals = horizon.len(),
        capacity_kwh = battery.capacity_kwh,
        "horizon ready"
    );

    let outcome = Engine::new(battery, pipeline).run(&horizon);

    for strategy in &outcome.accepted {
        println!("{strategy}");
        if cli.details {
            for step in &strategy.steps {
                println!("      {step}");
            }
        }
    }

    let kpis = ScheduleKpis::from_outcome(&horizon, &battery, &outcome);
    println!("\n{kpis}");

    if let Some(path) = &cli.schedule_out {
        export_schedule_csv(&horizon, &outcome, path)
            .with_context(|| format!("failed to write schedule to {}", path.display()))?;
        eprintln!("Schedule written to {}", path.display());
    }
    if let Some(path) = &cli.report_out {
        export_report_json(&battery, &outcome, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}
