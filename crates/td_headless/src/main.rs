//! Headless tower-defense runner.
//!
//! Runs scenarios without graphics or a player and prints a JSON summary on
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in scenario
//! cargo run -p td_headless -- run
//!
//! # Run a scenario file for 10 000 ticks with 40-tick planning phases
//! cargo run -p td_headless -- run --scenario maze.ron --ticks 10000 --plan-ticks 40
//!
//! # Verify determinism
//! cargo run -p td_headless -- verify --scenario maze.ron --seed 12345 --runs 8
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use td_headless::runner::{run_scenario, verify_determinism, RunConfig};
use td_headless::scenario::{load_config, Scenario, ScenarioError};

#[derive(Parser)]
#[command(name = "td_headless")]
#[command(about = "Headless tower-defense runner for CI and balance checks")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario and print its summary
    Run {
        #[command(flatten)]
        setup: Setup,

        /// Pretty-print the JSON summary
        #[arg(long)]
        pretty: bool,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        #[command(flatten)]
        setup: Setup,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: usize,
    },
}

#[derive(Args)]
struct Setup {
    /// Scenario file to load (built-in outpost when omitted)
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Simulation config file replacing the scenario's config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum ticks to simulate
    #[arg(short, long, default_value = "6000")]
    ticks: u64,

    /// Ticks spent in each planning phase before it is advanced
    #[arg(long, default_value = "20")]
    plan_ticks: u64,

    /// Seed override
    #[arg(long)]
    seed: Option<u64>,
}

impl Setup {
    fn load(&self) -> Result<(Scenario, RunConfig), ScenarioError> {
        let mut scenario = match &self.scenario {
            Some(path) => Scenario::load(path)?,
            None => Scenario::outpost(),
        };
        if let Some(path) = &self.config {
            scenario.config = load_config(path)?;
        }
        let run = RunConfig {
            max_ticks: self.ticks,
            plan_ticks: self.plan_ticks,
            seed: self.seed,
        };
        Ok((scenario, run))
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout carries the JSON summary
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run { setup, pretty } => cmd_run(&setup, pretty),
        Commands::Verify { setup, runs } => cmd_verify(&setup, runs),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "run failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

/// Run a single scenario
fn cmd_run(setup: &Setup, pretty: bool) -> Result<(), ScenarioError> {
    let (scenario, run) = setup.load()?;
    let summary = run_scenario(&scenario, &run)?;

    let json = if pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    }
    .map_err(std::io::Error::other)?;
    println!("{json}");
    Ok(())
}

/// Verify determinism across parallel runs
fn cmd_verify(setup: &Setup, runs: usize) -> Result<(), ScenarioError> {
    let (scenario, run) = setup.load()?;
    tracing::info!(
        "Verifying determinism: {} with seed {:?} ({} runs)",
        scenario.name,
        run.seed,
        runs
    );

    let report = verify_determinism(&scenario, &run, runs)?;
    let json = serde_json::to_string(&report).map_err(std::io::Error::other)?;
    println!("{json}");

    if report.deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
    Ok(())
}
