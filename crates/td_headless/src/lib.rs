//! Headless scenario runner for CI and balance checks.
//!
//! Loads a RON [`Scenario`] (ASCII map, structures, simulation config),
//! drives the simulation without a player and reports a JSON summary.
//!
//! - **Balance runs**: how far do the defences hold against escalating waves
//! - **CI verification**: the same scenario and seed must always produce the
//!   same final state
//!
//! # Example
//!
//! ```bash
//! # Run the built-in outpost scenario
//! cargo run -p td_headless -- run --ticks 2000
//!
//! # Run a scenario file with a tuning override
//! cargo run -p td_headless -- run --scenario maze.ron --config hard.ron
//!
//! # Verify determinism
//! cargo run -p td_headless -- verify --scenario maze.ron --runs 8
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, verify_determinism, RunConfig, RunOutcome, RunSummary, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
