//! Headless scenario runner.
//!
//! Drives a [`Simulation`] without any player: planning phases are advanced
//! automatically after a fixed number of ticks, enemy turns play out until
//! the wave is cleared, and the run stops after a tick budget or when the
//! headquarters falls.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use td_core::components::UnitKind;
use td_core::simulation::Simulation;
use td_core::waves::Phase;

use crate::scenario::{Scenario, ScenarioError};

/// Knobs for a single headless run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum ticks to simulate.
    pub max_ticks: u64,
    /// Ticks spent in each planning phase before it is advanced.
    pub plan_ticks: u64,
    /// Seed override; `None` keeps the scenario's seed.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: 6_000,
            plan_ticks: 20,
            seed: None,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The tick budget ran out with the headquarters standing.
    Survived,
    /// The headquarters was destroyed.
    HeadquartersDestroyed,
}

/// Summary printed at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Seed actually used.
    pub seed: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated time in milliseconds.
    pub elapsed_ms: u64,
    /// Completed turn cycles.
    pub turn: u32,
    /// Waves sent.
    pub waves: u32,
    /// Phase at the end of the run.
    pub phase: Phase,
    /// Enemies spawned.
    pub spawned: usize,
    /// Hits landed by either side.
    pub attacks: usize,
    /// Enemy deaths.
    pub enemy_deaths: usize,
    /// Structure deaths.
    pub structure_deaths: usize,
    /// Blockage events.
    pub blockages: usize,
    /// Enemies still alive at the end.
    pub live_enemies: usize,
    /// Remaining headquarters health, if one is still standing.
    pub headquarters_health: Option<u32>,
    /// Final state hash.
    pub state_hash: u64,
}

/// Run a scenario to completion.
pub fn run_scenario(scenario: &Scenario, config: &RunConfig) -> Result<RunSummary, ScenarioError> {
    let mut sim = scenario.build_simulation(config.seed)?;
    let seed = sim.config().seed;
    info!(scenario = %scenario.name, seed, max_ticks = config.max_ticks, "starting run");

    let mut summary = RunSummary {
        scenario: scenario.name.clone(),
        seed,
        outcome: RunOutcome::Survived,
        ticks: 0,
        elapsed_ms: 0,
        turn: 0,
        waves: 0,
        phase: sim.phase(),
        spawned: 0,
        attacks: 0,
        enemy_deaths: 0,
        structure_deaths: 0,
        blockages: 0,
        live_enemies: 0,
        headquarters_health: None,
        state_hash: 0,
    };

    let had_headquarters = headquarters_health(&sim).is_some();
    let mut ticks_in_phase = 0;

    while summary.ticks < config.max_ticks {
        if sim.phase() != Phase::EnemyTurn && ticks_in_phase >= config.plan_ticks {
            let change = sim.advance_phase()?;
            debug!(turn = change.turn, phase = ?change.phase, "auto-advanced phase");
            ticks_in_phase = 0;
        }

        let events = sim.tick()?;
        summary.ticks += 1;
        ticks_in_phase += 1;
        if !events.phase_changes.is_empty() {
            ticks_in_phase = 0;
        }

        summary.spawned += events.spawned.len();
        summary.attacks += events.attacks.len();
        summary.blockages += events.blockages.len();
        for death in &events.deaths {
            if death.kind.is_enemy() {
                summary.enemy_deaths += 1;
            } else {
                summary.structure_deaths += 1;
            }
        }

        if had_headquarters && headquarters_health(&sim).is_none() {
            summary.outcome = RunOutcome::HeadquartersDestroyed;
            info!(tick = sim.clock().tick(), "headquarters destroyed");
            break;
        }
    }

    summary.elapsed_ms = sim.clock().now().as_millis();
    summary.turn = sim.director().turn();
    summary.waves = sim.director().round();
    summary.phase = sim.phase();
    summary.live_enemies = sim.live_enemy_count();
    summary.headquarters_health = headquarters_health(&sim);
    summary.state_hash = sim.state_hash();

    info!(
        ticks = summary.ticks,
        waves = summary.waves,
        outcome = ?summary.outcome,
        "run finished"
    );
    Ok(summary)
}

/// Health of the first live headquarters, in id order.
fn headquarters_health(sim: &Simulation) -> Option<u32> {
    sim.entities()
        .sorted_ids()
        .into_iter()
        .filter_map(|id| sim.get_entity(id))
        .find(|e| e.kind == UnitKind::Headquarters && e.is_alive())
        .and_then(|e| e.health.map(|h| h.current))
}

/// Result of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Number of runs compared.
    pub runs: usize,
    /// Final state hash of every run, in run order.
    pub hashes: Vec<u64>,
    /// True when every run produced the same summary.
    pub deterministic: bool,
}

/// Verify determinism by running the same scenario and seed several times
/// in parallel.
pub fn verify_determinism(
    scenario: &Scenario,
    config: &RunConfig,
    runs: usize,
) -> Result<VerifyReport, ScenarioError> {
    let summaries: Vec<RunSummary> = (0..runs)
        .into_par_iter()
        .map(|_| run_scenario(scenario, config))
        .collect::<Result<_, _>>()?;

    let deterministic = summaries.windows(2).all(|pair| pair[0] == pair[1]);
    let hashes = summaries.iter().map(|s| s.state_hash).collect();
    Ok(VerifyReport {
        runs,
        hashes,
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_run() -> RunConfig {
        RunConfig {
            max_ticks: 400,
            plan_ticks: 5,
            seed: Some(42),
        }
    }

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.plan_ticks, 20);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_planning_phases_are_auto_advanced() {
        let mut scenario = Scenario::outpost();
        scenario.config.wave.cycles_per_wave = 1;
        let summary = run_scenario(&scenario, &short_run()).unwrap();

        assert_eq!(summary.seed, 42);
        assert!(summary.waves >= 1);
        assert!(summary.spawned >= 6);
        assert!(summary.attacks > 0);
    }

    #[test]
    fn test_run_without_waves_stays_quiet() {
        let scenario = Scenario::outpost();
        let config = RunConfig {
            max_ticks: 30,
            plan_ticks: 100,
            seed: None,
        };
        let summary = run_scenario(&scenario, &config).unwrap();

        assert_eq!(summary.ticks, 30);
        assert_eq!(summary.phase, Phase::BuildAndPlan);
        assert_eq!(summary.spawned, 0);
        assert_eq!(summary.outcome, RunOutcome::Survived);
        assert_eq!(summary.headquarters_health, Some(1_000));
    }

    #[test]
    fn test_verify_determinism() {
        let mut scenario = Scenario::outpost();
        scenario.config.wave.cycles_per_wave = 1;
        let report = verify_determinism(&scenario, &short_run(), 3).unwrap();

        assert_eq!(report.runs, 3);
        assert_eq!(report.hashes.len(), 3);
        assert!(report.deterministic);
    }
}
