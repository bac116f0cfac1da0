//! Turn cycle and wave spawning through the simulation.

use td_core::components::{EnemyKind, UnitKind};
use td_core::config::{SimConfig, WaveConfig};
use td_core::error::GameError;
use td_core::grid::NavGrid;
use td_core::simulation::Simulation;
use td_core::waves::{wave_composition, Phase, PhaseChange, WaveMix};
use td_test_utils::fixtures::{grid_from_rows, open_grid};

fn one_cycle_config() -> SimConfig {
    SimConfig {
        wave: WaveConfig {
            cycles_per_wave: 1,
            ..WaveConfig::default()
        },
        ..SimConfig::default()
    }
}

fn spawn_grid() -> NavGrid {
    grid_from_rows(&[
        "S.......S",
        ".........",
        ".........",
        "S.......S",
    ])
}

fn start_enemy_turn(sim: &mut Simulation) {
    assert_eq!(sim.advance_phase().unwrap().phase, Phase::Collection);
    assert_eq!(sim.advance_phase().unwrap().phase, Phase::EnemyTurn);
}

fn wipe_out(sim: &mut Simulation, ids: &[u64]) {
    for &id in ids {
        if let Some(health) = sim.get_entity_mut(id).and_then(|e| e.health.as_mut()) {
            health.current = 0;
        }
    }
}

fn count(sim: &Simulation, ids: &[u64], kind: EnemyKind) -> usize {
    ids.iter()
        .filter(|&&id| sim.get_entity(id).is_some_and(|e| e.kind == UnitKind::Enemy(kind)))
        .count()
}

#[test]
fn test_first_wave_is_all_grunts_on_spawn_tiles() {
    let mut sim = Simulation::new(spawn_grid(), one_cycle_config()).unwrap();
    start_enemy_turn(&mut sim);

    let events = sim.tick().unwrap();
    assert_eq!(events.spawned.len(), 6);
    assert_eq!(count(&sim, &events.spawned, EnemyKind::Grunt), 6);
    for &id in &events.spawned {
        let position = sim.get_entity(id).unwrap().position.unwrap().value;
        let tile = sim.grid().world_to_tile(position).unwrap();
        assert!(sim.grid().is_spawn_point(tile), "{tile:?} is not a spawn tile");
    }
    assert!(sim.director().pending().is_empty());
}

#[test]
fn test_enemy_turn_cannot_be_skipped() {
    let mut sim = Simulation::new(spawn_grid(), one_cycle_config()).unwrap();
    start_enemy_turn(&mut sim);
    assert_eq!(
        sim.advance_phase(),
        Err(GameError::InvalidPhaseTransition(Phase::EnemyTurn))
    );

    let spawned = sim.tick().unwrap().spawned;
    assert_eq!(sim.phase(), Phase::EnemyTurn);
    assert_eq!(sim.live_enemy_count(), spawned.len());

    wipe_out(&mut sim, &spawned);
    let events = sim.tick().unwrap();
    assert_eq!(events.deaths.len(), spawned.len());
    assert_eq!(
        events.phase_changes,
        vec![PhaseChange {
            turn: 1,
            phase: Phase::BuildAndPlan
        }]
    );
    assert_eq!(sim.phase(), Phase::BuildAndPlan);
}

#[test]
fn test_enemy_turn_only_every_nth_cycle() {
    let mut sim = Simulation::new(spawn_grid(), SimConfig::default()).unwrap();
    let mut phases = Vec::new();
    for _ in 0..10 {
        phases.push(sim.advance_phase().unwrap());
    }
    let enemy_turns: Vec<_> = phases.iter().filter(|c| c.phase == Phase::EnemyTurn).collect();
    assert_eq!(enemy_turns, vec![&PhaseChange { turn: 5, phase: Phase::EnemyTurn }]);
    // The fifth completed cycle is the tenth advance.
    assert_eq!(phases.last().unwrap().phase, Phase::EnemyTurn);
    assert!(sim.advance_phase().is_err());
}

#[test]
fn test_round_thirteen_mix() {
    assert_eq!(
        wave_composition(13, &WaveConfig::default()),
        WaveMix {
            weak: 10,
            medium: 3,
            strong: 3
        }
    );

    let mut sim = Simulation::new(spawn_grid(), one_cycle_config()).unwrap();
    let mut last_wave = Vec::new();
    for _ in 0..13 {
        start_enemy_turn(&mut sim);
        last_wave = sim.tick().unwrap().spawned;
        wipe_out(&mut sim, &last_wave);
        let events = sim.tick().unwrap();
        assert_eq!(events.phase_changes.len(), 1);
    }

    assert_eq!(sim.director().round(), 13);
    assert_eq!(last_wave.len(), 16);
    assert_eq!(count(&sim, &last_wave, EnemyKind::Grunt), 10);
    assert_eq!(count(&sim, &last_wave, EnemyKind::Raider), 3);
    assert_eq!(count(&sim, &last_wave, EnemyKind::Brute), 3);
}

#[test]
fn test_missing_spawn_tiles_is_fatal_when_a_wave_is_due() {
    let mut sim = Simulation::new(open_grid(6, 6), one_cycle_config()).unwrap();
    // Nothing to spawn yet.
    sim.tick().unwrap();

    start_enemy_turn(&mut sim);
    assert_eq!(sim.tick(), Err(GameError::NoSpawnTiles));
}
