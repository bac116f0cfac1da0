//! Turn phases and enemy wave generation.
//!
//! The turn cycle is `BuildAndPlan -> Collection -> BuildAndPlan`; every
//! `cycles_per_wave`-th completed cycle detours through `EnemyTurn`, which
//! queues a wave and ends once the wave has been spawned and wiped out.
//!
//! Wave size follows an exponential-plus-sine curve and the enemy mix comes
//! from a small lookup table keyed by round. Spawn tiles are drawn with a
//! seeded [`ChaCha8Rng`], so identical seeds produce identical waves.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::EnemyKind;
use crate::config::WaveConfig;
use crate::error::{GameError, Result};
use crate::grid::{NavGrid, TileCoord};
use crate::math::portable;

/// Stage of the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// The player places structures.
    BuildAndPlan,
    /// Resources are gathered.
    Collection,
    /// A wave attacks. Ends on its own.
    EnemyTurn,
}

/// Notification emitted on every phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    /// Completed build/collect cycles at the time of the change.
    pub turn: u32,
    /// The phase just entered.
    pub phase: Phase,
}

/// Enemy counts of one wave, by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveMix {
    /// Grunts.
    pub weak: u32,
    /// Raiders.
    pub medium: u32,
    /// Brutes.
    pub strong: u32,
}

impl WaveMix {
    /// Units in the wave.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.weak + self.medium + self.strong
    }

    /// Expand into a spawn order, weakest first.
    #[must_use]
    pub fn to_spawn_order(self) -> Vec<EnemyKind> {
        let mut order = Vec::with_capacity(self.total() as usize);
        order.extend(std::iter::repeat(EnemyKind::Grunt).take(self.weak as usize));
        order.extend(std::iter::repeat(EnemyKind::Raider).take(self.medium as usize));
        order.extend(std::iter::repeat(EnemyKind::Brute).take(self.strong as usize));
        order
    }
}

/// `(last round of the band, medium %, strong %)`. Weak takes the rest.
const MIX_BANDS: [(u32, u32, u32); 3] = [(5, 0, 0), (8, 10, 0), (12, 15, 15)];

/// Split for every round past the last band.
const LATE_MIX: (u32, u32) = (20, 20);

/// Number of enemies in round `round` (1-based).
///
/// `floor(stretch * base^(round * flat_out) + amplitude * sin(round + phase_offset) + starting_amount)`,
/// never less than one. Evaluated with [`portable`] so every platform sees
/// the same wave.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn wave_size(round: u32, config: &WaveConfig) -> u32 {
    let r = f64::from(round);
    let value = config.stretch * portable::powf(config.base, r * config.flat_out)
        + config.amplitude * portable::sin(r + config.phase_offset)
        + config.starting_amount;
    value.floor().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Split `total` into weak/medium/strong for `round`.
///
/// Medium and strong counts are floored percentages; weak gets the
/// remainder, so the parts always sum to `total`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn wave_mix(round: u32, total: u32) -> WaveMix {
    let (medium_pct, strong_pct) = MIX_BANDS
        .iter()
        .find(|(last_round, _, _)| round <= *last_round)
        .map_or(LATE_MIX, |&(_, medium, strong)| (medium, strong));

    // Widened so late-round totals cannot overflow; each share is <= total.
    let share = |pct: u32| (u64::from(total) * u64::from(pct) / 100) as u32;
    let medium = share(medium_pct);
    let strong = share(strong_pct);
    WaveMix {
        weak: total - medium - strong,
        medium,
        strong,
    }
}

/// Size and mix of round `round` in one call.
#[must_use]
pub fn wave_composition(round: u32, config: &WaveConfig) -> WaveMix {
    wave_mix(round, wave_size(round, config))
}

/// Turn and wave state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveDirector {
    phase: Phase,
    turn: u32,
    round: u32,
    cycles_per_wave: u32,
    pending: Vec<EnemyKind>,
}

impl WaveDirector {
    /// Start in `BuildAndPlan` with no completed turns.
    #[must_use]
    pub fn new(cycles_per_wave: u32) -> Self {
        Self {
            phase: Phase::BuildAndPlan,
            turn: 0,
            round: 0,
            cycles_per_wave: cycles_per_wave.max(1),
            pending: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed build/collect cycles.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Waves launched so far; during `EnemyTurn` this is the current round.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Enemies queued for the next spawn stage.
    #[must_use]
    pub fn pending(&self) -> &[EnemyKind] {
        &self.pending
    }

    /// Player-driven advance out of a planning phase.
    ///
    /// Leaving `Collection` completes a turn; every `cycles_per_wave`-th turn
    /// enters `EnemyTurn` and queues the next wave.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPhaseTransition`] during `EnemyTurn`,
    /// which only ends when the wave is defeated.
    pub fn advance(&mut self, config: &WaveConfig) -> Result<PhaseChange> {
        self.phase = match self.phase {
            Phase::BuildAndPlan => Phase::Collection,
            Phase::Collection => {
                self.turn += 1;
                if self.turn % self.cycles_per_wave == 0 {
                    self.round += 1;
                    let mix = wave_composition(self.round, config);
                    self.pending = mix.to_spawn_order();
                    tracing::info!(
                        round = self.round,
                        total = mix.total(),
                        weak = mix.weak,
                        medium = mix.medium,
                        strong = mix.strong,
                        "wave queued"
                    );
                    Phase::EnemyTurn
                } else {
                    Phase::BuildAndPlan
                }
            }
            Phase::EnemyTurn => return Err(GameError::InvalidPhaseTransition(Phase::EnemyTurn)),
        };
        Ok(self.change())
    }

    /// Hand the queued enemies to the spawn stage.
    pub fn take_pending(&mut self) -> Vec<EnemyKind> {
        std::mem::take(&mut self.pending)
    }

    /// End `EnemyTurn` once the wave is spawned and no live enemy remains.
    pub fn try_finish_enemy_turn(&mut self, live_enemies: usize) -> Option<PhaseChange> {
        if self.phase != Phase::EnemyTurn || !self.pending.is_empty() || live_enemies > 0 {
            return None;
        }
        self.phase = Phase::BuildAndPlan;
        tracing::info!(round = self.round, turn = self.turn, "wave defeated");
        Some(self.change())
    }

    fn change(&self) -> PhaseChange {
        PhaseChange {
            turn: self.turn,
            phase: self.phase,
        }
    }
}

/// Shuffle the grid's spawn tiles and assign one to each enemy.
///
/// Tiles are drawn uniformly with replacement from the shuffled list.
/// Every flagged tile is checked before the RNG is touched.
///
/// # Errors
///
/// Returns [`GameError::NoSpawnTiles`] if the grid flags none, or
/// [`GameError::BlockedSpawnTile`] if a flagged tile is not traversable.
pub fn assign_spawn_tiles(
    grid: &NavGrid,
    rng: &mut ChaCha8Rng,
    enemies: &[EnemyKind],
) -> Result<Vec<(EnemyKind, TileCoord)>> {
    let mut tiles = grid.spawn_tiles();
    if tiles.is_empty() {
        return Err(GameError::NoSpawnTiles);
    }
    if let Some(&blocked) = tiles.iter().find(|&&tile| !grid.is_traversable(tile)) {
        return Err(GameError::BlockedSpawnTile(blocked));
    }
    tiles.shuffle(rng);

    Ok(enemies
        .iter()
        .map(|&kind| (kind, tiles[rng.gen_range(0..tiles.len())]))
        .collect())
}
