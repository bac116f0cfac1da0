//! Core simulation loop.
//!
//! The simulation advances in fixed ticks of simulated time and runs every
//! system in the same order each tick.
//!
//! # Determinism
//!
//! - Positions and speeds use fixed-point math via [`Fixed`]
//! - Randomness comes from one seeded [`ChaCha8Rng`]
//! - Entities are processed in sorted id order
//! - Time comes only from the owned [`SimClock`]
//!
//! # Example
//!
//! ```
//! use td_core::config::SimConfig;
//! use td_core::grid::{NavGrid, TileCoord};
//! use td_core::math::Fixed;
//! use td_core::simulation::Simulation;
//!
//! let mut grid = NavGrid::new(16, 16, Fixed::ONE);
//! grid.set_spawn_point(TileCoord::new(0, 0), true);
//!
//! let mut sim = Simulation::new(grid, SimConfig::default()).unwrap();
//! let events = sim.tick().unwrap();
//! assert!(events.spawned.is_empty());
//! assert_eq!(sim.clock().tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::clock::SimClock;
use crate::combat::{combat_system, AttackEvent};
use crate::components::{
    AnimationCue, AttackStats, Combatant, Cooldown, EnemyKind, EntityId, Footprint, Health, LifeState,
    Movement, PathState, Position, RemovalTimer, TargetPreference, Team, UnitKind, Velocity,
};
use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::grid::{FootprintSize, NavGrid, Occupancy, TileCoord};
use crate::lifecycle::{life_state, lifecycle_system, DeathEvent};
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::{
    blockage_system, integration_system, path_following_system, steering_system, BlockageEvent,
    MovementParams,
};
use crate::pathfinding::pathfinding_system;
use crate::waves::{assign_spawn_tiles, Phase, PhaseChange, WaveDirector};

/// An entity with optional components.
///
/// Only components that are `Some` are active for this entity. This allows
/// flexible composition without a full ECS framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// What the entity is.
    pub kind: UnitKind,
    /// Which side it fights for.
    pub team: Team,
    /// World position.
    pub position: Option<Position>,
    /// Velocity, for mobile units.
    pub velocity: Option<Velocity>,
    /// Speed limits, for mobile units.
    pub movement: Option<Movement>,
    /// Route-following state, for mobile units.
    pub path: Option<PathState>,
    /// What the unit seeks when it has no explicit target.
    pub preference: Option<TargetPreference>,
    /// Attack capability.
    pub combatant: Option<Combatant>,
    /// Present while the entity may not attack.
    pub cooldown: Option<Cooldown>,
    /// Health for damageable entities.
    pub health: Option<Health>,
    /// Tiles covered by a structure.
    pub footprint: Option<Footprint>,
    /// Present while the entity is dying.
    pub removal: Option<RemovalTimer>,
    /// Append-only animation queue for the presentation layer.
    pub cues: Vec<AnimationCue>,
}

impl Entity {
    /// Create a new entity with no components.
    ///
    /// The id is assigned on insertion into [`EntityStorage`].
    #[must_use]
    pub fn new(kind: UnitKind, team: Team) -> Self {
        Self {
            id: 0,
            kind,
            team,
            position: None,
            velocity: None,
            movement: None,
            path: None,
            preference: None,
            combatant: None,
            cooldown: None,
            health: None,
            footprint: None,
            removal: None,
            cues: Vec::new(),
        }
    }

    /// Not yet flagged dead and with health left (or without health at all).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health.map_or(true, |h| h.is_alive())
    }

    /// Units that walk.
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.movement.is_some()
    }
}

/// A structure to be placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSpec {
    /// Must be a structure kind.
    pub kind: UnitKind,
    /// Owning side.
    pub team: Team,
    /// Top-left tile of the footprint.
    pub anchor: TileCoord,
    /// Footprint dimensions in tiles.
    pub size: FootprintSize,
    /// Starting and maximum health.
    pub max_health: u32,
    /// Attack stats for towers.
    pub attack: Option<AttackStats>,
}

/// Storage for all entities in the simulation.
///
/// Uses a `HashMap` for O(1) entity lookup by ID, with deterministic
/// iteration via sorted keys when processing systems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStorage {
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Enemies spawned by the wave director.
    pub spawned: Vec<EntityId>,
    /// Fresh route searches.
    pub repaths: usize,
    /// Units newly halted by a hostile structure.
    pub blockages: Vec<BlockageEvent>,
    /// Hits landed.
    pub attacks: Vec<AttackEvent>,
    /// Units that started dying.
    pub deaths: Vec<DeathEvent>,
    /// Units deleted from storage.
    pub removed: Vec<EntityId>,
    /// Phase changes made by the simulation itself.
    pub phase_changes: Vec<PhaseChange>,
}

/// The core game simulation.
///
/// Owns the grid, config, clock, RNG and wave director; nothing here is
/// global.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Spawn** - place any queued wave
/// 2. **Pathfinding** - plan or refresh routes
/// 3. **Blockage** - halt units whose next tile is a hostile structure
/// 4. **Combat** - cooldowns, target selection and damage
/// 5. **Path following** - desired velocities from routes
/// 6. **Steering** - collision avoidance into actual velocities
/// 7. **Integration** - positions and facing
/// 8. **Lifecycle** - deaths and removals, then the end-of-wave check
#[derive(Debug, Clone)]
pub struct Simulation {
    grid: NavGrid,
    config: SimConfig,
    clock: SimClock,
    director: WaveDirector,
    rng: ChaCha8Rng,
    occupancy: Occupancy,
    entities: EntityStorage,
}

impl Simulation {
    /// Create a simulation over `grid`.
    ///
    /// # Errors
    ///
    /// Returns the first defect found by [`SimConfig::validate`].
    pub fn new(grid: NavGrid, config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clock: SimClock::new(config.tick_ms),
            director: WaveDirector::new(config.wave.cycles_per_wave),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            occupancy: Occupancy::new(),
            entities: EntityStorage::new(),
            grid,
            config,
        })
    }

    /// The simulation clock.
    #[must_use]
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The navigation grid.
    #[must_use]
    pub const fn grid(&self) -> &NavGrid {
        &self.grid
    }

    /// Mutable access to the grid, e.g. to reshape terrain between ticks.
    pub fn grid_mut(&mut self) -> &mut NavGrid {
        &mut self.grid
    }

    /// The wave director.
    #[must_use]
    pub const fn director(&self) -> &WaveDirector {
        &self.director
    }

    /// Current turn phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.director.phase()
    }

    /// Get a reference to the entity storage.
    #[must_use]
    pub const fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Get a mutable entity by ID.
    pub fn get_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Lifecycle stage of `id`; ids no longer in storage are `Removed`.
    #[must_use]
    pub fn life_state(&self, id: EntityId) -> LifeState {
        life_state(self.entities.get(id))
    }

    /// Live structure covering `tile`, as of the last occupancy rebuild.
    #[must_use]
    pub fn occupant_at(&self, tile: TileCoord) -> Option<EntityId> {
        self.occupancy.occupant(tile)
    }

    /// Number of enemies that are neither dying nor removed.
    #[must_use]
    pub fn live_enemy_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|(_, e)| e.kind.is_enemy() && e.is_alive())
            .count()
    }

    /// Take every animation cue queued on `id` since the last drain.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] if `id` is not in storage.
    pub fn drain_cues(&mut self, id: EntityId) -> Result<Vec<AnimationCue>> {
        let entity = self.entities.get_mut(id).ok_or(GameError::EntityNotFound(id))?;
        Ok(std::mem::take(&mut entity.cues))
    }

    /// Player-driven advance of the turn cycle.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPhaseTransition`] during `EnemyTurn`.
    pub fn advance_phase(&mut self) -> Result<PhaseChange> {
        let change = self.director.advance(&self.config.wave)?;
        tracing::info!(turn = change.turn, phase = ?change.phase, "phase changed");
        Ok(change)
    }

    /// Place a structure on the grid.
    ///
    /// Every covered tile must be in bounds, buildable, traversable and free.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPlacement`] for a non-structure kind or a
    /// bad footprint, [`GameError::InvalidMaxHealth`] for zero health.
    pub fn place_structure(&mut self, spec: StructureSpec) -> Result<EntityId> {
        if !spec.kind.is_structure() {
            return Err(GameError::InvalidPlacement(format!("{:?} is not a structure", spec.kind)));
        }
        let tiles = spec.size.tiles_from(spec.anchor);
        if tiles.is_empty() {
            return Err(GameError::InvalidPlacement("empty footprint".into()));
        }
        for &tile in &tiles {
            if !self.grid.is_buildable(tile) || !self.grid.is_traversable(tile) {
                return Err(GameError::InvalidPlacement(format!("tile {tile:?} is not buildable")));
            }
            if let Some(owner) = self.occupancy.occupant(tile) {
                return Err(GameError::InvalidPlacement(format!(
                    "tile {tile:?} is already occupied by {owner}"
                )));
            }
        }

        let mut entity = Entity::new(spec.kind, spec.team);
        entity.health = Some(Health::new(spec.max_health, &format!("{:?}", spec.kind))?);
        entity.position = Some(Position::new(self.footprint_center(spec.anchor, spec.size)));
        entity.combatant = spec.attack.map(Combatant::tower);
        entity.footprint = Some(Footprint::new(tiles.clone()));

        let id = self.entities.insert(entity);
        for tile in tiles {
            self.occupancy.insert(tile, id);
        }
        tracing::info!(entity = id, kind = ?spec.kind, anchor = ?spec.anchor, "structure placed");
        Ok(id)
    }

    fn footprint_center(&self, anchor: TileCoord, size: FootprintSize) -> Vec2Fixed {
        let half = self.grid.cell_size() / Fixed::from_num(2);
        let origin = self.grid.tile_center(anchor);
        Vec2Fixed::new(
            origin.x + half * Fixed::from_num(size.width.saturating_sub(1)),
            origin.y + half * Fixed::from_num(size.height.saturating_sub(1)),
        )
    }

    /// Spawn an enemy at the center of `tile`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPlacement`] if the tile is not traversable.
    pub fn spawn_enemy(&mut self, kind: EnemyKind, tile: TileCoord) -> Result<EntityId> {
        if !self.grid.is_traversable(tile) {
            return Err(GameError::InvalidPlacement(format!("cannot spawn on {tile:?}")));
        }
        self.spawn_enemy_at(kind, self.grid.tile_center(tile))
    }

    /// Spawn an enemy at an exact world position.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPlacement`] if the position is not
    /// traversable, or a profile defect from the config.
    pub fn spawn_enemy_at(&mut self, kind: EnemyKind, position: Vec2Fixed) -> Result<EntityId> {
        if !self.grid.is_position_traversable(position) {
            return Err(GameError::InvalidPlacement(format!("cannot spawn at {position:?}")));
        }
        let profile = self.config.enemies.profile(kind);

        let mut entity = Entity::new(UnitKind::Enemy(kind), Team::Attackers);
        entity.health = Some(Health::new(profile.max_health, &format!("{kind:?}"))?);
        entity.combatant = Some(Combatant::mobile(AttackStats::new(
            profile.damage,
            profile.range,
            profile.attack_interval_ms,
        )?));
        entity.movement = Some(Movement {
            speed: profile.speed,
            max_speed: profile.max_speed,
        });
        entity.preference = Some(profile.preference);
        entity.position = Some(Position::new(position));
        entity.velocity = Some(Velocity::ZERO);
        entity.path = Some(PathState::new());

        Ok(self.entities.insert(entity))
    }

    /// Advance the simulation by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoSpawnTiles`] or [`GameError::BlockedSpawnTile`]
    /// if a wave is due and the map cannot place it, or
    /// [`GameError::NonPositiveRange`] for a malformed combatant. All are
    /// configuration defects.
    pub fn tick(&mut self) -> Result<TickEvents> {
        let mut events = TickEvents::default();

        // 1. Spawn
        events.spawned = self.run_spawn_stage()?;

        let entity_ids = self.entities.sorted_ids();
        self.rebuild_occupancy(&entity_ids);
        let params = self.movement_params();

        // 2. Pathfinding
        events.repaths = pathfinding_system(&mut self.entities, &self.grid, &entity_ids);

        // 3. Blockage
        events.blockages = blockage_system(&mut self.entities, &self.occupancy, &entity_ids);

        // 4. Combat
        events.attacks = combat_system(
            &mut self.entities,
            &self.grid,
            self.clock.now(),
            self.config.motion_epsilon,
            &entity_ids,
        )?;

        // 5-7. Movement
        path_following_system(&mut self.entities, &self.grid, &params, &entity_ids);
        steering_system(&mut self.entities, &params, &entity_ids);
        integration_system(&mut self.entities, &self.grid, &params, &entity_ids);

        // 8. Lifecycle
        let outcome = lifecycle_system(
            &mut self.entities,
            self.config.death_grace_ms,
            self.clock.tick_ms(),
            &entity_ids,
        );
        events.deaths = outcome.deaths;
        events.removed = outcome.removed;

        if let Some(change) = self.director.try_finish_enemy_turn(self.live_enemy_count()) {
            events.phase_changes.push(change);
        }

        self.clock.advance();

        #[cfg(debug_assertions)]
        tracing::debug!(tick = self.clock.tick(), hash = self.state_hash(), "tick complete");

        Ok(events)
    }

    fn run_spawn_stage(&mut self) -> Result<Vec<EntityId>> {
        if self.director.pending().is_empty() {
            return Ok(Vec::new());
        }
        // The wave stays queued until every enemy is placed, so a failed
        // spawn can never read as a defeated wave.
        let placements = assign_spawn_tiles(&self.grid, &mut self.rng, self.director.pending())?;

        let mut spawned = Vec::with_capacity(placements.len());
        for (kind, tile) in placements {
            spawned.push(self.spawn_enemy(kind, tile)?);
        }
        self.director.take_pending();
        tracing::info!(round = self.director.round(), count = spawned.len(), "wave spawned");
        Ok(spawned)
    }

    fn rebuild_occupancy(&mut self, entity_ids: &[EntityId]) {
        self.occupancy.clear();
        for &id in entity_ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if !entity.is_alive() {
                continue;
            }
            if let Some(footprint) = &entity.footprint {
                for &tile in &footprint.tiles {
                    self.occupancy.insert(tile, id);
                }
            }
        }
    }

    fn movement_params(&self) -> MovementParams {
        let stop = self.config.waypoint_stop_distance;
        MovementParams {
            stop_distance_sq: stop * stop,
            avoidance_radius: self.config.avoidance_radius,
            avoidance_strength: self.config.avoidance_strength,
            epsilon: self.config.motion_epsilon,
            dt: self.clock.dt_seconds(),
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.clock.tick().hash(&mut hasher);
        self.clock.now().hash(&mut hasher);
        self.director.phase().hash(&mut hasher);
        self.director.turn().hash(&mut hasher);
        self.director.round().hash(&mut hasher);

        let ids = self.entities.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            entity.kind.hash(&mut hasher);

            if let Some(pos) = &entity.position {
                hash_vec(pos.value, &mut hasher);
                hash_vec(pos.facing, &mut hasher);
            }
            if let Some(vel) = &entity.velocity {
                hash_vec(vel.actual, &mut hasher);
            }
            if let Some(health) = &entity.health {
                health.current.hash(&mut hasher);
                health.is_dead.hash(&mut hasher);
            }
            if let Some(path) = &entity.path {
                path.target.hash(&mut hasher);
                path.waypoints.hash(&mut hasher);
                path.blocker.hash(&mut hasher);
            }
            if let Some(cooldown) = &entity.cooldown {
                cooldown.started_at.hash(&mut hasher);
            }
            if let Some(timer) = &entity.removal {
                timer.remaining_ms.hash(&mut hasher);
            }
        }

        hasher.finish()
    }
}

fn hash_vec(v: Vec2Fixed, hasher: &mut DefaultHasher) {
    v.x.to_bits().hash(hasher);
    v.y.to_bits().hash(hasher);
}
