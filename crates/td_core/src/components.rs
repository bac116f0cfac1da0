//! Component definitions.
//!
//! Components are pure data with a little bookkeeping behaviour. All game
//! entities are composed of these components; the systems in
//! [`pathfinding`](crate::pathfinding), [`movement`](crate::movement),
//! [`combat`](crate::combat), [`lifecycle`](crate::lifecycle) and
//! [`waves`](crate::waves) operate on them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;
use crate::error::{GameError, Result};
use crate::grid::TileCoord;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for entities.
///
/// Ids are handed out in increasing order, so comparing ids compares
/// creation order.
pub type EntityId = u64;

// ============================================================================
// Identity
// ============================================================================

/// Side of the conflict an entity fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    /// The waves.
    Attackers,
    /// The player's base.
    Defenders,
}

impl Team {
    /// Two entities are hostile when they belong to different teams.
    #[must_use]
    pub fn is_hostile_to(self, other: Self) -> bool {
        self != other
    }
}

/// Enemy archetypes, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Cheap, weak melee unit. The only type in early rounds.
    Grunt,
    /// Fast skirmisher.
    Raider,
    /// Slow, heavily armoured siege unit.
    Brute,
}

impl EnemyKind {
    /// All kinds, weakest first.
    pub const ALL: [Self; 3] = [Self::Grunt, Self::Raider, Self::Brute];
}

/// Closed category of every entity the simulation knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// A wave unit. Carries the "is-enemy" marker.
    Enemy(EnemyKind),
    /// The defenders' base.
    Headquarters,
    /// An attacking structure.
    Tower,
    /// A passive fortification.
    Wall,
}

impl UnitKind {
    /// Returns true for wave units.
    #[must_use]
    pub const fn is_enemy(self) -> bool {
        matches!(self, Self::Enemy(_))
    }

    /// Returns true for static structures.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        matches!(self, Self::Headquarters | Self::Tower | Self::Wall)
    }
}

/// What a unit seeks when it has no explicit target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetPreference {
    /// March on the defenders' headquarters.
    #[default]
    Headquarters,
    /// Go for whichever structure is closest.
    AnyStructure,
    /// Hunt wave units.
    Enemies,
}

impl TargetPreference {
    /// Lookup table deciding which unit kinds satisfy this preference.
    #[must_use]
    pub const fn accepts(self, kind: UnitKind) -> bool {
        match (self, kind) {
            (Self::Headquarters, UnitKind::Headquarters) => true,
            (Self::Headquarters, _) => false,
            (Self::AnyStructure, UnitKind::Headquarters | UnitKind::Tower | UnitKind::Wall) => true,
            (Self::AnyStructure, UnitKind::Enemy(_)) => false,
            (Self::Enemies, UnitKind::Enemy(_)) => true,
            (Self::Enemies, _) => false,
        }
    }
}

// ============================================================================
// Spatial
// ============================================================================

/// Position component in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Current world position.
    pub value: Vec2Fixed,
    /// Position before the last integration step.
    pub previous: Vec2Fixed,
    /// Unit vector the entity is facing.
    pub facing: Vec2Fixed,
}

impl Position {
    /// Create a position at rest, facing +X.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self {
            value,
            previous: value,
            facing: Vec2Fixed::new(Fixed::ONE, Fixed::ZERO),
        }
    }

    /// Move instantly, without leaving a displacement behind.
    pub fn teleport(&mut self, value: Vec2Fixed) {
        self.value = value;
        self.previous = value;
    }
}

/// Velocity component for moving entities.
///
/// `desired` is authored by path following and blockage; `actual` is only
/// ever written by the steering step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Intended velocity (units per second).
    pub desired: Vec2Fixed,
    /// Velocity after collision avoidance (units per second).
    pub actual: Vec2Fixed,
}

impl Velocity {
    /// Zero velocity (stationary).
    pub const ZERO: Self = Self {
        desired: Vec2Fixed::ZERO,
        actual: Vec2Fixed::ZERO,
    };

    /// Check if the entity is effectively stationary.
    #[must_use]
    pub fn is_stationary(&self, epsilon: Fixed) -> bool {
        self.actual.is_negligible(epsilon)
    }
}

/// Movement component for mobile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Cruise speed in units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Upper bound after steering, in units per second.
    #[serde(with = "fixed_serde")]
    pub max_speed: Fixed,
}

/// Tiles covered by a static structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Covered tiles, row-major.
    pub tiles: Vec<TileCoord>,
}

impl Footprint {
    /// Create a footprint from its tiles.
    #[must_use]
    pub fn new(tiles: Vec<TileCoord>) -> Self {
        Self { tiles }
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// Route-following state of a mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathState {
    /// Tile the current route leads to.
    pub destination: Option<TileCoord>,
    /// Entity the route is chasing, if any.
    pub target: Option<EntityId>,
    /// Remaining route, next step first. Never contains the tile the unit
    /// stood on when the route was planned.
    pub waypoints: VecDeque<TileCoord>,
    /// Forces a fresh search on the next pathfinding pass.
    pub needs_repath: bool,
    /// Set once the last waypoint has been consumed.
    pub path_completed: bool,
    /// Set while a hostile structure sits on the next waypoint.
    pub blocked_by_entity: bool,
    /// The structure currently blocking the route.
    pub blocker: Option<EntityId>,
    /// Grid revision the current route was planned against.
    pub planned_revision: u64,
}

impl PathState {
    /// A fresh unit with no route, asking to be planned.
    #[must_use]
    pub fn new() -> Self {
        Self {
            needs_repath: true,
            ..Self::default()
        }
    }

    /// Next step of the route.
    #[must_use]
    pub fn next_waypoint(&self) -> Option<TileCoord> {
        self.waypoints.front().copied()
    }

    /// Drop the current goal and ask for a new one.
    pub fn invalidate(&mut self) {
        self.destination = None;
        self.target = None;
        self.waypoints.clear();
        self.needs_repath = true;
        self.path_completed = false;
    }

    /// Install a freshly planned route.
    pub fn assign(&mut self, destination: TileCoord, route: Vec<TileCoord>, revision: u64) {
        self.destination = Some(destination);
        self.waypoints = route.into();
        self.needs_repath = false;
        self.path_completed = false;
        self.planned_revision = revision;
    }

    /// Clear any recorded blockage.
    pub fn clear_blockage(&mut self) {
        self.blocked_by_entity = false;
        self.blocker = None;
    }
}

// ============================================================================
// Combat
// ============================================================================

/// Attack statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStats {
    /// Health removed per hit.
    pub damage: u32,
    /// Reach in world units, inclusive.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Time between hits, in simulated milliseconds.
    pub interval_ms: u64,
}

impl AttackStats {
    /// Create validated attack stats.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NonPositiveRange`] if `range <= 0`.
    pub fn new(damage: u32, range: Fixed, interval_ms: u64) -> Result<Self> {
        if range <= Fixed::ZERO {
            return Err(GameError::NonPositiveRange(range));
        }
        Ok(Self {
            damage,
            range,
            interval_ms,
        })
    }
}

/// How an attacker picks whom to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Targeting {
    /// Re-derives its target every tick from path state.
    Mobile,
    /// Keeps its target until it dies or leaves range.
    Sticky {
        /// Target held across ticks.
        current: Option<EntityId>,
    },
}

/// Anything that can attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Damage, range and interval.
    pub stats: AttackStats,
    /// Target-acquisition policy.
    pub targeting: Targeting,
}

impl Combatant {
    /// A unit that fights while standing still.
    #[must_use]
    pub const fn mobile(stats: AttackStats) -> Self {
        Self {
            stats,
            targeting: Targeting::Mobile,
        }
    }

    /// A tower with sticky targeting.
    #[must_use]
    pub const fn tower(stats: AttackStats) -> Self {
        Self {
            stats,
            targeting: Targeting::Sticky { current: None },
        }
    }
}

/// Forbids attacking until the duration has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    /// When the attack that started this cooldown landed.
    pub started_at: SimTime,
    /// Length in simulated milliseconds.
    pub duration_ms: u64,
}

impl Cooldown {
    /// Returns true once `now >= started_at + duration`.
    #[must_use]
    pub fn has_elapsed(&self, now: SimTime) -> bool {
        now.as_millis() >= self.started_at.as_millis().saturating_add(self.duration_ms)
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points. Never increases.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
    /// Flipped exactly once, by the lifecycle system.
    pub is_dead: bool,
}

impl Health {
    /// Create new health component at full health.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidMaxHealth`] if `max` is zero.
    pub fn new(max: u32, owner: &str) -> Result<Self> {
        if max == 0 {
            return Err(GameError::InvalidMaxHealth(owner.to_string()));
        }
        Ok(Self {
            current: max,
            max,
            is_dead: false,
        })
    }

    /// Check whether health has run out.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Alive and not yet flagged as dying.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.is_dead && self.current > 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }
}

/// Countdown before a dying entity is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalTimer {
    /// Simulated milliseconds left.
    pub remaining_ms: i64,
}

/// Coarse lifecycle stage, derived from [`Health`] and [`RemovalTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifeState {
    /// Fighting.
    Alive,
    /// Playing its death animation, waiting for removal.
    Dying,
    /// Deleted from the simulation.
    Removed,
}

// ============================================================================
// Presentation cues
// ============================================================================

/// Animation categories the presentation layer knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CueCategory {
    /// A single attack swing or shot.
    Attack,
    /// The death animation.
    Death,
}

/// One entry of a unit's append-only animation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationCue {
    /// What to play.
    pub category: CueCategory,
    /// How long to play it, in simulated milliseconds.
    pub duration_ms: u64,
    /// Whether the animation repeats until replaced.
    pub looping: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostility() {
        assert!(Team::Attackers.is_hostile_to(Team::Defenders));
        assert!(!Team::Defenders.is_hostile_to(Team::Defenders));
    }

    #[test]
    fn test_target_preference_lookup() {
        let grunt = UnitKind::Enemy(EnemyKind::Grunt);
        assert!(TargetPreference::Headquarters.accepts(UnitKind::Headquarters));
        assert!(!TargetPreference::Headquarters.accepts(UnitKind::Tower));
        assert!(TargetPreference::AnyStructure.accepts(UnitKind::Wall));
        assert!(!TargetPreference::AnyStructure.accepts(grunt));
        assert!(TargetPreference::Enemies.accepts(grunt));
        assert!(!TargetPreference::Enemies.accepts(UnitKind::Headquarters));
    }

    #[test]
    fn test_zero_max_health_is_rejected() {
        assert_eq!(
            Health::new(0, "grunt"),
            Err(GameError::InvalidMaxHealth("grunt".into()))
        );
    }

    #[test]
    fn test_health_never_underflows() {
        let mut health = Health::new(10, "wall").unwrap();
        assert_eq!(health.apply_damage(4), 4);
        assert_eq!(health.apply_damage(100), 6);
        assert!(health.is_depleted());
        assert!(!health.is_alive());
    }

    #[test]
    fn test_non_positive_range_is_rejected() {
        assert!(AttackStats::new(5, Fixed::ZERO, 1000).is_err());
        assert!(AttackStats::new(5, Fixed::from_num(-1), 1000).is_err());
        assert!(AttackStats::new(5, Fixed::from_num(2), 1000).is_ok());
    }

    #[test]
    fn test_cooldown_boundary() {
        let cooldown = Cooldown {
            started_at: SimTime::from_millis(1_000),
            duration_ms: 500,
        };
        assert!(!cooldown.has_elapsed(SimTime::from_millis(1_499)));
        assert!(cooldown.has_elapsed(SimTime::from_millis(1_500)));
    }

    #[test]
    fn test_path_state_invalidate() {
        let mut path = PathState::new();
        path.assign(TileCoord::new(3, 3), vec![TileCoord::new(1, 0)], 0);
        path.target = Some(7);
        assert!(!path.needs_repath);

        path.invalidate();
        assert!(path.needs_repath);
        assert_eq!(path.target, None);
        assert_eq!(path.destination, None);
        assert!(path.waypoints.is_empty());
    }
}
