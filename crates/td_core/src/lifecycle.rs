//! Death and removal.
//!
//! `Alive -> Dying -> Removed`. A unit whose health has run out is flagged
//! dead exactly once, gets a death cue and a removal timer, and is deleted
//! from storage when the timer runs out. Dying units stay in storage so the
//! presentation layer can finish the death animation, but every other system
//! ignores them.

use serde::{Deserialize, Serialize};

use crate::components::{AnimationCue, CueCategory, EntityId, LifeState, RemovalTimer, Team, UnitKind};
use crate::math::Vec2Fixed;
use crate::simulation::{Entity, EntityStorage};

/// A unit entered the dying state this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    /// The unit that died.
    pub entity: EntityId,
    /// What it was.
    pub kind: UnitKind,
    /// Which side it fought for.
    pub team: Team,
}

/// What the lifecycle pass did this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleOutcome {
    /// Units flagged dead.
    pub deaths: Vec<DeathEvent>,
    /// Units deleted from storage.
    pub removed: Vec<EntityId>,
}

/// Derive the lifecycle stage of a possibly-removed entity.
#[must_use]
pub fn life_state(entity: Option<&Entity>) -> LifeState {
    match entity {
        None => LifeState::Removed,
        Some(e) if e.health.is_some_and(|h| h.is_dead) => LifeState::Dying,
        Some(_) => LifeState::Alive,
    }
}

/// Flag newly dead units and count down the removal of dying ones.
///
/// A unit flagged this tick starts its timer at `grace_ms`; the countdown
/// begins on the following tick.
pub fn lifecycle_system(
    entities: &mut EntityStorage,
    grace_ms: u64,
    tick_ms: u64,
    entity_ids: &[EntityId],
) -> LifecycleOutcome {
    let mut outcome = LifecycleOutcome::default();
    let grace = i64::try_from(grace_ms).unwrap_or(i64::MAX);
    let step = i64::try_from(tick_ms).unwrap_or(i64::MAX);

    for &id in entity_ids {
        let Some(entity) = entities.get_mut(id) else {
            continue;
        };
        let Some(health) = entity.health.as_mut() else {
            continue;
        };

        if !health.is_dead {
            if !health.is_depleted() {
                continue;
            }
            health.is_dead = true;
            entity.removal = Some(RemovalTimer { remaining_ms: grace });
            entity.cues.push(AnimationCue {
                category: CueCategory::Death,
                duration_ms: grace_ms,
                looping: false,
            });
            // Steering zeroes `actual` for the dead on the next tick.
            if let Some(velocity) = entity.velocity.as_mut() {
                velocity.desired = Vec2Fixed::ZERO;
            }
            tracing::debug!(entity = id, kind = ?entity.kind, "unit died");
            outcome.deaths.push(DeathEvent {
                entity: id,
                kind: entity.kind,
                team: entity.team,
            });
            continue;
        }

        let expired = entity.removal.as_mut().map_or(true, |timer| {
            timer.remaining_ms = timer.remaining_ms.saturating_sub(step);
            timer.remaining_ms <= 0
        });
        if expired {
            entities.remove(id);
            tracing::debug!(entity = id, "unit removed");
            outcome.removed.push(id);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EnemyKind, Health, Movement, Position, Velocity};
    use crate::math::Fixed;
    use crate::movement::{steering_system, MovementParams};

    fn dying_storage() -> (EntityStorage, EntityId) {
        let mut storage = EntityStorage::new();
        let mut entity = Entity::new(UnitKind::Enemy(EnemyKind::Grunt), Team::Attackers);
        entity.health = Some(Health::new(10, "grunt").unwrap());
        let id = storage.insert(entity);
        if let Some(health) = storage.get_mut(id).and_then(|e| e.health.as_mut()) {
            health.apply_damage(10);
        }
        (storage, id)
    }

    #[test]
    fn test_death_is_flagged_once() {
        let (mut storage, id) = dying_storage();

        let first = lifecycle_system(&mut storage, 100, 50, &[id]);
        assert_eq!(first.deaths.len(), 1);
        assert_eq!(life_state(storage.get(id)), LifeState::Dying);

        let second = lifecycle_system(&mut storage, 100, 50, &[id]);
        assert!(second.deaths.is_empty());

        let death_cues = storage
            .get(id)
            .unwrap()
            .cues
            .iter()
            .filter(|c| c.category == CueCategory::Death)
            .count();
        assert_eq!(death_cues, 1);
    }

    #[test]
    fn test_death_stops_intent_and_steering_stops_motion() {
        let (mut storage, id) = dying_storage();
        let east = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
        if let Some(entity) = storage.get_mut(id) {
            entity.position = Some(Position::new(Vec2Fixed::ZERO));
            entity.velocity = Some(Velocity { desired: east, actual: east });
            entity.movement = Some(Movement {
                speed: Fixed::ONE,
                max_speed: Fixed::ONE,
            });
        }

        lifecycle_system(&mut storage, 100, 50, &[id]);
        let velocity = storage.get(id).unwrap().velocity.unwrap();
        assert_eq!(velocity.desired, Vec2Fixed::ZERO);
        assert_eq!(velocity.actual, east);

        let params = MovementParams {
            stop_distance_sq: Fixed::from_num(0.01),
            avoidance_radius: Fixed::from_num(0.6),
            avoidance_strength: Fixed::from_num(2),
            epsilon: Fixed::from_num(0.01),
            dt: Fixed::from_num(0.05),
        };
        steering_system(&mut storage, &params, &[id]);
        assert_eq!(storage.get(id).unwrap().velocity.unwrap().actual, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_removed_after_grace_period() {
        let (mut storage, id) = dying_storage();

        lifecycle_system(&mut storage, 100, 50, &[id]);
        // 100 -> 50
        assert!(lifecycle_system(&mut storage, 100, 50, &[id]).removed.is_empty());
        // 50 -> 0
        assert_eq!(lifecycle_system(&mut storage, 100, 50, &[id]).removed, vec![id]);
        assert_eq!(life_state(storage.get(id)), LifeState::Removed);
    }

    #[test]
    fn test_entities_without_health_are_untouched() {
        let mut storage = EntityStorage::new();
        let id = storage.insert(Entity::new(UnitKind::Wall, Team::Defenders));
        let outcome = lifecycle_system(&mut storage, 0, 50, &[id]);
        assert_eq!(outcome, LifecycleOutcome::default());
        assert_eq!(life_state(storage.get(id)), LifeState::Alive);
    }
}
