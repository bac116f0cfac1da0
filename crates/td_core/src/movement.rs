//! The movement pipeline: blockage detection, path following, collision
//! avoidance and integration.
//!
//! Each stage is a separate system so the simulation can run them in its
//! fixed order (blockage before combat, steering and integration after).
//! Stages that need to look at other units first take an immutable snapshot
//! and then apply their decisions, so no unit ever observes a half-updated
//! neighbour.

use crate::components::{EntityId, Team};
use crate::grid::{NavGrid, Occupancy};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::{distance_squared_to_tile, waypoint_position};
use crate::simulation::EntityStorage;

/// Tuning shared by the movement stages, resolved once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementParams {
    /// Squared distance at which a waypoint counts as reached.
    pub stop_distance_sq: Fixed,
    /// Radius of the avoidance neighbourhood.
    pub avoidance_radius: Fixed,
    /// Scale of the avoidance push.
    pub avoidance_strength: Fixed,
    /// Below this, speeds and displacements count as zero.
    pub epsilon: Fixed,
    /// Tick length in seconds.
    pub dt: Fixed,
}

/// A unit's route was found blocked by a hostile structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockageEvent {
    /// The halted unit.
    pub unit: EntityId,
    /// The structure in the way.
    pub blocker: EntityId,
}

/// Flag units whose next waypoint is covered by a live hostile structure.
///
/// A blocked unit keeps its waypoint, records the structure as its blocker
/// (which the combat system prefers over any other target) and is held in
/// place by [`path_following_system`]. The flag clears as soon as the
/// structure dies or the next waypoint is no longer covered by it.
///
/// Returns one event per unit that became blocked this tick.
pub fn blockage_system(
    entities: &mut EntityStorage,
    occupancy: &Occupancy,
    entity_ids: &[EntityId],
) -> Vec<BlockageEvent> {
    let decisions: Vec<(EntityId, Option<EntityId>)> = entity_ids
        .iter()
        .filter_map(|&id| {
            let entity = entities.get(id)?;
            if !entity.is_alive() || entity.movement.is_none() {
                return None;
            }
            let next = entity.path.as_ref()?.next_waypoint();
            let blocker = next
                .and_then(|tile| occupancy.occupant(tile))
                .filter(|&owner| is_live_hostile(entities, entity.team, owner));
            Some((id, blocker))
        })
        .collect();

    let mut events = Vec::new();
    for (id, blocker) in decisions {
        let Some(path) = entities.get_mut(id).and_then(|e| e.path.as_mut()) else {
            continue;
        };
        match blocker {
            Some(blocker) => {
                if path.blocker != Some(blocker) {
                    tracing::debug!(unit = id, blocker, "route blocked by hostile structure");
                    events.push(BlockageEvent { unit: id, blocker });
                }
                path.blocked_by_entity = true;
                path.blocker = Some(blocker);
            }
            None => path.clear_blockage(),
        }
    }
    events
}

fn is_live_hostile(entities: &EntityStorage, team: Team, other: EntityId) -> bool {
    entities
        .get(other)
        .is_some_and(|e| e.is_alive() && e.team.is_hostile_to(team))
}

/// Turn each unit's route into a desired velocity and consume reached
/// waypoints.
///
/// A waypoint closer than the stop distance is popped and the unit rests
/// for that tick. Blocked units, dying units and units without a route get
/// zero desired velocity. The step toward a waypoint never overshoots its
/// center.
pub fn path_following_system(
    entities: &mut EntityStorage,
    grid: &NavGrid,
    params: &MovementParams,
    entity_ids: &[EntityId],
) {
    for &id in entity_ids {
        let Some(entity) = entities.get_mut(id) else {
            continue;
        };
        let alive = entity.is_alive();
        let (Some(movement), Some(position), Some(velocity), Some(path)) = (
            entity.movement.as_ref(),
            entity.position.as_ref(),
            entity.velocity.as_mut(),
            entity.path.as_mut(),
        ) else {
            continue;
        };

        if !alive || path.blocked_by_entity {
            velocity.desired = Vec2Fixed::ZERO;
            continue;
        }

        let Some(next) = path.next_waypoint() else {
            velocity.desired = Vec2Fixed::ZERO;
            continue;
        };

        let dist_sq = distance_squared_to_tile(grid, position.value, next);
        if dist_sq < params.stop_distance_sq {
            path.waypoints.pop_front();
            if path.waypoints.is_empty() {
                path.path_completed = true;
                tracing::trace!(unit = id, "route completed");
            }
            velocity.desired = Vec2Fixed::ZERO;
            continue;
        }

        let to_waypoint = waypoint_position(grid, next) - position.value;
        let distance = to_waypoint.length();
        let max_step = movement.speed * params.dt;
        let speed = if distance < max_step && params.dt > Fixed::ZERO {
            distance / params.dt
        } else {
            movement.speed
        };
        velocity.desired = to_waypoint.normalize().scale(speed);
    }
}

/// Push moving units apart and cap the result at each unit's max speed.
///
/// Only units that want to move are steered; every other live mobile unit
/// still acts as an obstacle. A unit that wants to stand still gets exactly
/// zero actual velocity, so it can attack.
pub fn steering_system(entities: &mut EntityStorage, params: &MovementParams, entity_ids: &[EntityId]) {
    let obstacles: Vec<(EntityId, Vec2Fixed)> = entity_ids
        .iter()
        .filter_map(|&id| {
            let entity = entities.get(id)?;
            if !entity.is_alive() || entity.movement.is_none() {
                return None;
            }
            Some((id, entity.position?.value))
        })
        .collect();

    let radius = params.avoidance_radius;
    let radius_sq = radius * radius;

    for &id in entity_ids {
        let Some(entity) = entities.get_mut(id) else {
            continue;
        };
        let alive = entity.is_alive();
        let (Some(movement), Some(position), Some(velocity)) = (
            entity.movement.as_ref(),
            entity.position.as_ref(),
            entity.velocity.as_mut(),
        ) else {
            continue;
        };

        if !alive || velocity.desired.is_negligible(params.epsilon) {
            velocity.actual = Vec2Fixed::ZERO;
            continue;
        }

        let mut repulsion = Vec2Fixed::ZERO;
        for &(other_id, other_pos) in &obstacles {
            if other_id == id {
                continue;
            }
            let offset = position.value - other_pos;
            let dist_sq = offset.length_squared();
            if dist_sq >= radius_sq || dist_sq == Fixed::ZERO {
                continue;
            }
            let distance = offset.length();
            repulsion += offset
                .normalize()
                .scale((radius - distance) * params.avoidance_strength);
        }

        velocity.actual = (velocity.desired + repulsion).clamp_length(movement.max_speed);
    }
}

/// Advance positions by `actual * dt` and update facing.
///
/// A step that would end on a non-traversable or out-of-bounds tile is
/// reduced to its X or Y component, or dropped entirely, so a unit never
/// ends a tick on such a tile. Facing follows the displacement, then the
/// velocity, then the direction to the next waypoint, and otherwise stays as
/// it was.
pub fn integration_system(
    entities: &mut EntityStorage,
    grid: &NavGrid,
    params: &MovementParams,
    entity_ids: &[EntityId],
) {
    for &id in entity_ids {
        let Some(entity) = entities.get_mut(id) else {
            continue;
        };
        if entity.movement.is_none() {
            continue;
        }
        let next_waypoint = entity.path.as_ref().and_then(|p| p.next_waypoint());
        let (Some(position), Some(velocity)) = (entity.position.as_mut(), entity.velocity.as_ref())
        else {
            continue;
        };

        let step = velocity.actual.scale(params.dt);
        let origin = position.value;
        position.previous = origin;
        position.value = constrained_step(grid, origin, step);

        let displacement = position.value - position.previous;
        if !displacement.is_negligible(params.epsilon) {
            position.facing = displacement.normalize();
        } else if !velocity.actual.is_negligible(params.epsilon) {
            position.facing = velocity.actual.normalize();
        } else if let Some(tile) = next_waypoint {
            let toward = waypoint_position(grid, tile) - origin;
            if !toward.is_negligible(params.epsilon) {
                position.facing = toward.normalize();
            }
        }
    }
}

/// Apply `step` from `origin`, sliding along or stopping at impassable tiles.
fn constrained_step(grid: &NavGrid, origin: Vec2Fixed, step: Vec2Fixed) -> Vec2Fixed {
    if step == Vec2Fixed::ZERO {
        return origin;
    }
    if !grid.is_position_traversable(origin) {
        // Terrain changed underneath the unit; let it walk out.
        return origin + step;
    }
    [
        origin + step,
        Vec2Fixed::new(origin.x + step.x, origin.y),
        Vec2Fixed::new(origin.x, origin.y + step.y),
    ]
    .into_iter()
    .find(|&candidate| grid.is_position_traversable(candidate))
    .unwrap_or(origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EnemyKind, Movement, PathState, Position, UnitKind, Velocity};
    use crate::grid::{Terrain, TileCoord};
    use crate::simulation::Entity;

    fn fixed(n: f64) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_constrained_step_slides_along_wall() {
        let mut grid = NavGrid::new(4, 4, Fixed::ONE);
        grid.set_terrain(TileCoord::new(2, 1), Terrain::Blocked);

        // Diagonal step into the blocked tile keeps only the vertical part.
        let origin = Vec2Fixed::new(fixed(1.9), fixed(1.5));
        let result = constrained_step(&grid, origin, Vec2Fixed::new(fixed(0.2), fixed(0.2)));
        assert_eq!(result, Vec2Fixed::new(fixed(1.9), fixed(1.7)));
    }

    fn params() -> MovementParams {
        MovementParams {
            stop_distance_sq: fixed(0.01),
            avoidance_radius: fixed(0.6),
            avoidance_strength: fixed(2.0),
            epsilon: fixed(0.01),
            dt: fixed(0.05),
        }
    }

    fn walker(storage: &mut EntityStorage, at: Vec2Fixed, desired: Vec2Fixed) -> EntityId {
        let mut entity = Entity::new(UnitKind::Enemy(EnemyKind::Grunt), Team::Attackers);
        entity.position = Some(Position::new(at));
        entity.velocity = Some(Velocity { desired, actual: Vec2Fixed::ZERO });
        entity.movement = Some(Movement {
            speed: fixed(1.0),
            max_speed: fixed(2.0),
        });
        storage.insert(entity)
    }

    fn assert_close(value: Fixed, expected: Fixed) {
        assert!((value - expected).abs() < fixed(0.001), "{value} != {expected}");
    }

    fn actual(storage: &EntityStorage, id: EntityId) -> Vec2Fixed {
        storage.get(id).unwrap().velocity.unwrap().actual
    }

    #[test]
    fn test_steering_pushes_moving_units_apart() {
        let mut storage = EntityStorage::new();
        let east = Vec2Fixed::new(fixed(1.0), Fixed::ZERO);
        let a = walker(&mut storage, Vec2Fixed::new(fixed(2.0), fixed(2.0)), east);
        let b = walker(&mut storage, Vec2Fixed::new(fixed(2.0), fixed(2.3)), east);

        steering_system(&mut storage, &params(), &[a, b]);

        // Pushed along Y, away from each other: (0.6 - 0.3) * 2 = 0.6 each.
        assert_close(actual(&storage, a).y, fixed(-0.6));
        assert_close(actual(&storage, b).y, fixed(0.6));
        assert_close(actual(&storage, a).x, fixed(1.0));
    }

    #[test]
    fn test_resting_unit_gets_zero_actual_velocity_but_still_repels() {
        let mut storage = EntityStorage::new();
        let resting = walker(&mut storage, Vec2Fixed::new(fixed(2.0), fixed(2.0)), Vec2Fixed::ZERO);
        let moving = walker(
            &mut storage,
            Vec2Fixed::new(fixed(2.5), fixed(2.0)),
            Vec2Fixed::new(Fixed::ZERO, fixed(1.0)),
        );

        steering_system(&mut storage, &params(), &[resting, moving]);

        assert_eq!(actual(&storage, resting), Vec2Fixed::ZERO);
        assert!(actual(&storage, moving).x > Fixed::ZERO);
    }

    #[test]
    fn test_steering_caps_at_max_speed() {
        let mut storage = EntityStorage::new();
        let fast = walker(
            &mut storage,
            Vec2Fixed::new(fixed(2.0), fixed(2.0)),
            Vec2Fixed::new(fixed(5.0), Fixed::ZERO),
        );

        steering_system(&mut storage, &params(), &[fast]);

        let capped = actual(&storage, fast);
        assert_close(capped.x, fixed(2.0));
        assert_eq!(capped.y, Fixed::ZERO);
    }

    #[test]
    fn test_waypoint_is_consumed_within_stop_distance() {
        let grid = NavGrid::new(4, 4, Fixed::ONE);
        let mut storage = EntityStorage::new();
        let id = walker(&mut storage, grid.tile_center(TileCoord::new(1, 1)), Vec2Fixed::ZERO);
        let mut path = PathState::new();
        path.assign(TileCoord::new(2, 1), vec![TileCoord::new(1, 1), TileCoord::new(2, 1)], 0);
        storage.get_mut(id).unwrap().path = Some(path);

        path_following_system(&mut storage, &grid, &params(), &[id]);
        let entity = storage.get(id).unwrap();
        assert_eq!(entity.path.as_ref().unwrap().next_waypoint(), Some(TileCoord::new(2, 1)));
        assert_eq!(entity.velocity.unwrap().desired, Vec2Fixed::ZERO);

        path_following_system(&mut storage, &grid, &params(), &[id]);
        let desired = storage.get(id).unwrap().velocity.unwrap().desired;
        assert_close(desired.x, fixed(1.0));
        assert_eq!(desired.y, Fixed::ZERO);
    }

    #[test]
    fn test_constrained_step_stops_at_grid_edge() {
        let grid = NavGrid::new(2, 2, Fixed::ONE);
        let origin = Vec2Fixed::new(fixed(0.1), fixed(0.1));
        let result = constrained_step(&grid, origin, Vec2Fixed::new(fixed(-0.5), fixed(-0.5)));
        assert_eq!(result, origin);
    }

    fn facing(storage: &EntityStorage, id: EntityId) -> Vec2Fixed {
        storage.get(id).unwrap().position.unwrap().facing
    }

    fn set_actual(storage: &mut EntityStorage, id: EntityId, actual: Vec2Fixed) {
        storage.get_mut(id).unwrap().velocity.as_mut().unwrap().actual = actual;
    }

    #[test]
    fn test_facing_follows_displacement() {
        let grid = NavGrid::new(6, 6, Fixed::ONE);
        let mut storage = EntityStorage::new();
        let id = walker(&mut storage, Vec2Fixed::new(fixed(2.5), fixed(2.5)), Vec2Fixed::ZERO);
        set_actual(&mut storage, id, Vec2Fixed::new(Fixed::ZERO, fixed(1.0)));

        integration_system(&mut storage, &grid, &params(), &[id]);

        let facing = facing(&storage, id);
        assert_close(facing.x, Fixed::ZERO);
        assert_close(facing.y, fixed(1.0));
    }

    #[test]
    fn test_facing_is_kept_at_rest_without_waypoint() {
        let grid = NavGrid::new(6, 6, Fixed::ONE);
        let mut storage = EntityStorage::new();
        let at = Vec2Fixed::new(fixed(2.5), fixed(2.5));
        let id = walker(&mut storage, at, Vec2Fixed::ZERO);
        let west = Vec2Fixed::new(fixed(-1.0), Fixed::ZERO);
        storage.get_mut(id).unwrap().position.as_mut().unwrap().facing = west;

        integration_system(&mut storage, &grid, &params(), &[id]);

        assert_eq!(facing(&storage, id), west);
        assert_eq!(storage.get(id).unwrap().position.unwrap().value, at);
    }

    #[test]
    fn test_stationary_unit_faces_next_waypoint() {
        // A blocked unit holds still but keeps looking down its route.
        let grid = NavGrid::new(6, 6, Fixed::ONE);
        let mut storage = EntityStorage::new();
        let id = walker(&mut storage, Vec2Fixed::new(fixed(2.5), fixed(2.5)), Vec2Fixed::ZERO);
        let mut path = PathState::new();
        path.assign(TileCoord::new(2, 4), vec![TileCoord::new(2, 4)], 0);
        path.blocked_by_entity = true;
        storage.get_mut(id).unwrap().path = Some(path);

        integration_system(&mut storage, &grid, &params(), &[id]);

        let facing = facing(&storage, id);
        assert_close(facing.x, Fixed::ZERO);
        assert_close(facing.y, fixed(1.0));
    }
}
