//! Grid-based pathfinding using the A* algorithm, and the planning system
//! that keeps every mobile unit's route fresh.
//!
//! # Determinism
//!
//! The open set is ordered by lowest f-score, then by insertion sequence
//! (first pushed, first expanded). Neighbours are always expanded in the
//! order east, south, west, north. Together these make the route a pure
//! function of `(grid, start, goal)`: repeated searches over an unchanged
//! grid return identical routes on every platform.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::components::{EntityId, Team, TargetPreference, UnitKind};
use crate::grid::{NavGrid, TileCoord};
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::EntityStorage;

/// Direction offsets for 4-connected movement, in expansion order.
const DIRECTIONS: [(i32, i32); 4] = [
    (1, 0),  // East
    (0, 1),  // South
    (-1, 0), // West
    (0, -1), // North
];

/// Cheapest possible step; scales the heuristic so it stays admissible.
const MIN_STEP_COST: u32 = 1;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenNode {
    tile: TileCoord,
    g_score: u32,
    f_score: u32,
    /// Insertion order; earlier pushes win f-score ties.
    sequence: u64,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both keys for min-heap behaviour.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn manhattan_heuristic(from: TileCoord, to: TileCoord) -> u32 {
    from.manhattan(to) * MIN_STEP_COST
}

/// Find a route from `start` to `goal`.
///
/// The result starts at `start`, ends at `goal`, and every consecutive pair
/// of tiles shares an edge. An empty route means no route exists, including
/// when either endpoint is outside the grid or not traversable.
#[must_use]
pub fn find_path(grid: &NavGrid, start: TileCoord, goal: TileCoord) -> Vec<TileCoord> {
    if !grid.is_traversable(start) || !grid.is_traversable(goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let mut open_set: BinaryHeap<OpenNode> = BinaryHeap::new();
    let mut closed: HashSet<TileCoord> = HashSet::new();
    let mut came_from: HashMap<TileCoord, TileCoord> = HashMap::new();
    let mut g_score: HashMap<TileCoord, u32> = HashMap::new();
    let mut sequence = 0_u64;

    g_score.insert(start, 0);
    open_set.push(OpenNode {
        tile: start,
        g_score: 0,
        f_score: manhattan_heuristic(start, goal),
        sequence,
    });

    while let Some(current) = open_set.pop() {
        if current.tile == goal {
            return reconstruct_path(&came_from, goal);
        }
        if !closed.insert(current.tile) {
            // Superseded entry for an already expanded tile.
            continue;
        }

        for &(dx, dy) in &DIRECTIONS {
            let Some(neighbor) = current.tile.offset(dx, dy) else {
                continue;
            };
            if closed.contains(&neighbor) {
                continue;
            }
            let Some(step_cost) = grid.movement_cost(neighbor) else {
                continue;
            };

            let tentative_g = current.g_score + step_cost;
            if g_score.get(&neighbor).is_some_and(|&g| g <= tentative_g) {
                continue;
            }

            came_from.insert(neighbor, current.tile);
            g_score.insert(neighbor, tentative_g);
            sequence += 1;
            open_set.push(OpenNode {
                tile: neighbor,
                g_score: tentative_g,
                f_score: tentative_g + manhattan_heuristic(neighbor, goal),
                sequence,
            });
        }
    }

    Vec::new()
}

/// Walk `came_from` back from the goal.
fn reconstruct_path(came_from: &HashMap<TileCoord, TileCoord>, goal: TileCoord) -> Vec<TileCoord> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Read-only view of a potential target, captured before planning mutates
/// any path.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: EntityId,
    kind: UnitKind,
    team: Team,
    position: Vec2Fixed,
    is_structure: bool,
}

/// Pick the closest live unit matching `preference` that is hostile to `team`.
///
/// Ties on squared distance go to the lowest [`EntityId`], i.e. the unit
/// created first.
fn acquire_target(
    candidates: &[Candidate],
    seeker: EntityId,
    team: Team,
    preference: TargetPreference,
    position: Vec2Fixed,
) -> Option<Candidate> {
    candidates
        .iter()
        .filter(|c| c.id != seeker && c.team.is_hostile_to(team) && preference.accepts(c.kind))
        .map(|c| (position.distance_squared(c.position), c))
        .min_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.id.cmp(&b.id)))
        .map(|(_, c)| *c)
}

/// Number of fresh searches performed by one planning pass.
pub type RepathCount = usize;

/// Refresh routes of every mobile unit that needs one.
///
/// A unit is replanned when it has no destination, when its target has
/// vanished or is dying, when `needs_repath` was raised, when a mobile target
/// has walked off the destination tile, or when its last search found no
/// route and the terrain has changed since. Units with nothing to seek hold
/// position.
pub fn pathfinding_system(
    entities: &mut EntityStorage,
    grid: &NavGrid,
    entity_ids: &[EntityId],
) -> RepathCount {
    let candidates: Vec<Candidate> = entity_ids
        .iter()
        .filter_map(|&id| {
            let entity = entities.get(id)?;
            if !entity.is_alive() {
                return None;
            }
            Some(Candidate {
                id,
                kind: entity.kind,
                team: entity.team,
                position: entity.position?.value,
                is_structure: entity.footprint.is_some(),
            })
        })
        .collect();
    let lookup: HashMap<EntityId, Candidate> = candidates.iter().map(|c| (c.id, *c)).collect();

    let mut repaths = 0;
    for &id in entity_ids {
        let Some(entity) = entities.get_mut(id) else {
            continue;
        };
        if !entity.is_alive() || entity.movement.is_none() {
            continue;
        }
        let team = entity.team;
        let preference = entity.preference.unwrap_or_default();
        let Some(position) = entity.position.map(|p| p.value) else {
            continue;
        };
        let Some(path) = entity.path.as_mut() else {
            continue;
        };

        // Lazy staleness checks.
        if let Some(target_id) = path.target {
            match lookup.get(&target_id) {
                None => {
                    tracing::trace!(unit = id, target = target_id, "path target gone");
                    path.invalidate();
                }
                Some(target) if !target.is_structure => {
                    if grid.world_to_tile(target.position) != path.destination {
                        path.needs_repath = true;
                    }
                }
                Some(_) => {}
            }
        }
        if !path.needs_repath
            && path.destination.is_some()
            && path.waypoints.is_empty()
            && !path.path_completed
            && path.planned_revision != grid.revision()
        {
            path.needs_repath = true;
        }

        if path.destination.is_some() && !path.needs_repath {
            continue;
        }

        let target = path
            .target
            .and_then(|t| lookup.get(&t).copied())
            .or_else(|| acquire_target(&candidates, id, team, preference, position));
        let Some(target) = target else {
            path.invalidate();
            continue;
        };
        let (Some(start), Some(goal)) = (grid.world_to_tile(position), grid.world_to_tile(target.position))
        else {
            path.invalidate();
            continue;
        };

        let mut route = find_path(grid, start, goal);
        repaths += 1;
        let reachable = !route.is_empty();
        if reachable {
            route.remove(0);
        }
        let arrived = reachable && route.is_empty();
        path.target = Some(target.id);
        path.assign(goal, route, grid.revision());
        path.path_completed = arrived;
        path.clear_blockage();

        tracing::debug!(
            unit = id,
            target = target.id,
            ?goal,
            steps = path.waypoints.len(),
            reachable,
            "planned route"
        );
    }

    repaths
}

/// Convert a route's next tile into the world point a unit steers toward.
#[must_use]
pub fn waypoint_position(grid: &NavGrid, tile: TileCoord) -> Vec2Fixed {
    grid.tile_center(tile)
}

/// Squared world distance from `position` to the center of `tile`.
#[must_use]
pub fn distance_squared_to_tile(grid: &NavGrid, position: Vec2Fixed, tile: TileCoord) -> Fixed {
    position.distance_squared(grid.tile_center(tile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Terrain;

    fn open_grid(width: u32, height: u32) -> NavGrid {
        NavGrid::new(width, height, Fixed::ONE)
    }

    fn tile(x: u32, y: u32) -> TileCoord {
        TileCoord::new(x, y)
    }

    fn assert_valid_route(grid: &NavGrid, route: &[TileCoord], start: TileCoord, goal: TileCoord) {
        assert_eq!(route.first(), Some(&start));
        assert_eq!(route.last(), Some(&goal));
        for pair in route.windows(2) {
            assert!(pair[0].is_adjacent(pair[1]), "{:?} -> {:?} not adjacent", pair[0], pair[1]);
        }
        for step in route {
            assert!(grid.is_traversable(*step), "route crosses blocked tile {step:?}");
        }
    }

    #[test]
    fn test_straight_path_is_shortest() {
        let grid = open_grid(10, 10);
        let route = find_path(&grid, tile(0, 0), tile(5, 0));
        assert_valid_route(&grid, &route, tile(0, 0), tile(5, 0));
        assert_eq!(route.len(), 6);
    }

    #[test]
    fn test_path_around_wall() {
        let mut grid = open_grid(10, 10);
        for y in 2..8 {
            grid.set_terrain(tile(5, y), Terrain::Blocked);
        }

        let route = find_path(&grid, tile(2, 5), tile(8, 5));
        assert_valid_route(&grid, &route, tile(2, 5), tile(8, 5));
        // Detour over or under the wall.
        assert!(route.iter().any(|t| t.y <= 1 || t.y >= 8));
    }

    #[test]
    fn test_no_path_exists() {
        let mut grid = open_grid(10, 10);
        for y in 0..10 {
            grid.set_terrain(tile(5, y), Terrain::Blocked);
        }
        assert!(find_path(&grid, tile(2, 5), tile(8, 5)).is_empty());
    }

    #[test]
    fn test_blocked_or_out_of_bounds_endpoints() {
        let mut grid = open_grid(10, 10);
        grid.set_terrain(tile(0, 0), Terrain::Blocked);
        assert!(find_path(&grid, tile(0, 0), tile(5, 5)).is_empty());
        assert!(find_path(&grid, tile(5, 5), tile(0, 0)).is_empty());
        assert!(find_path(&grid, tile(5, 5), tile(50, 5)).is_empty());
    }

    #[test]
    fn test_path_to_same_tile() {
        let grid = open_grid(10, 10);
        assert_eq!(find_path(&grid, tile(4, 4), tile(4, 4)), vec![tile(4, 4)]);
    }

    #[test]
    fn test_rough_terrain_is_avoided_when_cheaper() {
        let mut grid = open_grid(7, 3);
        for x in 1..6 {
            grid.set_terrain(tile(x, 1), Terrain::Rough);
        }
        let route = find_path(&grid, tile(0, 1), tile(6, 1));
        assert_valid_route(&grid, &route, tile(0, 1), tile(6, 1));
        // Straight through costs 5*2 + 1 = 11, around costs 8.
        assert_eq!(route.len(), 9);
        assert!(route.iter().all(|&t| grid.movement_cost(t) == Some(1)));
    }

    #[test]
    fn test_tie_break_prefers_first_expanded_direction() {
        // Two equally short routes; east is expanded before south.
        let grid = open_grid(2, 2);
        let route = find_path(&grid, tile(0, 0), tile(1, 1));
        assert_eq!(route, vec![tile(0, 0), tile(1, 0), tile(1, 1)]);
    }

    #[test]
    fn test_determinism() {
        let mut grid = open_grid(20, 20);
        for i in 5..15 {
            grid.set_terrain(tile(10, i), Terrain::Blocked);
        }

        let first = find_path(&grid, tile(5, 10), tile(15, 10));
        for _ in 0..10 {
            assert_eq!(find_path(&grid, tile(5, 10), tile(15, 10)), first);
        }
    }
}
