//! A* properties over random terrain.

use std::collections::HashSet;

use proptest::prelude::*;
use td_core::grid::{NavGrid, TileCoord};
use td_core::pathfinding::find_path;
use td_test_utils::determinism::strategies::{arb_terrain_grid, arb_tile};

const SIZE: u32 = 12;

/// Breadth-first flood fill used as an independent reachability oracle.
fn reachable(grid: &NavGrid, start: TileCoord, goal: TileCoord) -> bool {
    if !grid.is_traversable(start) || !grid.is_traversable(goal) {
        return false;
    }
    let mut seen = HashSet::from([start]);
    let mut frontier = vec![start];
    while let Some(current) = frontier.pop() {
        if current == goal {
            return true;
        }
        for (dx, dy) in [(1, 0), (0, 1), (-1, 0), (0, -1)] {
            if let Some(next) = current.offset(dx, dy) {
                if grid.is_traversable(next) && seen.insert(next) {
                    frontier.push(next);
                }
            }
        }
    }
    false
}

proptest! {
    #[test]
    fn prop_route_is_connected_and_traversable(
        grid in arb_terrain_grid(SIZE),
        start in arb_tile(SIZE),
        goal in arb_tile(SIZE),
    ) {
        let route = find_path(&grid, start, goal);
        prop_assert_eq!(!route.is_empty(), reachable(&grid, start, goal));
        if !route.is_empty() {
            prop_assert_eq!(route[0], start);
            prop_assert_eq!(*route.last().unwrap(), goal);
            for pair in route.windows(2) {
                prop_assert!(pair[0].is_adjacent(pair[1]));
            }
            for step in &route {
                prop_assert!(grid.is_traversable(*step));
            }
        }
    }

    #[test]
    fn prop_repeated_searches_agree(
        grid in arb_terrain_grid(SIZE),
        start in arb_tile(SIZE),
        goal in arb_tile(SIZE),
    ) {
        let first = find_path(&grid, start, goal);
        let second = find_path(&grid, start, goal);
        prop_assert_eq!(first, second);
    }
}
