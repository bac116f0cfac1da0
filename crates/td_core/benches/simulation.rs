//! Simulation benchmarks for td_core.
//!
//! Run with: `cargo bench -p td_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use td_core::config::SimConfig;
use td_core::grid::{FootprintSize, NavGrid, Terrain, TileCoord};
use td_core::math::Fixed;
use td_core::pathfinding::find_path;
use td_core::simulation::{Simulation, StructureSpec};
use td_core::components::{EnemyKind, Team, UnitKind};

fn maze_grid(size: u32) -> NavGrid {
    let mut grid = NavGrid::new(size, size, Fixed::ONE);
    // Vertical walls with alternating gaps top and bottom.
    for x in (4..size - 1).step_by(4) {
        let gap = if (x / 4) % 2 == 0 { 0 } else { size - 1 };
        for y in 0..size {
            if y != gap {
                grid.set_terrain(TileCoord::new(x, y), Terrain::Blocked);
            }
        }
    }
    grid
}

/// A* across a 64x64 serpentine maze.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let grid = maze_grid(64);
    c.bench_function("find_path_maze_64", |b| {
        b.iter(|| find_path(black_box(&grid), TileCoord::new(0, 0), TileCoord::new(63, 63)))
    });
}

/// Ticks with a full wave marching on the headquarters.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut grid = NavGrid::new(48, 48, Fixed::ONE);
    for x in 0..48 {
        grid.set_spawn_point(TileCoord::new(x, 0), true);
    }
    let mut sim = Simulation::new(grid, SimConfig::default()).expect("default config is valid");
    sim.place_structure(StructureSpec {
        kind: UnitKind::Headquarters,
        team: Team::Defenders,
        anchor: TileCoord::new(22, 44),
        size: FootprintSize::square(3),
        max_health: 1_000_000,
        attack: None,
    })
    .expect("headquarters fits");
    for i in 0..60 {
        sim.spawn_enemy(EnemyKind::ALL[i % 3], TileCoord::new((i as u32 * 7) % 48, 0))
            .expect("spawn tile is open");
    }

    c.bench_function("tick_60_enemies", |b| {
        b.iter(|| {
            sim.tick().expect("tick succeeds");
            black_box(sim.state_hash())
        })
    });
}

criterion_group!(benches, pathfinding_benchmark, tick_benchmark);
criterion_main!(benches);
