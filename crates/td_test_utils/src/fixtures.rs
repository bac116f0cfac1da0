//! Test fixtures and helpers.
//!
//! Pre-built grids, simulations and structures for consistent testing.

use fixed::types::I32F32;
use td_core::components::{AttackStats, Team, UnitKind};
use td_core::config::SimConfig;
use td_core::grid::{FootprintSize, NavGrid, Terrain, TileCoord};
use td_core::math::Vec2Fixed;
use td_core::simulation::{Simulation, StructureSpec};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// World point from float coordinates.
#[must_use]
pub fn point(x: f64, y: f64) -> Vec2Fixed {
    Vec2Fixed::new(fixed_f(x), fixed_f(y))
}

/// Shorthand for a tile coordinate.
#[must_use]
pub fn tile(x: u32, y: u32) -> TileCoord {
    TileCoord::new(x, y)
}

/// An all-open grid with unit cells.
#[must_use]
pub fn open_grid(width: u32, height: u32) -> NavGrid {
    NavGrid::new(width, height, I32F32::ONE)
}

/// Build a grid from rows of characters.
///
/// `.` open, `,` rough, `#` blocked, `S` open spawn tile. Anything else is
/// open.
///
/// # Panics
///
/// Panics if `rows` is empty or ragged.
#[must_use]
pub fn grid_from_rows(rows: &[&str]) -> NavGrid {
    let height = u32::try_from(rows.len()).expect("row count fits u32");
    let width = u32::try_from(rows[0].chars().count()).expect("row width fits u32");
    let mut grid = NavGrid::new(width, height, I32F32::ONE);
    for (y, row) in rows.iter().enumerate() {
        assert_eq!(row.chars().count() as u32, width, "ragged row {y}");
        for (x, ch) in row.chars().enumerate() {
            let at = TileCoord::new(x as u32, y as u32);
            match ch {
                ',' => {
                    grid.set_terrain(at, Terrain::Rough);
                }
                '#' => {
                    grid.set_terrain(at, Terrain::Blocked);
                }
                'S' => {
                    grid.set_spawn_point(at, true);
                }
                _ => {}
            }
        }
    }
    grid
}

/// A simulation with default config over `grid`.
///
/// # Panics
///
/// Panics if the default config fails validation.
#[must_use]
pub fn simulation(grid: NavGrid) -> Simulation {
    Simulation::new(grid, SimConfig::default()).expect("default config is valid")
}

/// A defenders' headquarters with a square footprint.
#[must_use]
pub fn headquarters(anchor: TileCoord, size: u32) -> StructureSpec {
    StructureSpec {
        kind: UnitKind::Headquarters,
        team: Team::Defenders,
        anchor,
        size: FootprintSize::square(size),
        max_health: 1_000,
        attack: None,
    }
}

/// A single-tile defenders' wall.
#[must_use]
pub fn wall(anchor: TileCoord, max_health: u32) -> StructureSpec {
    StructureSpec {
        kind: UnitKind::Wall,
        team: Team::Defenders,
        anchor,
        size: FootprintSize::square(1),
        max_health,
        attack: None,
    }
}

/// A single-tile defenders' tower.
///
/// # Panics
///
/// Panics if `range` is not positive.
#[must_use]
pub fn tower(anchor: TileCoord, damage: u32, range: f64, interval_ms: u64) -> StructureSpec {
    StructureSpec {
        kind: UnitKind::Tower,
        team: Team::Defenders,
        anchor,
        size: FootprintSize::square(1),
        max_health: 200,
        attack: Some(AttackStats::new(damage, fixed_f(range), interval_ms).expect("positive range")),
    }
}
