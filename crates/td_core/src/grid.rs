//! Tile grid consumed by pathfinding, blockage detection and wave spawning.
//!
//! The grid only describes terrain. Structures are an overlay tracked by
//! [`Occupancy`], rebuilt from live entity footprints every tick, so placing
//! a wall never changes what A* considers traversable: units route through
//! hostile structures and fight their way past them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Integer tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance in tiles.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns true if the two tiles share an edge.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }

    /// Offset this tile, returning `None` when the result would be negative.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(Self::new(x, y))
    }
}

/// Terrain classification for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Normal walkable ground (cost: 1).
    #[default]
    Open,
    /// Walkable ground with 2x movement cost.
    Rough,
    /// Impassable terrain.
    Blocked,
}

impl Terrain {
    /// Returns the movement cost for this terrain.
    /// Returns `None` for blocked tiles.
    #[must_use]
    pub const fn movement_cost(self) -> Option<u32> {
        match self {
            Self::Open => Some(1),
            Self::Rough => Some(2),
            Self::Blocked => None,
        }
    }

    /// Returns true if units can stand on this terrain.
    #[must_use]
    pub const fn is_traversable(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Collectable resource lying on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Stone deposit.
    Stone,
    /// Timber stand.
    Timber,
    /// Ore vein.
    Ore,
}

/// Everything the map declares about a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileInfo {
    /// Ground type.
    pub terrain: Terrain,
    /// Whether the placement collaborator may build here.
    pub buildable: bool,
    /// Whether enemy waves may appear here.
    pub spawn_point: bool,
    /// Resource on the tile, if any.
    pub resource: Option<ResourceKind>,
}

impl TileInfo {
    /// Open, buildable ground with nothing on it.
    pub const OPEN: Self = Self {
        terrain: Terrain::Open,
        buildable: true,
        spawn_point: false,
        resource: None,
    };
}

/// Navigation grid for pathfinding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavGrid {
    /// Grid width in tiles.
    width: u32,
    /// Grid height in tiles.
    height: u32,
    /// Tile data stored in row-major order.
    tiles: Vec<TileInfo>,
    /// Size of each tile in world units.
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
    /// Bumped on every terrain edit so stale routes can be detected.
    revision: u64,
}

impl NavGrid {
    /// Create a new grid with every tile open and buildable.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `cell_size` is not positive.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: Fixed) -> Self {
        assert!(width > 0, "NavGrid width must be positive");
        assert!(height > 0, "NavGrid height must be positive");
        assert!(cell_size > Fixed::ZERO, "NavGrid cell_size must be positive");

        let tile_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tiles: vec![TileInfo::OPEN; tile_count],
            cell_size,
            revision: 0,
        }
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Tile size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Terrain revision counter.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    fn index(&self, tile: TileCoord) -> usize {
        (tile.y as usize) * (self.width as usize) + (tile.x as usize)
    }

    /// Check if a tile is within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        tile.x < self.width && tile.y < self.height
    }

    /// Get tile data. Returns `None` if out of bounds.
    #[must_use]
    pub fn tile(&self, tile: TileCoord) -> Option<&TileInfo> {
        if self.in_bounds(tile) {
            self.tiles.get(self.index(tile))
        } else {
            None
        }
    }

    /// Replace the data of a tile. Returns `false` if out of bounds.
    pub fn set_tile(&mut self, tile: TileCoord, info: TileInfo) -> bool {
        if !self.in_bounds(tile) {
            return false;
        }
        let index = self.index(tile);
        if self.tiles[index].terrain != info.terrain {
            self.revision += 1;
        }
        self.tiles[index] = info;
        true
    }

    /// Change only the terrain of a tile. Returns `false` if out of bounds.
    pub fn set_terrain(&mut self, tile: TileCoord, terrain: Terrain) -> bool {
        match self.tile(tile).copied() {
            Some(info) => self.set_tile(tile, TileInfo { terrain, ..info }),
            None => false,
        }
    }

    /// Flag or unflag a tile as an enemy spawn point.
    pub fn set_spawn_point(&mut self, tile: TileCoord, spawn_point: bool) -> bool {
        match self.tile(tile).copied() {
            Some(info) => self.set_tile(tile, TileInfo { spawn_point, ..info }),
            None => false,
        }
    }

    /// Check if a unit can stand on a tile.
    #[must_use]
    pub fn is_traversable(&self, tile: TileCoord) -> bool {
        self.tile(tile).is_some_and(|t| t.terrain.is_traversable())
    }

    /// Check if a structure may be placed on a tile.
    #[must_use]
    pub fn is_buildable(&self, tile: TileCoord) -> bool {
        self.tile(tile)
            .is_some_and(|t| t.buildable && t.terrain.is_traversable())
    }

    /// Check if a tile is a declared spawn point.
    #[must_use]
    pub fn is_spawn_point(&self, tile: TileCoord) -> bool {
        self.tile(tile).is_some_and(|t| t.spawn_point)
    }

    /// Resource lying on a tile.
    #[must_use]
    pub fn resource(&self, tile: TileCoord) -> Option<ResourceKind> {
        self.tile(tile).and_then(|t| t.resource)
    }

    /// Movement cost for entering a tile.
    /// Returns `None` for blocked or out-of-bounds tiles.
    #[must_use]
    pub fn movement_cost(&self, tile: TileCoord) -> Option<u32> {
        self.tile(tile).and_then(|t| t.terrain.movement_cost())
    }

    /// All spawn tiles in row-major order.
    #[must_use]
    pub fn spawn_tiles(&self) -> Vec<TileCoord> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| TileCoord::new(x, y)))
            .filter(|&tile| self.is_spawn_point(tile))
            .collect()
    }

    /// Convert world position to tile coordinates.
    ///
    /// Returns `None` if the position is outside the grid bounds.
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec2Fixed) -> Option<TileCoord> {
        if pos.x < Fixed::ZERO || pos.y < Fixed::ZERO {
            return None;
        }

        let x = (pos.x / self.cell_size).to_num::<i64>();
        let y = (pos.y / self.cell_size).to_num::<i64>();

        if x < i64::from(self.width) && y < i64::from(self.height) {
            Some(TileCoord::new(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Convert tile coordinates to world position (center of tile).
    #[must_use]
    pub fn tile_center(&self, tile: TileCoord) -> Vec2Fixed {
        let half = self.cell_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(tile.x) * self.cell_size + half,
            Fixed::from_num(tile.y) * self.cell_size + half,
        )
    }

    /// Check if a world position lies on a traversable tile.
    #[must_use]
    pub fn is_position_traversable(&self, pos: Vec2Fixed) -> bool {
        self.world_to_tile(pos)
            .is_some_and(|tile| self.is_traversable(tile))
    }
}

/// Rectangular footprint of a structure, anchored at its top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintSize {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
}

impl FootprintSize {
    /// Create a footprint size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square footprint.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Tiles covered when anchored at `anchor`, row-major.
    #[must_use]
    pub fn tiles_from(self, anchor: TileCoord) -> Vec<TileCoord> {
        (0..self.height)
            .flat_map(|dy| (0..self.width).map(move |dx| TileCoord::new(anchor.x + dx, anchor.y + dy)))
            .collect()
    }
}

/// Which live structure covers which tile.
///
/// Rebuilt from scratch at the start of every tick; dying structures are
/// never indexed.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    tiles: HashMap<TileCoord, EntityId>,
}

impl Occupancy {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner` covers `tile`.
    pub fn insert(&mut self, tile: TileCoord, owner: EntityId) {
        self.tiles.insert(tile, owner);
    }

    /// The structure covering a tile, if any.
    #[must_use]
    pub fn occupant(&self, tile: TileCoord) -> Option<EntityId> {
        self.tiles.get(&tile).copied()
    }

    /// Forget every entry.
    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    /// Number of covered tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Check if no tile is covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
