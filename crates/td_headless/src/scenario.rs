//! Scenario loading and configuration.
//!
//! Scenarios describe a starting position for headless runs: an ASCII map,
//! the defenders' structures, optional pre-placed enemies and the simulation
//! tuning.
//!
//! # Map legend
//!
//! | Char | Tile                         |
//! |------|------------------------------|
//! | `.`  | open, buildable              |
//! | `,`  | rough (double cost)          |
//! | `#`  | blocked                      |
//! | `S`  | open spawn tile              |
//! | `~`  | open, not buildable          |
//! | `$`  | open ore deposit, not buildable |

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use td_core::components::{AttackStats, EnemyKind, Team, UnitKind};
use td_core::config::SimConfig;
use td_core::error::GameError;
use td_core::grid::{FootprintSize, NavGrid, ResourceKind, Terrain, TileCoord, TileInfo};
use td_core::math::{fixed_decimal_serde, Fixed};
use td_core::simulation::{Simulation, StructureSpec};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The ASCII map is malformed.
    #[error("Invalid map: {0}")]
    InvalidMap(String),
    /// The simulation rejected the scenario's content.
    #[error("Scenario rejected by simulation: {0}")]
    Simulation(#[from] GameError),
}

/// Structure archetypes a scenario can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureKind {
    /// The defenders' base.
    Headquarters,
    /// An attacking structure.
    Tower,
    /// A passive fortification.
    Wall,
}

impl From<StructureKind> for UnitKind {
    fn from(kind: StructureKind) -> Self {
        match kind {
            StructureKind::Headquarters => Self::Headquarters,
            StructureKind::Tower => Self::Tower,
            StructureKind::Wall => Self::Wall,
        }
    }
}

/// Attack stats as written in a scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackSetup {
    /// Health removed per hit.
    pub damage: u32,
    /// Reach in tiles.
    #[serde(with = "fixed_decimal_serde")]
    pub range: Fixed,
    /// Milliseconds between hits.
    pub interval_ms: u64,
}

/// A structure present at scenario start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructurePlacement {
    /// What to build.
    pub kind: StructureKind,
    /// Top-left tile of the footprint.
    pub at: (u32, u32),
    /// Side length of the square footprint.
    #[serde(default = "default_size")]
    pub size: u32,
    /// Starting and maximum health.
    pub max_health: u32,
    /// Attack, for towers.
    #[serde(default)]
    pub attack: Option<AttackSetup>,
}

fn default_size() -> u32 {
    1
}

impl StructurePlacement {
    fn to_spec(&self) -> Result<StructureSpec, ScenarioError> {
        let attack = self
            .attack
            .map(|a| AttackStats::new(a.damage, a.range, a.interval_ms))
            .transpose()?;
        Ok(StructureSpec {
            kind: self.kind.into(),
            team: Team::Defenders,
            anchor: TileCoord::new(self.at.0, self.at.1),
            size: FootprintSize::square(self.size),
            max_health: self.max_health,
            attack,
        })
    }
}

/// An enemy already on the field at scenario start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyPlacement {
    /// Archetype.
    pub kind: EnemyKind,
    /// Tile the unit starts on.
    pub at: (u32, u32),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map rows, top to bottom. See the module docs for the legend.
    pub map: Vec<String>,
    /// Structures placed before the first tick.
    #[serde(default)]
    pub structures: Vec<StructurePlacement>,
    /// Enemies placed before the first tick.
    #[serde(default)]
    pub enemies: Vec<EnemyPlacement>,
    /// Simulation tuning.
    #[serde(default)]
    pub config: SimConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::outpost()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A small fortified base: spawn column on the left, headquarters on the
    /// right, two towers and a wall in between.
    #[must_use]
    pub fn outpost() -> Self {
        let map = [
            "S...............",
            "S....#.....~~~..",
            "S....#..,,.~~~..",
            "S.......,,......",
            "S....#..........",
            "S....#...$$.....",
        ];
        let tower = |x, y| StructurePlacement {
            kind: StructureKind::Tower,
            at: (x, y),
            size: 1,
            max_health: 200,
            attack: Some(AttackSetup {
                damage: 4,
                range: Fixed::from_num(3),
                interval_ms: 600,
            }),
        };
        Self {
            name: "Outpost".to_string(),
            description: "Two towers and a wall guarding a 2x2 headquarters".to_string(),
            map: map.iter().map(|row| (*row).to_string()).collect(),
            structures: vec![
                StructurePlacement {
                    kind: StructureKind::Headquarters,
                    at: (14, 2),
                    size: 2,
                    max_health: 1_000,
                    attack: None,
                },
                tower(10, 1),
                tower(10, 4),
                StructurePlacement {
                    kind: StructureKind::Wall,
                    at: (12, 3),
                    size: 1,
                    max_health: 120,
                    attack: None,
                },
            ],
            enemies: Vec::new(),
            config: SimConfig::default(),
        }
    }

    /// Build the navigation grid from the ASCII map.
    pub fn build_grid(&self) -> Result<NavGrid, ScenarioError> {
        let height = u32::try_from(self.map.len())
            .map_err(|_| ScenarioError::InvalidMap("too many rows".into()))?;
        let first = self
            .map
            .first()
            .ok_or_else(|| ScenarioError::InvalidMap("map has no rows".into()))?;
        let width = u32::try_from(first.chars().count())
            .map_err(|_| ScenarioError::InvalidMap("row too wide".into()))?;
        if width == 0 {
            return Err(ScenarioError::InvalidMap("map rows are empty".into()));
        }

        let mut grid = NavGrid::new(width, height, self.config.cell_size);
        for (y, row) in (0u32..).zip(&self.map) {
            if row.chars().count() != width as usize {
                return Err(ScenarioError::InvalidMap(format!(
                    "row {y} has {} tiles, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, ch) in (0u32..).zip(row.chars()) {
                let info = tile_info(ch).ok_or_else(|| {
                    ScenarioError::InvalidMap(format!("unknown tile '{ch}' at ({x}, {y})"))
                })?;
                grid.set_tile(TileCoord::new(x, y), info);
            }
        }
        Ok(grid)
    }

    /// Build a ready-to-run simulation.
    ///
    /// `seed` overrides the seed from the scenario's config.
    pub fn build_simulation(&self, seed: Option<u64>) -> Result<Simulation, ScenarioError> {
        self.config.validate()?;
        let grid = self.build_grid()?;
        let mut config = self.config.clone();
        if let Some(seed) = seed {
            config.seed = seed;
        }

        let mut sim = Simulation::new(grid, config)?;
        for placement in &self.structures {
            sim.place_structure(placement.to_spec()?)?;
        }
        for enemy in &self.enemies {
            sim.spawn_enemy(enemy.kind, TileCoord::new(enemy.at.0, enemy.at.1))?;
        }
        tracing::debug!(
            scenario = %self.name,
            structures = self.structures.len(),
            enemies = self.enemies.len(),
            "scenario built"
        );
        Ok(sim)
    }
}

/// Load a standalone RON [`SimConfig`], e.g. to replace a scenario's tuning.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SimConfig, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(SimConfig::from_ron_str(&contents)?)
}

fn tile_info(ch: char) -> Option<TileInfo> {
    let info = match ch {
        '.' => TileInfo::OPEN,
        ',' => TileInfo {
            terrain: Terrain::Rough,
            ..TileInfo::OPEN
        },
        '#' => TileInfo {
            terrain: Terrain::Blocked,
            buildable: false,
            ..TileInfo::OPEN
        },
        'S' => TileInfo {
            buildable: false,
            spawn_point: true,
            ..TileInfo::OPEN
        },
        '~' => TileInfo {
            buildable: false,
            ..TileInfo::OPEN
        },
        '$' => TileInfo {
            buildable: false,
            resource: Some(ResourceKind::Ore),
            ..TileInfo::OPEN
        },
        _ => return None,
    };
    Some(info)
}
