//! Error types for the game simulation.
//!
//! Only authoring/configuration defects and API misuse are errors. Stale
//! path targets, vanished units and unreachable destinations are resolved by
//! the owning system on its next read and never surface here.

use thiserror::Error;

use crate::components::EntityId;
use crate::grid::TileCoord;
use crate::math::Fixed;
use crate::waves::Phase;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    /// The map declares no spawn tiles, so no wave can ever be placed.
    #[error("Map declares no spawn tiles; enemy waves cannot be spawned")]
    NoSpawnTiles,

    /// A declared spawn tile cannot be stood on.
    #[error("Spawn tile {0:?} is not traversable")]
    BlockedSpawnTile(TileCoord),

    /// A range query received a zero or negative range.
    #[error("Attack range must be positive, got {0}")]
    NonPositiveRange(Fixed),

    /// A unit was configured with zero max health.
    #[error("Max health must be positive for {0}")]
    InvalidMaxHealth(String),

    /// A configuration value is out of its valid domain.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// A structure could not be placed.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The turn cycle cannot be advanced from the current phase by request.
    #[error("Cannot advance phase manually during {0:?}")]
    InvalidPhaseTransition(Phase),
}
