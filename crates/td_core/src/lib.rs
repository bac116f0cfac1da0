//! # TD Core
//!
//! Deterministic tactical simulation for a wave-based tower-defense game.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No system randomness (one seeded RNG)
//! - No floating-point positions (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and balance sweeps
//! - Replays from a seed and a list of phase advances
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Navigable tile grid and structure occupancy
//! - [`components`] - Entity component definitions
//! - [`pathfinding`] - A* search and route planning
//! - [`movement`] - Blockage, path following, avoidance and integration
//! - [`combat`] - Mobile and tower attack resolution
//! - [`lifecycle`] - Death and removal
//! - [`waves`] - Turn phases and enemy waves
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod clock;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod grid;
pub mod lifecycle;
pub mod math;
pub mod movement;
pub mod pathfinding;
pub mod simulation;
pub mod waves;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{SimClock, SimTime};
    pub use crate::combat::AttackEvent;
    pub use crate::components::*;
    pub use crate::config::{EnemyProfile, EnemyRoster, SimConfig, WaveConfig};
    pub use crate::error::{GameError, Result};
    pub use crate::grid::{FootprintSize, NavGrid, Terrain, TileCoord, TileInfo};
    pub use crate::lifecycle::DeathEvent;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{Entity, Simulation, StructureSpec, TickEvents};
    pub use crate::waves::{Phase, PhaseChange, WaveMix};
}
