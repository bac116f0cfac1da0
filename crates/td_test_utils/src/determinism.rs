//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and balance sweeps rely on a run being a pure function of its
//! grid, config and phase advances. Sources of non-determinism include:
//!
//! - **Floating-point math**: positions and speeds use fixed-point
//!   arithmetic via [`td_core::math::Fixed`].
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Systems always iterate in sorted entity ID order.
//!
//! - **System randomness**: spawn tiles are drawn from a `ChaCha8Rng`
//!   seeded from the config.
//!
//! - **Wall-clock time**: cooldowns and timers read the simulation clock.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (A*, waves, etc.)
//! 2. **Property tests**: Random grids must still produce deterministic routes
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::thread;

use td_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Advance a simulation by one tick, panicking on configuration defects.
///
/// # Panics
///
/// Panics if the tick fails.
pub fn step(sim: &mut Simulation) {
    if let Err(err) = sim.tick() {
        panic!("tick {} failed: {err}", sim.clock().tick());
    }
}

/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(2, num_ticks, &setup_fn, step, Simulation::state_hash).is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if any simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        step(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        step(&mut sim1);
        step(&mut sim2);

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Proptest strategies for route-planning tests.
pub mod strategies {
    use proptest::prelude::*;
    use td_core::grid::{NavGrid, Terrain, TileCoord};
    use td_core::math::Fixed;

    /// Generate a tile inside a `size`x`size` grid.
    pub fn arb_tile(size: u32) -> impl Strategy<Value = TileCoord> {
        (0..size, 0..size).prop_map(|(x, y)| TileCoord::new(x, y))
    }

    /// Generate a `size`x`size` grid with roughly 20% blocked and 10% rough
    /// tiles.
    pub fn arb_terrain_grid(size: u32) -> impl Strategy<Value = NavGrid> {
        proptest::collection::vec(0u8..10, (size * size) as usize).prop_map(move |cells| {
            let mut grid = NavGrid::new(size, size, Fixed::ONE);
            for (i, cell) in (0u32..).zip(cells) {
                let terrain = match cell {
                    0..=1 => Terrain::Blocked,
                    2 => Terrain::Rough,
                    _ => Terrain::Open,
                };
                grid.set_terrain(TileCoord::new(i % size, i / size), terrain);
            }
            grid
        })
    }
}
