//! Map generation, tile projection, and spawn placement for Imperion.
//!
//! Everything in this crate is pure: functions take the state they need
//! and a caller-supplied RNG, so results are reproducible from a seed.
//!
//! # Modules
//!
//! - [`error`] -- Error types for map restoration.
//! - [`generator`] -- Seeded Voronoi terrain generation with scattered
//!   crystals and ruins.
//! - [`grid`] -- The 50x50 terrain grid, bounds checks, and row-major
//!   iteration.
//! - [`occupancy`] -- Whether a cell can host a player.
//! - [`projection`] -- The tile grid as a pure function of terrain and
//!   live empires.
//! - [`spawn`] -- Tiered spawn search with an explicit degraded result.
//! - [`yields`] -- Per-biome resource yields.

pub mod error;
pub mod generator;
pub mod grid;
pub mod occupancy;
pub mod projection;
pub mod spawn;
pub mod yields;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use generator::generate;
pub use grid::{MAP_CELLS, MAP_SIZE, TerrainGrid, in_bounds};
pub use occupancy::{can_found, is_valid};
pub use projection::{project, tile_at};
pub use spawn::{SAFE_ZONES, SpawnOutcome, SpawnTier, locate};
pub use yields::resources_for;
