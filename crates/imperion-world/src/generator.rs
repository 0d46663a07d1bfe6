//! Seeded Voronoi map generation.
//!
//! Generation runs in two passes:
//!
//! 1. Drop [`BIOME_SEEDS`] random seed points, each with a random base
//!    biome, plus [`WATER_SEEDS`] water seeds clustered around one random
//!    point, kept on the grid, so every map has a lake. Each cell takes the biome of
//!    its nearest seed (first seed wins ties).
//! 2. Turn [`FEATURE_PERCENT`] of non-water cells into crystals and the
//!    same share into ruins.
//!
//! Seed coordinates are kept in tenths of a tile so nearest-seed lookups
//! stay in integer arithmetic.

use imperion_types::{Biome, Position};
use rand::Rng;
use tracing::debug;

use crate::grid::{MAP_SIZE, TerrainGrid, positions};

/// Number of randomly placed biome seeds.
pub const BIOME_SEEDS: usize = 15;

/// Number of water seeds in the guaranteed lake cluster.
pub const WATER_SEEDS: usize = 3;

/// Percentage of non-water cells that become crystals (and, separately, ruins).
pub const FEATURE_PERCENT: u32 = 2;

/// Sub-tile resolution of seed coordinates.
const SUBDIVISIONS: i64 = 10;

/// Maximum distance of a lake seed from the cluster centre, in tenths.
const LAKE_SPREAD: i64 = 40;

/// A Voronoi seed in tenth-of-a-tile coordinates.
#[derive(Debug, Clone, Copy)]
struct Seed {
    x: i64,
    y: i64,
    biome: Biome,
}

/// Generate a fresh terrain grid.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> TerrainGrid {
    let extent = i64::from(MAP_SIZE).saturating_mul(SUBDIVISIONS);
    let mut seeds = Vec::with_capacity(BIOME_SEEDS.saturating_add(WATER_SEEDS));

    for _ in 0..BIOME_SEEDS {
        let index = rng.random_range(0..Biome::BASE.len());
        seeds.push(Seed {
            x: rng.random_range(0..extent),
            y: rng.random_range(0..extent),
            biome: Biome::BASE.get(index).copied().unwrap_or(Biome::Plains),
        });
    }

    let last = extent.saturating_sub(1);
    let lake_x = rng.random_range(0..extent);
    let lake_y = rng.random_range(0..extent);
    for _ in 0..WATER_SEEDS {
        seeds.push(Seed {
            x: lake_x
                .saturating_add(rng.random_range(-LAKE_SPREAD..=LAKE_SPREAD))
                .clamp(0, last),
            y: lake_y
                .saturating_add(rng.random_range(-LAKE_SPREAD..=LAKE_SPREAD))
                .clamp(0, last),
            biome: Biome::Water,
        });
    }

    let mut grid = TerrainGrid::filled(Biome::Plains);
    for position in positions() {
        grid.set(position, nearest_biome(&seeds, position));
    }

    let mut features = 0_u32;
    for position in positions() {
        if grid.get(position) == Some(Biome::Water) {
            continue;
        }
        let roll = rng.random_range(0..100_u32);
        if roll < FEATURE_PERCENT {
            grid.set(position, Biome::Crystals);
            features = features.saturating_add(1);
        } else if roll < FEATURE_PERCENT.saturating_mul(2) {
            grid.set(position, Biome::Ruins);
            features = features.saturating_add(1);
        }
    }

    debug!(seeds = seeds.len(), features, "Terrain generated");
    grid
}

/// Biome of the seed nearest to the centre of `position`'s cell.
fn nearest_biome(seeds: &[Seed], position: Position) -> Biome {
    let cx = i64::from(position.x).saturating_mul(SUBDIVISIONS);
    let cy = i64::from(position.y).saturating_mul(SUBDIVISIONS);

    let mut best: Option<(i64, Biome)> = None;
    for seed in seeds {
        let dx = cx.saturating_sub(seed.x);
        let dy = cy.saturating_sub(seed.y);
        let distance = dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy));
        if best.is_none_or(|(closest, _)| distance < closest) {
            best = Some((distance, seed.biome));
        }
    }
    best.map_or(Biome::Plains, |(_, biome)| biome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn same_seed_same_map() {
        let a = generate(&mut StdRng::seed_from_u64(7));
        let b = generate(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = generate(&mut StdRng::seed_from_u64(1));
        let b = generate(&mut StdRng::seed_from_u64(2));
        assert_ne!(a, b);
    }

    #[test]
    fn every_map_has_water_and_no_empires() {
        for seed in 0..10 {
            let grid = generate(&mut StdRng::seed_from_u64(seed));
            assert!(grid.iter().any(|(_, biome)| biome == Biome::Water));
            assert!(grid.iter().all(|(_, biome)| biome != Biome::Empire));
        }
    }

    #[test]
    fn nearest_seed_wins_and_first_wins_ties() {
        let seeds = [
            Seed { x: 0, y: 0, biome: Biome::Snow },
            Seed { x: 20, y: 0, biome: Biome::Desert },
        ];
        assert_eq!(nearest_biome(&seeds, Position::new(0, 0)), Biome::Snow);
        assert_eq!(nearest_biome(&seeds, Position::new(2, 0)), Biome::Desert);
        // (1,0) is exactly between both seeds.
        assert_eq!(nearest_biome(&seeds, Position::new(1, 0)), Biome::Snow);
    }
}
