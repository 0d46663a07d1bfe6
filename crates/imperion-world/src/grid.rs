//! The fixed-size terrain grid.
//!
//! Terrain is what the generator produced: base biomes plus scattered
//! crystals and ruins. It never contains [`Biome::Empire`]; empire tiles
//! exist only in the projection built by [`crate::projection`].

use imperion_types::{Biome, Position, Tile};

use crate::error::WorldError;

/// Edge length of the square map, in tiles.
pub const MAP_SIZE: i32 = 50;

/// [`MAP_SIZE`] as a `usize`, for container sizing.
pub const MAP_CELLS: usize = 50;

/// Whether `position` lies inside `[0, MAP_SIZE)` on both axes.
pub const fn in_bounds(position: Position) -> bool {
    position.x >= 0 && position.x < MAP_SIZE && position.y >= 0 && position.y < MAP_SIZE
}

/// Row-major index of `position`, or `None` if it is out of bounds.
fn cell_index(position: Position) -> Option<usize> {
    if !in_bounds(position) {
        return None;
    }
    let x = usize::try_from(position.x).ok()?;
    let y = usize::try_from(position.y).ok()?;
    y.checked_mul(MAP_CELLS)?.checked_add(x)
}

/// Every in-bounds position in row-major order (`y` outer, `x` inner).
pub fn positions() -> impl Iterator<Item = Position> {
    (0..MAP_SIZE).flat_map(|y| (0..MAP_SIZE).map(move |x| Position::new(x, y)))
}

/// A `MAP_SIZE` x `MAP_SIZE` grid of terrain biomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainGrid {
    /// Row-major cells.
    cells: Vec<Biome>,
}

impl TerrainGrid {
    /// A grid where every cell has the same biome.
    pub fn filled(biome: Biome) -> Self {
        Self {
            cells: vec![biome; MAP_CELLS.saturating_mul(MAP_CELLS)],
        }
    }

    /// Rebuild terrain from a persisted tile grid indexed `[y][x]`.
    ///
    /// Empire tiles give back the terrain recorded under them. Empire
    /// tiles saved without it fall back to plains.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MalformedMap`] if the grid is not
    /// `MAP_SIZE` x `MAP_SIZE`.
    pub fn from_tiles(rows: &[Vec<Tile>]) -> Result<Self, WorldError> {
        let malformed = |columns: usize| WorldError::MalformedMap {
            rows: rows.len(),
            columns,
            expected: MAP_CELLS,
        };
        if rows.len() != MAP_CELLS {
            return Err(malformed(rows.first().map_or(0, Vec::len)));
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != MAP_CELLS) {
            return Err(malformed(bad.len()));
        }

        let cells = rows
            .iter()
            .flatten()
            .map(|tile| match tile.biome {
                Biome::Empire => tile
                    .terrain
                    .filter(|&under| under != Biome::Empire)
                    .unwrap_or(Biome::Plains),
                other => other,
            })
            .collect();
        Ok(Self { cells })
    }

    /// Biome at `position`, or `None` if out of bounds.
    pub fn get(&self, position: Position) -> Option<Biome> {
        cell_index(position).and_then(|i| self.cells.get(i).copied())
    }

    /// Overwrite the biome at `position`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, position: Position, biome: Biome) {
        if let Some(cell) = cell_index(position).and_then(|i| self.cells.get_mut(i)) {
            *cell = biome;
        }
    }

    /// Iterate `(position, biome)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, Biome)> + '_ {
        positions().zip(self.cells.iter().copied())
    }
}
