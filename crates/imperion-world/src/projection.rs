//! The tile grid as a pure projection of terrain plus live empires.
//!
//! Nothing writes tiles directly. The grid is rebuilt from scratch each
//! time ownership may have changed, so `tile.owner` is set exactly on the
//! cells where a live empire entity with a claimed owner stands.

use imperion_types::{Biome, Entity, Position, Tile};

use crate::grid::{MAP_SIZE, TerrainGrid, in_bounds};
use crate::yields::resources_for;

/// Build the `[y][x]` tile grid for `terrain` with `entities` overlaid.
///
/// Only empires are projected. Empires outside the grid are skipped.
pub fn project<'a, I>(terrain: &TerrainGrid, entities: I) -> Vec<Vec<Tile>>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut rows: Vec<Vec<Tile>> = (0..MAP_SIZE)
        .map(|y| {
            (0..MAP_SIZE)
                .map(|x| {
                    let position = Position::new(x, y);
                    let biome = terrain.get(position).unwrap_or(Biome::Plains);
                    Tile {
                        x,
                        y,
                        biome,
                        terrain: None,
                        owner: None,
                        resources: resources_for(biome),
                    }
                })
                .collect()
        })
        .collect();

    for entity in entities {
        if !entity.is_empire() || !in_bounds(entity.position) {
            continue;
        }
        if let Some(tile) = tile_mut(&mut rows, entity.position) {
            if tile.biome != Biome::Empire {
                tile.terrain = Some(tile.biome);
            }
            tile.biome = Biome::Empire;
            tile.owner = entity.claimed_owner().cloned();
            tile.resources = resources_for(Biome::Empire);
        }
    }
    rows
}

/// Mutable access to the tile at `position`.
pub fn tile_mut(rows: &mut [Vec<Tile>], position: Position) -> Option<&mut Tile> {
    let x = usize::try_from(position.x).ok()?;
    let y = usize::try_from(position.y).ok()?;
    rows.get_mut(y)?.get_mut(x)
}

/// Shared access to the tile at `position`.
pub fn tile_at(rows: &[Vec<Tile>], position: Position) -> Option<&Tile> {
    let x = usize::try_from(position.x).ok()?;
    let y = usize::try_from(position.y).ok()?;
    rows.get(y)?.get(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imperion_types::{EntityId, EntityKind, PlayerId};

    fn empire(id: &str, owner: Option<&str>, x: i32, y: i32) -> Entity {
        Entity {
            id: EntityId::new(id),
            kind: EntityKind::Empire,
            position: Position::new(x, y),
            owner: owner.map(PlayerId::new),
            level: 1,
            created_at: 0,
            buildings: Vec::new(),
        }
    }

    #[test]
    fn empires_own_their_tile() {
        let terrain = TerrainGrid::filled(Biome::Forest);
        let entities = [empire("e1", Some("p1"), 4, 5)];
        let rows = project(&terrain, &entities);

        let tile = tile_at(&rows, Position::new(4, 5));
        assert_eq!(tile.map(|t| t.biome), Some(Biome::Empire));
        assert_eq!(tile.and_then(|t| t.terrain), Some(Biome::Forest));
        assert_eq!(tile.and_then(|t| t.owner.clone()), Some(PlayerId::new("p1")));

        let owned = rows.iter().flatten().filter(|t| t.owner.is_some()).count();
        assert_eq!(owned, 1);
    }

    #[test]
    fn projection_is_idempotent() {
        let terrain = TerrainGrid::filled(Biome::Desert);
        let entities = [empire("e1", Some("p1"), 0, 0), empire("e2", Some("p2"), 49, 49)];
        assert_eq!(project(&terrain, &entities), project(&terrain, &entities));
    }

    #[test]
    fn units_and_stray_empires_are_not_projected() {
        let terrain = TerrainGrid::filled(Biome::Plains);
        let mut unit = empire("u1", Some("p1"), 1, 1);
        unit.kind = EntityKind::Unit;
        let entities = [unit, empire("e1", Some("p2"), 60, 1)];
        let rows = project(&terrain, &entities);
        assert!(rows.iter().flatten().all(|t| t.biome == Biome::Plains));
    }

    #[test]
    fn neutral_empire_shows_without_owner() {
        let terrain = TerrainGrid::filled(Biome::Plains);
        let entities = [empire("e1", Some("neutral"), 3, 3)];
        let rows = project(&terrain, &entities);
        let tile = tile_at(&rows, Position::new(3, 3));
        assert_eq!(tile.map(|t| t.biome), Some(Biome::Empire));
        assert_eq!(tile.and_then(|t| t.owner.clone()), None);
    }
}
