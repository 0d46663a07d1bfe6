//! Spawn and placement validity.

use std::collections::BTreeMap;

use imperion_types::{Entity, EntityId, Player, PlayerId, Position};

use crate::grid::in_bounds;

/// Whether `position` may host a new or returning player owned by `owner`.
///
/// A position is invalid when it is off the grid, when any live player
/// stands on it, or when an entity occupies it. The one exception: an
/// empire owned by `owner` does not block, so a returning owner can stand
/// on its own empire tile.
pub fn is_valid(
    position: Position,
    owner: Option<&PlayerId>,
    players: &BTreeMap<PlayerId, Player>,
    entities: &BTreeMap<EntityId, Entity>,
) -> bool {
    if !in_bounds(position) {
        return false;
    }
    if players.values().any(|player| player.position == position) {
        return false;
    }
    entities
        .values()
        .filter(|entity| entity.position == position)
        .all(|entity| entity.is_empire() && owner.is_some_and(|id| entity.is_owned_by(id)))
}

/// Whether `founder` may found a new empire at `position`.
///
/// Any entity on the cell blocks, as does any other live player. The
/// founder may found where it stands.
pub fn can_found(
    position: Position,
    founder: &PlayerId,
    players: &BTreeMap<PlayerId, Player>,
    entities: &BTreeMap<EntityId, Entity>,
) -> bool {
    in_bounds(position)
        && !players.values().any(|player| player.position == position && player.id != *founder)
        && !entities.values().any(|entity| entity.position == position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imperion_types::{EntityKind, PlayerKind};

    fn player(id: &str, x: i32, y: i32) -> Player {
        Player {
            id: PlayerId::new(id),
            name: id.to_owned(),
            kind: PlayerKind::Player,
            position: Position::new(x, y),
            color: String::from("#000000"),
            joined_at: 0,
            last_activity: 0,
            is_admin: false,
            is_npc: false,
            last_saved_position: Position::new(x, y),
        }
    }

    fn entity(id: &str, kind: EntityKind, owner: &str, x: i32, y: i32) -> Entity {
        Entity {
            id: EntityId::new(id),
            kind,
            position: Position::new(x, y),
            owner: Some(PlayerId::new(owner)),
            level: 1,
            created_at: 0,
            buildings: Vec::new(),
        }
    }

    #[test]
    fn out_of_bounds_is_invalid() {
        let (players, entities) = (BTreeMap::new(), BTreeMap::new());
        assert!(!is_valid(Position::new(50, 0), None, &players, &entities));
        assert!(!is_valid(Position::new(0, -1), None, &players, &entities));
        assert!(is_valid(Position::new(49, 49), None, &players, &entities));
    }

    #[test]
    fn players_block_their_cell() {
        let mut players = BTreeMap::new();
        players.insert(PlayerId::new("p1"), player("p1", 5, 5));
        let entities = BTreeMap::new();
        let owner = PlayerId::new("p1");
        assert!(!is_valid(Position::new(5, 5), Some(&owner), &players, &entities));
        assert!(is_valid(Position::new(5, 6), None, &players, &entities));
    }

    #[test]
    fn own_empire_does_not_block_its_owner() {
        let players = BTreeMap::new();
        let mut entities = BTreeMap::new();
        entities.insert(EntityId::new("e1"), entity("e1", EntityKind::Empire, "p1", 2, 2));
        let (owner, stranger) = (PlayerId::new("p1"), PlayerId::new("p2"));
        assert!(is_valid(Position::new(2, 2), Some(&owner), &players, &entities));
        assert!(!is_valid(Position::new(2, 2), Some(&stranger), &players, &entities));
        assert!(!is_valid(Position::new(2, 2), None, &players, &entities));
    }

    #[test]
    fn own_units_still_block() {
        let players = BTreeMap::new();
        let mut entities = BTreeMap::new();
        entities.insert(EntityId::new("u1"), entity("u1", EntityKind::Unit, "p1", 8, 1));
        let owner = PlayerId::new("p1");
        assert!(!is_valid(Position::new(8, 1), Some(&owner), &players, &entities));
    }

    #[test]
    fn founding_is_blocked_by_any_entity_or_other_player() {
        let mut players = BTreeMap::new();
        players.insert(PlayerId::new("p1"), player("p1", 4, 4));
        players.insert(PlayerId::new("p2"), player("p2", 6, 6));
        let mut entities = BTreeMap::new();
        entities.insert(EntityId::new("e9"), entity("e9", EntityKind::Empire, "p9", 1, 1));
        let founder = PlayerId::new("p1");

        assert!(can_found(Position::new(4, 4), &founder, &players, &entities));
        assert!(!can_found(Position::new(6, 6), &founder, &players, &entities));
        assert!(!can_found(Position::new(1, 1), &founder, &players, &entities));
        assert!(!can_found(Position::new(50, 1), &founder, &players, &entities));
    }
}
