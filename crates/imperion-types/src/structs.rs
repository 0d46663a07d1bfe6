//! Core record types: players, entities, tiles, and persisted snapshots.
//!
//! Field names serialize in camelCase and every timestamp is an epoch
//! millisecond `i64`, matching the on-disk snapshot and identity formats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Biome, BuildingType, EntityKind, PlayerKind, Resource};
use crate::ids::{EntityId, PlayerId, RoomId};

/// Owner value that marks an empire as unclaimed. Such empires are orphans.
pub const NEUTRAL_OWNER: &str = "neutral";

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// An integer grid coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`, computed in `i64` so it
    /// cannot overflow for any pair of `i32` coordinates.
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x).saturating_sub(i64::from(other.x));
        let dy = i64::from(self.y).saturating_sub(i64::from(other.y));
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// One cell of the projected tile grid.
///
/// `owner` is set only on [`Biome::Empire`] tiles and is always derived
/// from the entity map, never written independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Tile {
    /// Column.
    #[serde(default)]
    pub x: i32,
    /// Row.
    #[serde(default)]
    pub y: i32,
    /// Biome shown on this tile.
    #[serde(rename = "type")]
    pub biome: Biome,
    /// Terrain under an empire tile. Absent on every other tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub terrain: Option<Biome>,
    /// Owning player for empire tiles.
    #[serde(default)]
    pub owner: Option<PlayerId>,
    /// Per-turn yields of this tile.
    #[serde(default)]
    pub resources: BTreeMap<Resource, u32>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A building inside an empire. Buildings have no map position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Building {
    /// Unique building identifier.
    pub id: String,
    /// Building type. At most one building per type per empire.
    #[serde(rename = "type")]
    pub kind: BuildingType,
    /// Player who built it.
    pub owner: PlayerId,
    /// Current level (at least 1).
    pub level: u32,
    /// Hit points, always `kind.hp_at(level)`.
    pub hp: u32,
    /// Creation time.
    pub created_at: i64,
}

/// A live entity in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Entity {
    /// Unique entity identifier.
    pub id: EntityId,
    /// Entity kind.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Grid position.
    pub position: Position,
    /// Owning player. `None`, empty, or [`NEUTRAL_OWNER`] marks an orphan.
    #[serde(default)]
    pub owner: Option<PlayerId>,
    /// Empire level (at least 1).
    pub level: u32,
    /// Creation time.
    pub created_at: i64,
    /// Internal buildings (empires only).
    #[serde(default)]
    pub buildings: Vec<Building>,
}

impl Entity {
    /// Whether this entity is an empire.
    pub fn is_empire(&self) -> bool {
        self.kind == EntityKind::Empire
    }

    /// Whether `player` owns this entity.
    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        self.owner.as_ref() == Some(player)
    }

    /// The owner, unless it is missing, empty, or the neutral sentinel.
    pub fn claimed_owner(&self) -> Option<&PlayerId> {
        self.owner
            .as_ref()
            .filter(|owner| !owner.as_str().is_empty() && owner.as_str() != NEUTRAL_OWNER)
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// A live player in a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name, case-insensitively unique among live players.
    pub name: String,
    /// Human or NPC.
    #[serde(rename = "type")]
    pub kind: PlayerKind,
    /// Current grid position.
    pub position: Position,
    /// `#rrggbb` color derived from the id.
    pub color: String,
    /// When the player joined this session.
    pub joined_at: i64,
    /// Last accepted activity.
    pub last_activity: i64,
    /// Administrative privileges.
    pub is_admin: bool,
    /// Scripted participant flag.
    pub is_npc: bool,
    /// Position last committed to persistence; the move throttle baseline.
    pub last_saved_position: Position,
}

/// A persisted last-known position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionRecord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// When the position was saved.
    pub timestamp: i64,
}

impl PositionRecord {
    /// Record `position` as saved at `timestamp`.
    pub const fn new(position: Position, timestamp: i64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            timestamp,
        }
    }

    /// The recorded coordinate.
    pub const fn position(self) -> Position {
        Position::new(self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Activity logs
// ---------------------------------------------------------------------------

/// One recorded attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatRecord {
    /// Record identifier.
    pub id: String,
    /// Attacking player.
    pub attacker: PlayerId,
    /// Target reference as supplied by the caller.
    pub target: String,
    /// Attack type as supplied by the caller.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Damage dealt.
    pub damage: u32,
    /// When the attack was processed.
    pub timestamp: i64,
}

/// One recorded exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationRecord {
    /// Record identifier.
    pub id: String,
    /// Exploring player.
    pub player_id: PlayerId,
    /// Explored coordinate.
    pub position: Position,
    /// Whatever the caller reported as discovered.
    pub discovered: serde_json::Value,
    /// When the exploration was processed.
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Durable projection of a world, as written to the snapshot file.
///
/// `map_data` is indexed `[y][x]`. Entities and positions are stored as
/// `[id, record]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentSnapshot {
    /// The projected tile grid, if a map has been generated.
    #[serde(default)]
    pub map_data: Option<Vec<Vec<Tile>>>,
    /// Every live entity.
    #[serde(default)]
    pub entities: Vec<(EntityId, Entity)>,
    /// Last-known player positions.
    #[serde(default)]
    pub player_positions: Vec<(PlayerId, PositionRecord)>,
    /// When the snapshot was taken.
    #[serde(default)]
    pub last_save: i64,
}

/// Point-in-time view of a room handed to newly connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room the snapshot belongs to.
    pub room_id: RoomId,
    /// Live players.
    pub players: Vec<Player>,
    /// Live entities.
    pub entities: Vec<Entity>,
    /// Time of the last accepted action.
    pub timestamp: i64,
    /// Version counter, bumped once per accepted action.
    pub version: u64,
}

// ---------------------------------------------------------------------------
// Identity store
// ---------------------------------------------------------------------------

/// A durable player identity, kept across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PlayerRecord {
    /// Stable identifier.
    pub id: PlayerId,
    /// Last known display name.
    pub name: String,
    /// Human or NPC.
    #[serde(rename = "type", default)]
    pub kind: PlayerKind,
    /// First registration time.
    #[serde(default)]
    pub created_at: i64,
    /// Last time the record was written.
    #[serde(default)]
    pub last_activity: i64,
}

/// Contents of the identity store file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFile {
    /// Every known identity.
    #[serde(default)]
    pub players: Vec<PlayerRecord>,
    /// When the file was last written.
    #[serde(default)]
    pub last_update: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_squared_is_symmetric() {
        let a = Position::new(3, 4);
        let b = Position::new(0, 0);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(b.distance_squared(a), 25);
        assert_eq!(a.distance_squared(a), 0);
    }

    #[test]
    fn neutral_and_empty_owners_are_unclaimed() {
        let mut entity = Entity {
            id: EntityId::new("empire_1_a"),
            kind: EntityKind::Empire,
            position: Position::new(1, 1),
            owner: Some(PlayerId::new(NEUTRAL_OWNER)),
            level: 1,
            created_at: 0,
            buildings: Vec::new(),
        };
        assert!(entity.claimed_owner().is_none());
        entity.owner = Some(PlayerId::new(""));
        assert!(entity.claimed_owner().is_none());
        entity.owner = None;
        assert!(entity.claimed_owner().is_none());
        entity.owner = Some(PlayerId::new("p1"));
        assert_eq!(entity.claimed_owner(), Some(&PlayerId::new("p1")));
    }

    #[test]
    fn snapshot_uses_pair_encoding() {
        let snapshot = PersistentSnapshot {
            map_data: None,
            entities: Vec::new(),
            player_positions: vec![(
                PlayerId::new("p1"),
                PositionRecord::new(Position::new(2, 3), 99),
            )],
            last_save: 100,
        };
        let json = serde_json::to_value(&snapshot).unwrap_or_default();
        assert_eq!(
            json["playerPositions"][0],
            serde_json::json!(["p1", {"x": 2, "y": 3, "timestamp": 99}])
        );
        assert_eq!(json["lastSave"], 100);
    }

    #[test]
    fn identity_file_tolerates_missing_fields() {
        let file: IdentityFile =
            serde_json::from_str(r#"{"players":[{"id":"p1","name":"Aria"}]}"#).unwrap_or_default();
        assert_eq!(file.players.len(), 1);
        assert_eq!(file.last_update, 0);
    }
}
