//! Enumeration types for the Imperion world-state engine.
//!
//! All enums serialize as lowercase strings so persisted snapshots and
//! client payloads stay human-readable.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// The type of a map tile.
///
/// The first seven variants are the Voronoi base biomes. `Crystals` and
/// `Ruins` are scattered features placed on top of non-water terrain.
/// `Empire` never appears in generated terrain; it only exists in the
/// projected tile grid where a live empire entity stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Biome {
    /// Open grassland.
    Plains,
    /// Rocky highland.
    Mountain,
    /// Arid sand.
    Desert,
    /// Frozen tundra.
    Snow,
    /// Dense woodland.
    Forest,
    /// Wetland.
    Swamp,
    /// Lakes and seas. Never receives scattered features.
    Water,
    /// Crystal outcrop, rich in imperion.
    Crystals,
    /// Ancient ruins.
    Ruins,
    /// A tile occupied by a live empire.
    #[serde(alias = "city", alias = "ciudad")]
    Empire,
}

impl Biome {
    /// The base biomes a Voronoi seed can take, in generation order.
    pub const BASE: [Self; 7] = [
        Self::Plains,
        Self::Mountain,
        Self::Desert,
        Self::Snow,
        Self::Forest,
        Self::Swamp,
        Self::Water,
    ];
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A resource a tile can yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Resource {
    /// Food for population growth.
    Food,
    /// Lumber.
    Wood,
    /// Quarried stone.
    Stone,
    /// Smelted metal.
    Metal,
    /// The rare currency resource.
    Imperion,
}

// ---------------------------------------------------------------------------
// Entities and players
// ---------------------------------------------------------------------------

/// The kind of an entity stored in the entity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum EntityKind {
    /// The single persistent territorial entity a player owns.
    #[serde(alias = "city", alias = "ciudad")]
    Empire,
    /// A mobile unit. Units never project onto the tile grid.
    Unit,
}

/// Whether a player record belongs to a human or a scripted participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum PlayerKind {
    /// A connected human player.
    #[default]
    Player,
    /// A server-driven participant.
    Npc,
}

// ---------------------------------------------------------------------------
// Buildings
// ---------------------------------------------------------------------------

/// Internal buildings that live inside an empire rather than on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum BuildingType {
    /// Trains troops.
    #[serde(alias = "cuartel")]
    Barracks,
    /// Trades resources.
    #[serde(alias = "mercado")]
    Market,
    /// Defensive keep.
    #[serde(alias = "castillo")]
    Castle,
    /// Housing.
    #[serde(alias = "casa")]
    House,
    /// Produces food.
    #[serde(alias = "granja")]
    Farm,
    /// Produces stone and metal.
    #[serde(alias = "mina")]
    Mine,
}

impl BuildingType {
    /// Hit points of a level-1 building of this type.
    pub const fn base_hp(self) -> u32 {
        match self {
            Self::Barracks => 1000,
            Self::Market => 800,
            Self::Castle => 1500,
            Self::House => 500,
            Self::Farm => 600,
            Self::Mine => 700,
        }
    }

    /// Hit points at the given level, saturating at `u32::MAX`.
    pub const fn hp_at(self, level: u32) -> u32 {
        self.base_hp().saturating_mul(level)
    }
}

/// What a `build` action asks for.
///
/// Serializes as a single string: `"empire"` or the building type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    /// Found (or level up) the owner's empire.
    #[serde(alias = "city", alias = "ciudad")]
    Empire,
    /// Add (or level up) an internal building in the owner's empire.
    #[serde(untagged)]
    Building(BuildingType),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_city_names_map_to_empire() {
        let biome: Biome = serde_json::from_str("\"ciudad\"").unwrap_or(Biome::Water);
        assert_eq!(biome, Biome::Empire);
        let kind: EntityKind = serde_json::from_str("\"city\"").unwrap_or(EntityKind::Unit);
        assert_eq!(kind, EntityKind::Empire);
    }

    #[test]
    fn building_hp_scales_with_level() {
        assert_eq!(BuildingType::Castle.hp_at(1), 1500);
        assert_eq!(BuildingType::House.hp_at(3), 1500);
        assert_eq!(BuildingType::Barracks.hp_at(u32::MAX), u32::MAX);
    }

    #[test]
    fn build_target_parses_both_shapes() {
        let empire: Option<BuildTarget> = serde_json::from_str("\"empire\"").ok();
        assert_eq!(empire, Some(BuildTarget::Empire));
        let farm: Option<BuildTarget> = serde_json::from_str("\"farm\"").ok();
        assert_eq!(farm, Some(BuildTarget::Building(BuildingType::Farm)));
        let bogus: Option<BuildTarget> = serde_json::from_str("\"moat\"").ok();
        assert_eq!(bogus, None);
    }
}
