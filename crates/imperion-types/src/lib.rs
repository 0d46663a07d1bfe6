//! Shared type definitions for the Imperion world-state engine.
//!
//! This crate is the single source of truth for the records exchanged
//! between the engine, its persistence layer, and connected clients.
//! Client-facing records flow to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe string wrappers for player, entity, and room ids
//! - [`enums`] -- Biomes, resources, entity and building kinds
//! - [`structs`] -- Players, entities, tiles, and persisted snapshots
//! - [`actions`] -- Action requests, stamped actions, and deltas
//! - [`time`] -- Epoch-millisecond clock helper

pub mod actions;
pub mod enums;
pub mod ids;
pub mod structs;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use actions::{
    ActionKind, ActionRequest, AttackPayload, BuildPayload, ChatPayload, Delta, ExplorePayload,
    MovePayload, StampedAction,
};
pub use enums::{Biome, BuildTarget, BuildingType, EntityKind, PlayerKind, Resource};
pub use ids::{EntityId, PlayerId, RoomId};
pub use structs::{
    Building, CombatRecord, Entity, ExplorationRecord, IdentityFile, NEUTRAL_OWNER,
    PersistentSnapshot, Player, PlayerRecord, Position, PositionRecord, RoomSnapshot, Tile,
};
pub use time::now_ms;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for client-facing records.

    #[test]
    fn export_bindings() {
        // Files are written to the `bindings/` directory relative to the
        // crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::PlayerId::export_all();
        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::RoomId::export_all();

        // Enums
        let _ = crate::enums::Biome::export_all();
        let _ = crate::enums::Resource::export_all();
        let _ = crate::enums::EntityKind::export_all();
        let _ = crate::enums::PlayerKind::export_all();
        let _ = crate::enums::BuildingType::export_all();

        // Structs
        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::Tile::export_all();
        let _ = crate::structs::Building::export_all();
        let _ = crate::structs::Entity::export_all();
        let _ = crate::structs::Player::export_all();
        let _ = crate::structs::PositionRecord::export_all();
        let _ = crate::structs::PlayerRecord::export_all();
    }
}
