//! Action processing: stamp, dispatch by kind, log.
//!
//! Handlers never fail. A request that cannot apply (unknown player, bad
//! coordinates, nothing to upgrade) yields an [`ActionOutcome`] describing
//! why, and the action is still sequenced and logged so every client sees
//! the same ordered stream.

use std::collections::VecDeque;

use imperion_types::{
    ActionKind, ActionRequest, AttackPayload, BuildPayload, BuildTarget, Building, BuildingType,
    ChatPayload, CombatRecord, ExplorationRecord, ExplorePayload, MovePayload, PlayerId, Position,
    PositionRecord, now_ms,
};
use imperion_world::{can_found, in_bounds};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::world::World;

/// Minimum time between two log lines about unrecognized actions.
const UNRECOGNIZED_LOG_INTERVAL_MS: i64 = 30_000;

/// Why an action had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// The acting player is not live in this world.
    UnknownPlayer,
    /// The named entity does not exist.
    UnknownEntity,
    /// The target coordinate is off the grid.
    OutOfBounds,
    /// A new empire was requested without coordinates.
    MissingPosition,
    /// The target cell already holds an entity or another player.
    Occupied,
    /// A building was requested by a player without an empire.
    NoEmpire,
    /// The action kind or payload was not understood.
    Unrecognized,
}

/// What processing did to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionOutcome {
    /// State changed.
    Applied,
    /// Accepted, but nothing needed to change.
    Unchanged,
    /// Not applied.
    Rejected(RejectReason),
}

/// Sequencing result of [`World::process_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionReceipt {
    /// Sequence assigned to the action.
    pub sequence: u64,
    /// Effect of the action.
    pub outcome: ActionOutcome,
}

impl World {
    /// Stamp, apply, and log one action.
    pub fn process_action(&mut self, request: ActionRequest) -> ActionReceipt {
        let now = now_ms();
        let stamped = self.log.stamp(request, now);
        let outcome = self.dispatch(&stamped.request, now);
        let sequence = stamped.sequence;
        self.log.record(stamped);
        ActionReceipt { sequence, outcome }
    }

    fn dispatch(&mut self, request: &ActionRequest, now: i64) -> ActionOutcome {
        let player_id = &request.player_id;
        match &request.kind {
            ActionKind::Move(payload) => self.handle_move(player_id, payload, now),
            ActionKind::Build(payload) => self.handle_build(player_id, payload, now),
            ActionKind::Chat(payload) => self.handle_chat(player_id, payload, now),
            ActionKind::Attack(payload) => self.handle_attack(player_id, payload, now),
            ActionKind::Explore(payload) => self.handle_explore(player_id, payload, now),
            ActionKind::Resources(_) => ActionOutcome::Unchanged,
            ActionKind::Unrecognized { kind, .. } => {
                self.note_unrecognized(kind, player_id, now);
                ActionOutcome::Rejected(RejectReason::Unrecognized)
            }
        }
    }

    // -----------------------------------------------------------------------
    // move
    // -----------------------------------------------------------------------

    fn handle_move(
        &mut self,
        player_id: &PlayerId,
        payload: &MovePayload,
        now: i64,
    ) -> ActionOutcome {
        let target = payload.target();
        if !in_bounds(target) {
            debug!(player_id = %player_id, x = target.x, y = target.y, "Move target off the grid");
            return ActionOutcome::Rejected(RejectReason::OutOfBounds);
        }

        if let Some(entity_id) = &payload.entity_id {
            let Some(entity) = self.entities.get_mut(entity_id) else {
                return ActionOutcome::Rejected(RejectReason::UnknownEntity);
            };
            if entity.position == target {
                return ActionOutcome::Unchanged;
            }
            entity.position = target;
            if entity.is_empire() {
                self.sync_entities_to_map();
            }
            self.request_save();
            return ActionOutcome::Applied;
        }

        let Some(player) = self.players.get_mut(player_id) else {
            return ActionOutcome::Rejected(RejectReason::UnknownPlayer);
        };
        player.last_activity = now;
        // Anti-jitter: only commit moves of more than one tile.
        if target.distance_squared(player.last_saved_position) <= 1 {
            return ActionOutcome::Unchanged;
        }
        player.position = target;
        player.last_saved_position = target;
        self.positions
            .insert(player_id.clone(), PositionRecord::new(target, now));
        self.request_save();
        ActionOutcome::Applied
    }

    // -----------------------------------------------------------------------
    // build
    // -----------------------------------------------------------------------

    fn handle_build(
        &mut self,
        player_id: &PlayerId,
        payload: &BuildPayload,
        now: i64,
    ) -> ActionOutcome {
        let Some(name) = self.players.get(player_id).map(|p| p.name.clone()) else {
            return ActionOutcome::Rejected(RejectReason::UnknownPlayer);
        };
        let level = payload.level.max(1);
        match payload.target {
            BuildTarget::Empire => {
                self.build_empire(player_id, &name, payload.position(), level, now)
            }
            BuildTarget::Building(kind) => self.build_structure(player_id, kind, level, now),
        }
    }

    fn build_empire(
        &mut self,
        player_id: &PlayerId,
        name: &str,
        position: Option<Position>,
        level: u32,
        now: i64,
    ) -> ActionOutcome {
        if let Some(empire) = self
            .entities
            .values_mut()
            .find(|entity| entity.is_empire() && entity.is_owned_by(player_id))
        {
            if level <= empire.level {
                return ActionOutcome::Unchanged;
            }
            debug!(empire_id = %empire.id, from = empire.level, to = level, "Empire levelled up");
            empire.level = level;
            self.request_save();
            return ActionOutcome::Applied;
        }

        let Some(position) = position else {
            return ActionOutcome::Rejected(RejectReason::MissingPosition);
        };
        if !in_bounds(position) {
            return ActionOutcome::Rejected(RejectReason::OutOfBounds);
        }
        if !can_found(position, player_id, &self.players, &self.entities) {
            return ActionOutcome::Rejected(RejectReason::Occupied);
        }
        let empire_id = self.found_empire(player_id, name, position, level, now);
        info!(
            player_id = %player_id,
            empire_id = %empire_id,
            x = position.x,
            y = position.y,
            "Empire founded"
        );
        self.sync_entities_to_map();
        self.request_save();
        ActionOutcome::Applied
    }

    fn build_structure(
        &mut self,
        player_id: &PlayerId,
        kind: BuildingType,
        level: u32,
        now: i64,
    ) -> ActionOutcome {
        let Some(empire) = self
            .entities
            .values_mut()
            .find(|entity| entity.is_empire() && entity.is_owned_by(player_id))
        else {
            return ActionOutcome::Rejected(RejectReason::NoEmpire);
        };

        if let Some(existing) = empire.buildings.iter_mut().find(|b| b.kind == kind) {
            if level <= existing.level {
                return ActionOutcome::Unchanged;
            }
            existing.level = level;
            existing.hp = kind.hp_at(level);
        } else {
            empire.buildings.push(Building {
                id: format!("building_{}", Uuid::now_v7().simple()),
                kind,
                owner: player_id.clone(),
                level,
                hp: kind.hp_at(level),
                created_at: now,
            });
        }
        debug!(player_id = %player_id, building = ?kind, level, "Building constructed");
        self.request_save();
        ActionOutcome::Applied
    }

    // -----------------------------------------------------------------------
    // chat, attack, explore
    // -----------------------------------------------------------------------

    fn handle_chat(
        &mut self,
        player_id: &PlayerId,
        payload: &ChatPayload,
        now: i64,
    ) -> ActionOutcome {
        let Some(player) = self.players.get_mut(player_id) else {
            return ActionOutcome::Rejected(RejectReason::UnknownPlayer);
        };
        player.last_activity = now;
        debug!(
            player_id = %player_id,
            channel = payload.channel.as_deref().unwrap_or("world"),
            length = payload.text.len(),
            "Chat relayed"
        );
        ActionOutcome::Applied
    }

    fn handle_attack(
        &mut self,
        player_id: &PlayerId,
        payload: &AttackPayload,
        now: i64,
    ) -> ActionOutcome {
        if !self.players.contains_key(player_id) {
            return ActionOutcome::Rejected(RejectReason::UnknownPlayer);
        }
        let record = CombatRecord {
            id: format!("attack_{}", Uuid::now_v7().simple()),
            attacker: player_id.clone(),
            target: payload.target.clone(),
            kind: payload.kind.clone(),
            damage: payload.damage,
            timestamp: now,
        };
        push_capped(&mut self.combat_log, record, self.config.combat_log_capacity);
        ActionOutcome::Applied
    }

    fn handle_explore(
        &mut self,
        player_id: &PlayerId,
        payload: &ExplorePayload,
        now: i64,
    ) -> ActionOutcome {
        if !self.players.contains_key(player_id) {
            return ActionOutcome::Rejected(RejectReason::UnknownPlayer);
        }
        let record = ExplorationRecord {
            id: format!("explore_{}", Uuid::now_v7().simple()),
            player_id: player_id.clone(),
            position: Position::new(payload.x, payload.y),
            discovered: payload.discovered.clone(),
            timestamp: now,
        };
        push_capped(
            &mut self.exploration_log,
            record,
            self.config.exploration_log_capacity,
        );
        ActionOutcome::Applied
    }

    // -----------------------------------------------------------------------
    // unrecognized
    // -----------------------------------------------------------------------

    fn note_unrecognized(&mut self, kind: &str, player_id: &PlayerId, now: i64) {
        let due = self
            .last_unrecognized_log
            .is_none_or(|last| now.saturating_sub(last) > UNRECOGNIZED_LOG_INTERVAL_MS);
        if due {
            info!(
                room_id = %self.room_id,
                kind,
                player_id = %player_id,
                "Unrecognized action ignored"
            );
            self.last_unrecognized_log = Some(now);
        } else {
            debug!(kind, player_id = %player_id, "Unrecognized action ignored");
        }
    }
}

/// Append `item`, dropping the oldest entries beyond `capacity`.
fn push_capped<T>(log: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while log.len() >= capacity {
        log.pop_front();
    }
    log.push_back(item);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::world::JoinRequest;
    use imperion_types::RoomId;
    use serde_json::json;

    fn world_with(ids: &[(&str, &str)]) -> World {
        let mut world = World::new(RoomId::new("test"), &WorldConfig::default());
        for (id, name) in ids {
            world.add_player(JoinRequest::new(*id, *name)).unwrap();
        }
        world
    }

    fn action(value: serde_json::Value) -> ActionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn every_action_gets_the_next_sequence() {
        let mut world = world_with(&[("p1", "Aria")]);
        let kinds = ["resources", "chat", "dance", "attack", "move"];
        let mut sequences = Vec::new();
        for kind in kinds {
            let receipt = world.process_action(action(json!({
                "type": kind, "playerId": "p1", "payload": {"text": "x", "target": "t"}
            })));
            sequences.push(receipt.sequence);
        }
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
        assert_eq!(world.sequence(), 5);
        assert_eq!(world.version(), 6);
        assert!(world.delta(5).is_none());
        assert_eq!(world.delta(0).map(|d| d.changes.len()), Some(5));
    }

    #[test]
    fn duplicate_empire_build_only_raises_level() {
        let mut world = world_with(&[("p1", "Aria")]);
        let owner = PlayerId::new("p1");
        let build = |level: u32| {
            action(json!({
                "type": "build", "playerId": "p1",
                "payload": {"type": "empire", "x": 1, "y": 1, "level": level}
            }))
        };

        assert_eq!(world.process_action(build(3)).outcome, ActionOutcome::Applied);
        assert_eq!(world.process_action(build(2)).outcome, ActionOutcome::Unchanged);

        let empires: Vec<_> = world
            .entities()
            .filter(|e| e.is_empire() && e.is_owned_by(&owner))
            .collect();
        assert_eq!(empires.len(), 1);
        assert_eq!(empires.first().map(|e| e.level), Some(3));
    }

    #[test]
    fn empire_build_founds_when_missing() {
        let mut world = world_with(&[("p1", "Aria")]);
        let owner = PlayerId::new("p1");
        let empire_id = world.empire_of(&owner).map(|e| e.id.clone()).unwrap();
        world.entities.remove(&empire_id);

        let missing = world.process_action(action(json!({
            "type": "build", "playerId": "p1", "payload": {"type": "empire"}
        })));
        assert_eq!(missing.outcome, ActionOutcome::Rejected(RejectReason::MissingPosition));

        let founded = world.process_action(action(json!({
            "type": "build", "playerId": "p1", "payload": {"type": "city", "x": 30, "y": 31}
        })));
        assert_eq!(founded.outcome, ActionOutcome::Applied);
        assert_eq!(
            world.empire_of(&owner).map(|e| e.position),
            Some(Position::new(30, 31))
        );
    }

    #[test]
    fn empire_cannot_be_founded_on_an_occupied_cell() {
        let mut world = world_with(&[("p1", "Aria"), ("p2", "Bram")]);
        let (p1, p2) = (PlayerId::new("p1"), PlayerId::new("p2"));
        let taken = world.empire_of(&p1).map(|e| e.position).unwrap();
        let empire_id = world.empire_of(&p2).map(|e| e.id.clone()).unwrap();
        world.entities.remove(&empire_id);

        let receipt = world.process_action(action(json!({
            "type": "build", "playerId": "p2",
            "payload": {"type": "empire", "x": taken.x, "y": taken.y}
        })));
        assert_eq!(receipt.outcome, ActionOutcome::Rejected(RejectReason::Occupied));
        assert!(world.empire_of(&p2).is_none());
        let on_cell = world.entities().filter(|e| e.position == taken).count();
        assert_eq!(on_cell, 1);
        let tile = imperion_world::tile_at(world.map_data(), taken);
        assert_eq!(tile.and_then(|t| t.owner.clone()), Some(p1));
    }

    #[test]
    fn internal_buildings_dedupe_by_type() {
        let mut world = world_with(&[("p1", "Aria")]);
        let build = |kind: &str, level: u32| {
            action(json!({
                "type": "build", "playerId": "p1",
                "payload": {"type": kind, "level": level}
            }))
        };
        world.process_action(build("castle", 1));
        world.process_action(build("farm", 2));
        world.process_action(build("castillo", 3));

        let empire = world.empire_of(&PlayerId::new("p1")).unwrap();
        assert_eq!(empire.buildings.len(), 2);
        let castle = empire
            .buildings
            .iter()
            .find(|b| b.kind == BuildingType::Castle)
            .unwrap();
        assert_eq!(castle.level, 3);
        assert_eq!(castle.hp, 4500);
    }

    #[test]
    fn building_without_empire_is_rejected() {
        let mut world = world_with(&[("p1", "Aria")]);
        let empire_id = world
            .empire_of(&PlayerId::new("p1"))
            .map(|e| e.id.clone())
            .unwrap();
        world.entities.remove(&empire_id);
        let receipt = world.process_action(action(json!({
            "type": "build", "playerId": "p1", "payload": {"type": "mine"}
        })));
        assert_eq!(receipt.outcome, ActionOutcome::Rejected(RejectReason::NoEmpire));
    }

    #[test]
    fn small_moves_are_absorbed_as_jitter() {
        let mut world = world_with(&[("p1", "Aria")]);
        let id = PlayerId::new("p1");
        let start = world.player(&id).unwrap().position;
        let nudge = Position::new(if start.x > 0 { start.x - 1 } else { start.x + 1 }, start.y);

        let receipt = world.process_action(action(json!({
            "type": "move", "playerId": "p1", "payload": {"x": nudge.x, "y": nudge.y}
        })));
        assert_eq!(receipt.outcome, ActionOutcome::Unchanged);
        assert_eq!(world.player(&id).unwrap().position, start);

        let far = Position::new((start.x + 10) % 50, (start.y + 10) % 50);
        let receipt = world.process_action(action(json!({
            "type": "move", "playerId": "p1", "payload": {"x": far.x, "y": far.y}
        })));
        assert_eq!(receipt.outcome, ActionOutcome::Applied);
        let player = world.player(&id).unwrap();
        assert_eq!(player.position, far);
        assert_eq!(player.last_saved_position, far);
        assert_eq!(world.saved_position(&id), Some(far));
    }

    #[test]
    fn entities_can_be_moved_by_id() {
        let mut world = world_with(&[("p1", "Aria")]);
        let empire_id = world
            .empire_of(&PlayerId::new("p1"))
            .map(|e| e.id.clone())
            .unwrap();
        let receipt = world.process_action(action(json!({
            "type": "move", "playerId": "p1",
            "payload": {"x": 49, "y": 0, "entityId": empire_id.as_str()}
        })));
        assert_eq!(receipt.outcome, ActionOutcome::Applied);
        assert_eq!(
            world.entity(&empire_id).map(|e| e.position),
            Some(Position::new(49, 0))
        );
        let tile = imperion_world::tile_at(world.map_data(), Position::new(49, 0)).unwrap();
        assert_eq!(tile.owner, Some(PlayerId::new("p1")));
    }

    #[test]
    fn off_grid_and_unknown_actors_are_neutral() {
        let mut world = world_with(&[("p1", "Aria")]);
        let off = world.process_action(action(json!({
            "type": "move", "playerId": "p1", "payload": {"x": 50, "y": 3}
        })));
        assert_eq!(off.outcome, ActionOutcome::Rejected(RejectReason::OutOfBounds));

        let ghost = world.process_action(action(json!({
            "type": "attack", "playerId": "ghost", "payload": {"target": "p1", "damage": 5}
        })));
        assert_eq!(ghost.outcome, ActionOutcome::Rejected(RejectReason::UnknownPlayer));
        assert_eq!(world.combat_log().count(), 0);
    }

    #[test]
    fn combat_log_is_capped() {
        let mut world = world_with(&[("p1", "Aria")]);
        for damage in 0..25 {
            world.process_action(action(json!({
                "type": "attack", "playerId": "p1",
                "payload": {"target": "npc_1", "type": "melee", "damage": damage}
            })));
        }
        assert_eq!(world.combat_log().count(), 20);
        assert_eq!(world.combat_log().next().map(|r| r.damage), Some(5));
    }

    #[test]
    fn exploration_is_recorded() {
        let mut world = world_with(&[("p1", "Aria")]);
        world.process_action(action(json!({
            "type": "explore", "playerId": "p1",
            "payload": {"x": 4, "y": 5, "discovered": ["ruins"]}
        })));
        let record = world.exploration_log().next().unwrap();
        assert_eq!(record.position, Position::new(4, 5));
        assert_eq!(record.discovered, json!(["ruins"]));
    }
}
