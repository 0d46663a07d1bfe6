//! The authoritative in-memory world: players, entities, positions, and map.
//!
//! A [`World`] exclusively owns every live collection of one room. The
//! tile grid is a cache of [`imperion_world::project`] over the terrain and
//! the entity map; it is rebuilt by [`World::sync_entities_to_map`] and
//! never edited cell by cell. Action handling lives in
//! [`crate::handlers`] and orphan cleanup in [`crate::reconcile`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use imperion_types::{
    CombatRecord, Delta, Entity, EntityId, EntityKind, ExplorationRecord, PersistentSnapshot,
    Player, PlayerId, PlayerKind, Position, PositionRecord, RoomId, RoomSnapshot, Tile, now_ms,
};
use imperion_world::{SpawnOutcome, SpawnTier, TerrainGrid, WorldError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::WorldConfig;
use crate::sequencer::ActionLog;

/// Errors returned by player lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The requested name is empty after trimming.
    #[error("player name must not be empty")]
    InvalidName,

    /// Another live player already uses this name (case-insensitive).
    #[error("name {name:?} is already taken")]
    NameTaken {
        /// The rejected name.
        name: String,
    },

    /// The world already holds its maximum number of live players.
    #[error("world is full ({capacity} players)")]
    RoomFull {
        /// Maximum live players.
        capacity: usize,
    },

    /// No live player has this id.
    #[error("unknown player: {0}")]
    UnknownPlayer(PlayerId),
}

/// A player asking to join a world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Stable player id, usually from the identity store.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Human or NPC.
    pub kind: PlayerKind,
    /// Administrative privileges, decided by the caller.
    pub is_admin: bool,
    /// Position to found a new empire on, if valid. Ignored when the
    /// player already owns an empire.
    pub preferred_position: Option<Position>,
}

impl JoinRequest {
    /// A plain human join with no preferences.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: PlayerKind::Player,
            is_admin: false,
            preferred_position: None,
        }
    }
}

/// How a joining player's empire was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmpireResolution {
    /// A live empire was already keyed by the player id.
    ById,
    /// A live empire was keyed by the player name and has been re-keyed.
    ByName,
    /// Only the tile grid knew the empire; a live entity was synthesized.
    FromTile,
    /// No empire existed; a new one was founded.
    Founded,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Where the player was placed.
    pub position: Position,
    /// The player's empire.
    pub empire_id: EntityId,
    /// How the empire was found.
    pub resolution: EmpireResolution,
    /// Spawn tier used, or `None` if an existing or preferred position was
    /// reused.
    pub spawn_tier: Option<SpawnTier>,
}

impl JoinOutcome {
    /// Whether the player was placed on an unvalidated fallback cell.
    pub fn is_degraded(&self) -> bool {
        self.spawn_tier == Some(SpawnTier::Degraded)
    }
}

/// Authoritative state of one room.
#[derive(Debug)]
pub struct World {
    pub(crate) room_id: RoomId,
    pub(crate) config: WorldConfig,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    pub(crate) positions: BTreeMap<PlayerId, PositionRecord>,
    /// Known players not currently connected whose empires are kept.
    pub(crate) offline_owners: BTreeSet<PlayerId>,
    pub(crate) terrain: Option<TerrainGrid>,
    /// Cached projection, indexed `[y][x]`. Empty until a map exists.
    pub(crate) tiles: Vec<Vec<Tile>>,
    pub(crate) log: ActionLog,
    pub(crate) combat_log: VecDeque<CombatRecord>,
    pub(crate) exploration_log: VecDeque<ExplorationRecord>,
    pub(crate) rng: StdRng,
    pub(crate) save_requested: bool,
    pub(crate) last_unrecognized_log: Option<i64>,
}

impl World {
    /// Create an empty world seeded from `config.seed`.
    pub fn new(room_id: RoomId, config: &WorldConfig) -> Self {
        Self::with_seed(room_id, config, config.seed)
    }

    /// Create an empty world with an explicit RNG seed.
    pub fn with_seed(room_id: RoomId, config: &WorldConfig, seed: u64) -> Self {
        Self {
            room_id,
            config: config.clone(),
            players: BTreeMap::new(),
            entities: BTreeMap::new(),
            positions: BTreeMap::new(),
            offline_owners: BTreeSet::new(),
            terrain: None,
            tiles: Vec::new(),
            log: ActionLog::new(config.action_log_capacity, now_ms()),
            combat_log: VecDeque::new(),
            exploration_log: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            save_requested: false,
            last_unrecognized_log: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The room this world belongs to.
    pub const fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// A live player by id.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// All live players, ordered by id.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of live players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// A live entity by id.
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// All live entities, ordered by id.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// The empire owned by `owner`, if any.
    pub fn empire_of(&self, owner: &PlayerId) -> Option<&Entity> {
        self.entities
            .values()
            .find(|entity| entity.is_empire() && entity.is_owned_by(owner))
    }

    /// Retained attack records, oldest first.
    pub fn combat_log(&self) -> impl Iterator<Item = &CombatRecord> {
        self.combat_log.iter()
    }

    /// Retained exploration records, oldest first.
    pub fn exploration_log(&self) -> impl Iterator<Item = &ExplorationRecord> {
        self.exploration_log.iter()
    }

    /// Sequence of the most recently accepted action.
    pub const fn sequence(&self) -> u64 {
        self.log.sequence()
    }

    /// Current version.
    pub const fn version(&self) -> u64 {
        self.log.version()
    }

    /// The action log.
    pub const fn action_log(&self) -> &ActionLog {
        &self.log
    }

    /// Everything accepted after `since`, or `None` if up to date.
    pub fn delta(&self, since: u64) -> Option<Delta> {
        self.log.delta(&self.room_id, since)
    }

    /// Point-in-time view for newly connected clients.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            players: self.players.values().cloned().collect(),
            entities: self.entities.values().cloned().collect(),
            timestamp: self.log.last_update(),
            version: self.log.version(),
        }
    }

    /// Whether a mutation since the last save asked to be persisted.
    pub const fn save_requested(&self) -> bool {
        self.save_requested
    }

    /// Mark the world as having unsaved changes, for example after a
    /// snapshot that was handed off failed to reach disk.
    pub const fn request_save(&mut self) {
        self.save_requested = true;
    }

    pub(crate) const fn clear_save_request(&mut self) {
        self.save_requested = false;
    }

    // -----------------------------------------------------------------------
    // Map
    // -----------------------------------------------------------------------

    /// The projected tile grid, indexed `[y][x]`. Empty if no map exists.
    pub fn map_data(&self) -> &[Vec<Tile>] {
        &self.tiles
    }

    /// Whether a map has been generated or restored.
    pub const fn has_map(&self) -> bool {
        self.terrain.is_some()
    }

    /// Generate fresh terrain, replacing any existing map, and project.
    pub fn generate_map(&mut self) {
        self.terrain = Some(imperion_world::generate(&mut self.rng));
        self.sync_entities_to_map();
        self.request_save();
        info!(room_id = %self.room_id, "Map generated");
    }

    /// Generate a map only if none exists yet.
    pub fn ensure_map(&mut self) {
        if self.terrain.is_none() {
            self.generate_map();
        }
    }

    /// Rebuild the tile grid from terrain and live empires.
    ///
    /// This is the only writer of tile ownership. Running it twice without
    /// an intervening mutation yields the same grid.
    pub fn sync_entities_to_map(&mut self) {
        match &self.terrain {
            Some(terrain) => {
                self.tiles = imperion_world::project(terrain, self.entities.values());
            }
            None => debug!(room_id = %self.room_id, "No map to sync entities onto"),
        }
    }

    // -----------------------------------------------------------------------
    // Spawning
    // -----------------------------------------------------------------------

    /// Whether `position` may host a player owned by `owner`.
    pub fn is_valid_spawn(&self, position: Position, owner: Option<&PlayerId>) -> bool {
        imperion_world::is_valid(position, owner, &self.players, &self.entities)
    }

    /// Find a spawn position for `owner` using the tiered search.
    pub fn generate_valid_spawn(&mut self, owner: Option<&PlayerId>) -> SpawnOutcome {
        let players = &self.players;
        let entities = &self.entities;
        let outcome = imperion_world::locate(&mut self.rng, |position| {
            imperion_world::is_valid(position, owner, players, entities)
        });
        if outcome.is_degraded() {
            warn!(
                room_id = %self.room_id,
                x = outcome.position.x,
                y = outcome.position.y,
                "Spawn search exhausted, position may be occupied"
            );
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Player lifecycle
    // -----------------------------------------------------------------------

    /// Whether a live player other than `except` uses `name`, ignoring case.
    pub fn name_taken(&self, name: &str, except: Option<&PlayerId>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.players
            .values()
            .any(|player| Some(&player.id) != except && player.name.to_lowercase() == wanted)
    }

    /// Add (or re-add) a player, resolving or founding its empire.
    ///
    /// Existing empires are looked up by player id, then by player name,
    /// then by scanning the tile grid. A found empire's position is reused
    /// when still valid; otherwise the player is spawned elsewhere and the
    /// empire stays put. Without an empire, one is founded at the
    /// preferred position (if valid) or a spawned one.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidName`] for a blank name,
    /// [`PlayerError::NameTaken`] if another live player has the name, or
    /// [`PlayerError::RoomFull`] if a new player would exceed capacity.
    pub fn add_player(&mut self, request: JoinRequest) -> Result<JoinOutcome, PlayerError> {
        let name = request.name.trim().to_owned();
        if name.is_empty() {
            return Err(PlayerError::InvalidName);
        }
        if self.name_taken(&name, Some(&request.id)) {
            return Err(PlayerError::NameTaken { name });
        }
        if !self.players.contains_key(&request.id)
            && self.players.len() >= self.config.max_players
        {
            return Err(PlayerError::RoomFull {
                capacity: self.config.max_players,
            });
        }

        // A rejoining player must not block its own previous cell.
        let previous = self.players.remove(&request.id);
        self.offline_owners.remove(&request.id);
        self.ensure_map();
        let now = now_ms();
        let id = request.id;

        let (empire_id, resolution, position, spawn_tier) =
            if let Some((empire_id, resolution)) = self.resolve_empire(&id, &name, now) {
                let reusable = self
                    .entities
                    .get(&empire_id)
                    .map(|empire| empire.position)
                    .filter(|&position| self.is_valid_spawn(position, Some(&id)));
                match reusable {
                    Some(position) => (empire_id, resolution, position, None),
                    None => {
                        let outcome = self.generate_valid_spawn(Some(&id));
                        (empire_id, resolution, outcome.position, Some(outcome.tier))
                    }
                }
            } else {
                let (position, spawn_tier) = match request
                    .preferred_position
                    .filter(|&position| self.is_valid_spawn(position, Some(&id)))
                {
                    Some(position) => (position, None),
                    None => {
                        let outcome = self.generate_valid_spawn(Some(&id));
                        (outcome.position, Some(outcome.tier))
                    }
                };
                let empire_id = self.found_empire(&id, &name, position, 1, now);
                (empire_id, EmpireResolution::Founded, position, spawn_tier)
            };

        let player = Player {
            id: id.clone(),
            name,
            kind: request.kind,
            position,
            color: player_color(&id),
            joined_at: previous.as_ref().map_or(now, |p| p.joined_at),
            last_activity: now,
            is_admin: request.is_admin,
            is_npc: request.kind == PlayerKind::Npc,
            last_saved_position: position,
        };
        info!(
            room_id = %self.room_id,
            player_id = %id,
            name = %player.name,
            x = position.x,
            y = position.y,
            empire_id = %empire_id,
            resolution = ?resolution,
            "Player joined"
        );
        self.players.insert(id.clone(), player);
        self.positions.insert(id, PositionRecord::new(position, now));
        self.sync_entities_to_map();
        self.request_save();

        Ok(JoinOutcome {
            position,
            empire_id,
            resolution,
            spawn_tier,
        })
    }

    /// Remove a live player record.
    ///
    /// Only the player record goes. The player's empire and saved position
    /// stay until the next [`World::reconcile`] pass decides their fate, so
    /// a quick reconnect finds everything in place.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.offline_owners.remove(id);
        let removed = self.players.remove(id);
        if let Some(player) = &removed {
            info!(room_id = %self.room_id, player_id = %id, name = %player.name, "Player left");
        }
        removed
    }

    /// Keep the empires of these known but disconnected players through
    /// reconciliation until they join and leave again.
    ///
    /// Used at boot, when no player is live yet but the restored empires
    /// belong to players the identity store still knows.
    pub fn retain_offline_owners(&mut self, ids: impl IntoIterator<Item = PlayerId>) {
        self.offline_owners.extend(ids);
    }

    /// Whether `id` is a live player or a retained offline owner.
    pub fn owner_resolves(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id) || self.offline_owners.contains(id)
    }

    /// Rename a live player.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::UnknownPlayer`], [`PlayerError::InvalidName`],
    /// or [`PlayerError::NameTaken`].
    pub fn rename_player(&mut self, id: &PlayerId, new_name: &str) -> Result<(), PlayerError> {
        let name = new_name.trim();
        if !self.players.contains_key(id) {
            return Err(PlayerError::UnknownPlayer(id.clone()));
        }
        if name.is_empty() {
            return Err(PlayerError::InvalidName);
        }
        if self.name_taken(name, Some(id)) {
            return Err(PlayerError::NameTaken {
                name: name.to_owned(),
            });
        }
        if let Some(player) = self.players.get_mut(id) {
            info!(player_id = %id, from = %player.name, to = %name, "Player renamed");
            player.name = name.to_owned();
            player.last_activity = now_ms();
        }
        Ok(())
    }

    /// Find the empire belonging to `id`, repairing legacy keys on the way.
    fn resolve_empire(
        &mut self,
        id: &PlayerId,
        name: &str,
        now: i64,
    ) -> Option<(EntityId, EmpireResolution)> {
        if let Some(empire) = self.empire_of(id) {
            return Some((empire.id.clone(), EmpireResolution::ById));
        }

        let legacy_owner = PlayerId::new(name);
        if let Some(empire) = self
            .entities
            .values_mut()
            .find(|entity| entity.is_empire() && entity.is_owned_by(&legacy_owner))
        {
            info!(player_id = %id, empire_id = %empire.id, "Re-keyed empire owned by player name");
            empire.owner = Some(id.clone());
            return Some((empire.id.clone(), EmpireResolution::ByName));
        }

        let stray = self
            .tiles
            .iter()
            .flatten()
            .find(|tile| {
                tile.owner
                    .as_ref()
                    .is_some_and(|owner| owner == id || *owner == legacy_owner)
            })
            .map(|tile| Position::new(tile.x, tile.y));
        if let Some(position) = stray {
            let empire_id = self.found_empire(id, name, position, 1, now);
            warn!(
                player_id = %id,
                empire_id = %empire_id,
                x = position.x,
                y = position.y,
                "Recovered empire known only to the tile grid"
            );
            return Some((empire_id, EmpireResolution::FromTile));
        }
        None
    }

    /// Insert a new empire for `owner` and return its id.
    pub(crate) fn found_empire(
        &mut self,
        owner: &PlayerId,
        name: &str,
        position: Position,
        level: u32,
        now: i64,
    ) -> EntityId {
        let slug: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
        let base = format!("empire_{now}_{slug}");
        let mut id = EntityId::new(base.clone());
        let mut suffix = 1_u32;
        while self.entities.contains_key(&id) {
            suffix = suffix.saturating_add(1);
            id = EntityId::new(format!("{base}_{suffix}"));
        }

        self.entities.insert(
            id.clone(),
            Entity {
                id: id.clone(),
                kind: EntityKind::Empire,
                position,
                owner: Some(owner.clone()),
                level: level.max(1),
                created_at: now,
                buildings: Vec::new(),
            },
        );
        id
    }

    // -----------------------------------------------------------------------
    // Saved positions
    // -----------------------------------------------------------------------

    /// Record `position` as the last known position of `id`.
    pub fn save_player_position(&mut self, id: &PlayerId, position: Position) {
        self.positions
            .insert(id.clone(), PositionRecord::new(position, now_ms()));
        self.request_save();
    }

    /// Last known position of `id`, discarding it if it has expired.
    pub fn saved_position(&mut self, id: &PlayerId) -> Option<Position> {
        self.saved_position_at(id, now_ms())
    }

    /// [`World::saved_position`] evaluated at an explicit time.
    pub fn saved_position_at(&mut self, id: &PlayerId, now: i64) -> Option<Position> {
        let record = *self.positions.get(id)?;
        if now.saturating_sub(record.timestamp) > self.config.position_ttl_ms {
            self.positions.remove(id);
            debug!(player_id = %id, "Expired saved position discarded");
            self.request_save();
            return None;
        }
        Some(record.position())
    }

    // -----------------------------------------------------------------------
    // Persistence projection
    // -----------------------------------------------------------------------

    /// Serializable copy of the durable parts of this world.
    pub fn persistent_snapshot(&self, now: i64) -> PersistentSnapshot {
        PersistentSnapshot {
            map_data: self.terrain.as_ref().map(|_| self.tiles.clone()),
            entities: self
                .entities
                .iter()
                .map(|(id, entity)| (id.clone(), entity.clone()))
                .collect(),
            player_positions: self
                .positions
                .iter()
                .map(|(id, record)| (id.clone(), *record))
                .collect(),
            last_save: now,
        }
    }

    /// Replace durable state with a loaded snapshot.
    ///
    /// Loaded tiles are kept as-is until the next sync so ownership known
    /// only to the grid can still be recovered by [`World::add_player`].
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MalformedMap`] if the map data has the wrong
    /// shape. Entities and positions are restored regardless; the map is
    /// left absent so it will be regenerated.
    pub fn restore(&mut self, snapshot: PersistentSnapshot) -> Result<(), WorldError> {
        self.entities = snapshot
            .entities
            .into_iter()
            .map(|(id, mut entity)| {
                entity.id = id.clone();
                (id, entity)
            })
            .collect();
        self.positions = snapshot.player_positions.into_iter().collect();

        let map = snapshot
            .map_data
            .map(|rows| TerrainGrid::from_tiles(&rows).map(|terrain| (terrain, rows)))
            .transpose();

        info!(
            room_id = %self.room_id,
            entities = self.entities.len(),
            positions = self.positions.len(),
            "World state restored"
        );

        match map {
            Ok(Some((terrain, rows))) => {
                self.terrain = Some(terrain);
                self.tiles = rows;
                Ok(())
            }
            Ok(None) => {
                self.terrain = None;
                self.tiles.clear();
                Ok(())
            }
            Err(err) => {
                self.terrain = None;
                self.tiles.clear();
                Err(err)
            }
        }
    }
}

/// Deterministic `#rrggbb` color for a player id.
///
/// Folds the id's UTF-16 code units into a 32-bit hash
/// (`hash = unit + (hash << 5) - hash`) and prints its three low bytes,
/// least significant first.
pub fn player_color(id: &PlayerId) -> String {
    let hash = id.as_str().encode_utf16().fold(0_i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    let [r, g, b, _] = hash.to_le_bytes();
    format!("#{r:02x}{g:02x}{b:02x}")
}
