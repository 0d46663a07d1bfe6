//! Room registry: one [`World`] per room id.
//!
//! The primary room is created up front and is the only one the engine
//! persists. Other rooms are opened on demand, seeded from the configured
//! seed mixed with a hash of their id so each gets its own stable map.

use std::collections::BTreeMap;

use imperion_types::RoomId;
use tracing::info;

use crate::config::WorldConfig;
use crate::world::World;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the bytes of `text`.
fn fnv1a(text: &str) -> u64 {
    text.bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Owns every world in the process.
#[derive(Debug)]
pub struct RoomRegistry {
    config: WorldConfig,
    primary: World,
    others: BTreeMap<RoomId, World>,
}

impl RoomRegistry {
    /// Create a registry holding only the primary room named in `config`.
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            config: config.clone(),
            primary: World::new(RoomId::new(config.room_id.clone()), config),
            others: BTreeMap::new(),
        }
    }

    /// Id of the primary room.
    pub const fn primary_id(&self) -> &RoomId {
        self.primary.room_id()
    }

    /// The primary world.
    pub const fn primary(&self) -> &World {
        &self.primary
    }

    /// The primary world, mutably.
    pub const fn primary_mut(&mut self) -> &mut World {
        &mut self.primary
    }

    /// Look up a room.
    pub fn get(&self, id: &RoomId) -> Option<&World> {
        if id == self.primary.room_id() {
            return Some(&self.primary);
        }
        self.others.get(id)
    }

    /// Look up a room mutably.
    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut World> {
        if id == self.primary.room_id() {
            return Some(&mut self.primary);
        }
        self.others.get_mut(id)
    }

    /// Get a room, creating it with a fresh map if it does not exist.
    pub fn open(&mut self, id: &RoomId) -> &mut World {
        if id == self.primary.room_id() {
            return &mut self.primary;
        }
        let config = &self.config;
        self.others.entry(id.clone()).or_insert_with(|| {
            let seed = config.seed ^ fnv1a(id.as_str());
            let mut world = World::with_seed(id.clone(), config, seed);
            world.ensure_map();
            info!(room_id = %id, seed, "Room opened");
            world
        })
    }

    /// Drop a secondary room. The primary room cannot be closed.
    pub fn close(&mut self, id: &RoomId) -> Option<World> {
        let closed = self.others.remove(id);
        if closed.is_some() {
            info!(room_id = %id, "Room closed");
        }
        closed
    }

    /// Close every secondary room with no players and no entities left.
    /// Returns how many were closed.
    pub fn close_idle(&mut self) -> usize {
        let before = self.others.len();
        self.others.retain(|id, world| {
            let idle = world.player_count() == 0 && world.entities().next().is_none();
            if idle {
                info!(room_id = %id, "Idle room closed");
            }
            !idle
        });
        before.saturating_sub(self.others.len())
    }

    /// Every room, primary first.
    pub fn rooms(&self) -> impl Iterator<Item = &World> {
        std::iter::once(&self.primary).chain(self.others.values())
    }

    /// Every room mutably, primary first.
    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut World> {
        std::iter::once(&mut self.primary).chain(self.others.values_mut())
    }
}
