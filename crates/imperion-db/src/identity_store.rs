//! Durable player identities (`players.json`).
//!
//! The store answers "does this id already have a record" across restarts
//! and mints new ids. It is independent of the world snapshot and is
//! written with the same temp-then-rename pattern.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use imperion_types::{IdentityFile, PlayerId, PlayerKind, PlayerRecord, now_ms};
use rand::Rng;
use tracing::{info, warn};

use crate::atomic::write_json_atomic;
use crate::error::DbError;

/// Characters of the random id suffix.
const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// In-memory view of the identity file.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
    players: BTreeMap<PlayerId, PlayerRecord>,
}

impl IdentityStore {
    /// Load the store at `path`.
    ///
    /// A missing file is created empty. An unreadable or corrupt file is
    /// logged and treated as empty; it is only overwritten on the next
    /// [`IdentityStore::save`].
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self {
            path,
            players: BTreeMap::new(),
        };

        match std::fs::read_to_string(&store.path) {
            Ok(text) => match serde_json::from_str::<IdentityFile>(&text) {
                Ok(file) => {
                    store.players = file
                        .players
                        .into_iter()
                        .map(|record| (record.id.clone(), record))
                        .collect();
                    info!(path = %store.path.display(), players = store.players.len(), "Identity store loaded");
                }
                Err(err) => {
                    warn!(path = %store.path.display(), error = %err, "Identity store corrupt, starting empty");
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Err(err) = store.save() {
                    warn!(path = %store.path.display(), error = %err, "Could not create identity store");
                }
            }
            Err(err) => {
                warn!(path = %store.path.display(), error = %err, "Identity store unreadable, starting empty");
            }
        }
        store
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `id` has a record.
    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// The record for `id`.
    pub fn get(&self, id: &PlayerId) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    /// Every record, ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Create or update the record for `id`. `created_at` is kept from an
    /// existing record.
    pub fn upsert(&mut self, id: &PlayerId, name: &str, kind: PlayerKind) -> &PlayerRecord {
        let now = now_ms();
        self.players
            .entry(id.clone())
            .and_modify(|record| {
                name.clone_into(&mut record.name);
                record.kind = kind;
                record.last_activity = now;
            })
            .or_insert_with(|| PlayerRecord {
                id: id.clone(),
                name: name.to_owned(),
                kind,
                created_at: now,
                last_activity: now,
            })
    }

    /// Drop the record for `id`.
    pub fn remove(&mut self, id: &PlayerId) -> Option<PlayerRecord> {
        self.players.remove(id)
    }

    /// Mint an id of the form `player_<ms>_<9 base36 chars>` not already
    /// in the store.
    pub fn generate_player_id<R: Rng + ?Sized>(&self, rng: &mut R) -> PlayerId {
        loop {
            let suffix: String = (0..ID_SUFFIX_LEN)
                .filter_map(|_| BASE36.get(rng.random_range(0..BASE36.len())))
                .map(|&byte| char::from(byte))
                .collect();
            let id = PlayerId::new(format!("player_{}_{suffix}", now_ms()));
            if !self.has_player(&id) {
                return id;
            }
        }
    }

    /// Atomically write every record to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if encoding or any filesystem step fails.
    pub fn save(&self) -> Result<(), DbError> {
        let file = IdentityFile {
            players: self.players.values().cloned().collect(),
            last_update: now_ms(),
        };
        write_json_atomic(&self.path, &file)
    }
}
