//! Persistence gateway: debounced hand-off of world snapshots to storage.
//!
//! The gateway decides *when* a snapshot is taken; a [`SnapshotSink`]
//! decides *how* it reaches durable storage. The file-backed sinks live in
//! `imperion-db`. Keeping the sink behind a trait leaves this crate free of
//! I/O and lets tests capture snapshots in memory.

use imperion_types::PersistentSnapshot;
use tracing::{debug, info, warn};

use crate::world::World;

/// Errors raised while handing a snapshot to storage.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("snapshot I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {source}")]
    Serialization {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// The background writer is no longer accepting snapshots.
    #[error("snapshot writer has shut down")]
    SchedulerClosed,
}

/// Destination for world snapshots.
pub trait SnapshotSink {
    /// Accept a snapshot for durable storage.
    ///
    /// Implementations may write synchronously or queue the snapshot for a
    /// background writer.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the snapshot cannot be stored or queued.
    fn submit(&mut self, snapshot: PersistentSnapshot) -> Result<(), PersistError>;
}

/// Result of [`PersistenceGateway::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Skipped because the previous save is too recent.
    Debounced {
        /// Time until the next save is allowed.
        retry_in_ms: i64,
    },
    /// A snapshot was handed to the sink.
    Submitted {
        /// The snapshot's `last_save` stamp.
        at: i64,
    },
}

/// How boot-time loading went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot existed; a fresh map was generated.
    Empty,
    /// The snapshot was restored as-is.
    Restored,
    /// Entities and positions were restored but the map was unusable and
    /// has been regenerated.
    Regenerated,
}

/// Debounces snapshot submissions for one world.
#[derive(Debug)]
pub struct PersistenceGateway<S> {
    sink: S,
    debounce_ms: i64,
    last_save: Option<i64>,
}

impl<S: SnapshotSink> PersistenceGateway<S> {
    /// Create a gateway that saves at most once per `debounce_ms`.
    pub const fn new(sink: S, debounce_ms: i64) -> Self {
        Self {
            sink,
            debounce_ms,
            last_save: None,
        }
    }

    /// The wrapped sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the wrapped sink.
    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Time of the last submitted snapshot.
    pub const fn last_save(&self) -> Option<i64> {
        self.last_save
    }

    /// Submit a snapshot unless one was submitted within the debounce
    /// window.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotSink::submit`] failures. The world's save
    /// request stays set so the next call retries.
    pub fn save(&mut self, world: &mut World, now: i64) -> Result<SaveOutcome, PersistError> {
        if let Some(last) = self.last_save {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.debounce_ms {
                let retry_in_ms = self.debounce_ms.saturating_sub(elapsed);
                debug!(room_id = %world.room_id(), retry_in_ms, "Save debounced");
                return Ok(SaveOutcome::Debounced { retry_in_ms });
            }
        }
        self.flush(world, now)
    }

    /// Submit a snapshot immediately, ignoring the debounce window.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotSink::submit`] failures.
    pub fn flush(&mut self, world: &mut World, now: i64) -> Result<SaveOutcome, PersistError> {
        world.sync_entities_to_map();
        let snapshot = world.persistent_snapshot(now);
        let entities = snapshot.entities.len();
        let positions = snapshot.player_positions.len();

        self.sink.submit(snapshot)?;
        self.last_save = Some(now);
        world.clear_save_request();
        debug!(room_id = %world.room_id(), entities, positions, "Snapshot submitted");
        Ok(SaveOutcome::Submitted { at: now })
    }
}

/// Populate `world` from a snapshot read at boot.
///
/// A missing snapshot starts the world empty with a new map. A snapshot
/// whose map is malformed keeps its entities and positions and gets a
/// regenerated map. Loaded tile ownership is left untouched until the
/// next sync.
pub fn load(world: &mut World, snapshot: Option<PersistentSnapshot>) -> LoadOutcome {
    let Some(snapshot) = snapshot else {
        info!(room_id = %world.room_id(), "No snapshot found, starting empty");
        world.ensure_map();
        return LoadOutcome::Empty;
    };

    match world.restore(snapshot) {
        Ok(()) if world.has_map() => LoadOutcome::Restored,
        Ok(()) => {
            world.ensure_map();
            LoadOutcome::Restored
        }
        Err(err) => {
            warn!(room_id = %world.room_id(), error = %err, "Snapshot map unusable, regenerating");
            world.ensure_map();
            LoadOutcome::Regenerated
        }
    }
}
