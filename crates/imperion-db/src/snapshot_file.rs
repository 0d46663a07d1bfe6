//! The world snapshot file.

use std::path::{Path, PathBuf};

use imperion_core::{PersistError, SnapshotSink};
use imperion_types::PersistentSnapshot;
use tracing::{debug, warn};

use crate::atomic::write_json_atomic;
use crate::error::DbError;

/// A snapshot stored as one JSON document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Bind to `path`. Nothing is read or created yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the file with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if encoding or any filesystem step fails.
    pub fn write(&self, snapshot: &PersistentSnapshot) -> Result<(), DbError> {
        write_json_atomic(&self.path, snapshot)?;
        debug!(
            path = %self.path.display(),
            entities = snapshot.entities.len(),
            positions = snapshot.player_positions.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Read the snapshot, distinguishing a missing file from a broken one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the file exists but cannot be read, or
    /// [`DbError::Serialization`] if it is not a valid snapshot.
    pub fn try_read(&self) -> Result<Option<PersistentSnapshot>, DbError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Read the snapshot for boot. Any failure is logged and treated as
    /// "no snapshot".
    pub fn read(&self) -> Option<PersistentSnapshot> {
        self.try_read().unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "Snapshot unreadable, starting empty");
            None
        })
    }
}

impl SnapshotSink for SnapshotFile {
    fn submit(&mut self, snapshot: PersistentSnapshot) -> Result<(), PersistError> {
        self.write(&snapshot).map_err(PersistError::from)
    }
}
