//! Error types for the persistence layer.
//!
//! File operations report [`DbError`]. It converts into the core
//! [`PersistError`] so the file-backed sinks can sit behind
//! [`imperion_core::SnapshotSink`].

use imperion_core::PersistError;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The write scheduler task has stopped.
    #[error("write scheduler is not running")]
    SchedulerClosed,

    /// A blocking write task panicked or was cancelled.
    #[error("write task failed: {0}")]
    Task(String),
}

impl From<DbError> for PersistError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Io(source) => Self::Io { source },
            DbError::Serialization(source) => Self::Serialization { source },
            DbError::SchedulerClosed => Self::SchedulerClosed,
            DbError::Task(message) => Self::Io {
                source: std::io::Error::other(message),
            },
        }
    }
}
