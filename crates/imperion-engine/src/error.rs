//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the command loop.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: imperion_core::ConfigError,
    },

    /// Handing a snapshot to storage failed.
    #[error("persist error: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: imperion_core::PersistError,
    },

    /// A storage file operation failed.
    #[error("storage error: {source}")]
    Db {
        /// The underlying storage error.
        #[from]
        source: imperion_db::DbError,
    },

    /// A command named a room that is not open. Only joins open rooms.
    #[error("unknown room: {room}")]
    UnknownRoom {
        /// The requested room id.
        room: imperion_types::RoomId,
    },

    /// Reading commands or writing responses failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A response could not be encoded.
    #[error("encoding error: {source}")]
    Encode {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}
