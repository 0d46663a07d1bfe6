//! File-backed persistence for Imperion.
//!
//! The world snapshot and the identity store are plain JSON files, each
//! replaced atomically on write. Snapshot writes go through a tokio task
//! that coalesces bursts of saves into one write.
//!
//! # Architecture
//!
//! ```text
//! PersistenceGateway (imperion-core)
//!     |
//!     +-- submit --> WriteScheduler --> SnapshotFile  (world-state.json)
//!
//! Engine join/rename
//!     |
//!     +-- upsert + save --> IdentityStore             (players.json)
//! ```
//!
//! # Modules
//!
//! - [`atomic`] -- Temp-file-then-rename JSON writes
//! - [`snapshot_file`] -- The world snapshot file
//! - [`identity_store`] -- Durable player identities and id minting
//! - [`scheduler`] -- Background, coalescing snapshot writer
//! - [`error`] -- Shared error types

pub mod atomic;
pub mod error;
pub mod identity_store;
pub mod scheduler;
pub mod snapshot_file;

// Re-export primary types for convenience.
pub use error::DbError;
pub use identity_store::IdentityStore;
pub use scheduler::{WriteScheduler, WriteStatus};
pub use snapshot_file::SnapshotFile;
