//! Authoritative world state for Imperion.
//!
//! Every mutation runs to completion on one thread against a [`World`];
//! nothing here performs I/O. Callers submit actions, the sequencer stamps
//! and logs them, handlers mutate the world, the reconciler repairs
//! dangling references, and the persistence gateway hands snapshots to a
//! [`SnapshotSink`].
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `imperion-config.yaml` into
//!   strongly-typed structs.
//! - [`sequencer`] -- Gapless sequence counter and bounded action log for
//!   delta catch-up.
//! - [`world`] -- The entity and player store, spawning, and map
//!   projection.
//! - [`handlers`] -- Per-kind action processing.
//! - [`reconcile`] -- Orphan cleanup across players, entities, and tiles.
//! - [`persist`] -- Debounced snapshot hand-off and boot-time loading.
//! - [`rooms`] -- One world per room id.
//!
//! [`World`]: world::World
//! [`SnapshotSink`]: persist::SnapshotSink

pub mod config;
pub mod handlers;
pub mod persist;
pub mod reconcile;
pub mod rooms;
pub mod sequencer;
pub mod world;

pub use config::{ConfigError, EngineConfig, PersistenceConfig, TimerConfig, WorldConfig};
pub use handlers::{ActionOutcome, ActionReceipt, RejectReason};
pub use persist::{LoadOutcome, PersistError, PersistenceGateway, SaveOutcome, SnapshotSink};
pub use reconcile::ReconcileReport;
pub use rooms::RoomRegistry;
pub use sequencer::ActionLog;
pub use world::{EmpireResolution, JoinOutcome, JoinRequest, PlayerError, World, player_color};
