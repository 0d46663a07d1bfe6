//! Line-delimited JSON protocol spoken on stdin/stdout.
//!
//! Each input line is one [`Command`], tagged by `op`. Each command yields
//! exactly one [`Response`] line, tagged by `event`. Commands that omit
//! `room` address the primary room. Only `join` opens a room that does not
//! exist yet; other commands naming one get an `error` response.

use imperion_core::{ActionOutcome, EmpireResolution};
use imperion_types::{
    ActionRequest, Delta, EntityId, Player, PlayerId, PlayerKind, RoomId, RoomSnapshot, Tile,
};
use serde::{Deserialize, Serialize};

/// A request from the session layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    /// Admit a player, minting an id if none is given.
    #[serde(rename_all = "camelCase")]
    Join {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
        /// Returning player's id.
        #[serde(default)]
        id: Option<PlayerId>,
        /// Display name.
        name: String,
        /// Human or NPC.
        #[serde(rename = "type", default)]
        kind: PlayerKind,
        /// Admin flag.
        #[serde(default)]
        is_admin: bool,
        /// Preferred spawn column.
        #[serde(default)]
        x: Option<i32>,
        /// Preferred spawn row.
        #[serde(default)]
        y: Option<i32>,
    },
    /// Remove a live player.
    Leave {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
        /// Departing player.
        id: PlayerId,
    },
    /// Change a player's display name.
    Rename {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
        /// Player to rename.
        id: PlayerId,
        /// New name.
        name: String,
    },
    /// Submit one game action.
    Action {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
        /// The action itself.
        action: ActionRequest,
    },
    /// Fetch actions after a watermark.
    Delta {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
        /// Last sequence the caller has seen.
        #[serde(default)]
        since: u64,
    },
    /// Fetch a full room snapshot.
    Snapshot {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
    },
    /// Ask for a free spawn cell.
    Spawn {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
        /// Player the cell is for; their own empire does not block it.
        #[serde(default)]
        owner: Option<PlayerId>,
    },
    /// Run a reconciliation pass.
    Reconcile {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
    },
    /// Fetch the projected tile grid.
    Map {
        /// Target room.
        #[serde(default)]
        room: Option<RoomId>,
    },
    /// Persist the primary room.
    Save {
        /// Bypass the debounce window.
        #[serde(default)]
        force: bool,
    },
}

/// A reply to the session layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Response {
    /// A player was admitted.
    #[serde(rename_all = "camelCase")]
    Joined {
        /// Room joined.
        room: RoomId,
        /// The live player record.
        player: Player,
        /// The player's empire.
        empire_id: EntityId,
        /// How the empire was found.
        resolution: EmpireResolution,
        /// Whether the spawn position could not be validated.
        degraded: bool,
    },
    /// A player was removed.
    Left {
        /// Room left.
        room: RoomId,
        /// Departed player.
        id: PlayerId,
        /// Whether the player was live.
        removed: bool,
    },
    /// A player was renamed.
    Renamed {
        /// Room of the player.
        room: RoomId,
        /// Renamed player.
        id: PlayerId,
        /// New name.
        name: String,
    },
    /// An action was sequenced.
    Action {
        /// Room of the action.
        room: RoomId,
        /// Assigned sequence.
        sequence: u64,
        /// Effect on the world.
        outcome: ActionOutcome,
    },
    /// Catch-up data; `delta` is absent when the caller is current.
    Delta {
        /// Room queried.
        room: RoomId,
        /// Actions after the watermark.
        delta: Option<Delta>,
    },
    /// Full room state.
    Snapshot {
        /// The snapshot.
        snapshot: RoomSnapshot,
    },
    /// A spawn cell.
    Spawn {
        /// Room queried.
        room: RoomId,
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Search tier that produced the cell.
        tier: &'static str,
        /// Whether the cell failed validation.
        degraded: bool,
    },
    /// Reconciliation finished.
    Reconciled {
        /// Room reconciled.
        room: RoomId,
        /// Records removed.
        removed: usize,
    },
    /// The projected grid.
    Map {
        /// Room queried.
        room: RoomId,
        /// Tiles indexed `[y][x]`.
        tiles: Vec<Vec<Tile>>,
    },
    /// Result of a save request.
    #[serde(rename_all = "camelCase")]
    Saved {
        /// Whether a snapshot was handed to the writer.
        submitted: bool,
        /// Time until a debounced save may run.
        retry_in_ms: Option<i64>,
    },
    /// The command could not be carried out.
    Error {
        /// What went wrong.
        message: String,
    },
}
