//! Action request types and the delta catch-up payload.
//!
//! On the wire an action is a loosely typed object
//! `{type, playerId, payload}`. Inside the engine it is an
//! [`ActionRequest`] whose [`ActionKind`] carries a typed payload per known
//! kind. Anything that does not parse, including a known kind with a
//! malformed payload, becomes [`ActionKind::Unrecognized`] so that the
//! caller never has to handle a decode error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::BuildTarget;
use crate::ids::{EntityId, PlayerId, RoomId};
use crate::structs::Position;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of a `move` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    /// Target column.
    pub x: i32,
    /// Target row.
    pub y: i32,
    /// Entity to move. When absent, the acting player moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
}

impl MovePayload {
    /// The target coordinate.
    pub const fn target(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Payload of a `build` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPayload {
    /// What to build.
    #[serde(rename = "type")]
    pub target: BuildTarget,
    /// Column for a new empire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    /// Row for a new empire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    /// Requested level.
    #[serde(default = "default_level")]
    pub level: u32,
}

impl BuildPayload {
    /// The requested coordinate, when both halves are present.
    pub const fn position(&self) -> Option<Position> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Position::new(x, y)),
            _ => None,
        }
    }
}

/// Payload of a `chat` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Message body.
    pub text: String,
    /// Channel name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// Payload of an `attack` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPayload {
    /// Target reference.
    pub target: String,
    /// Attack type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Damage dealt.
    #[serde(default)]
    pub damage: u32,
}

/// Payload of an `explore` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorePayload {
    /// Explored column.
    pub x: i32,
    /// Explored row.
    pub y: i32,
    /// Whatever was discovered.
    #[serde(default)]
    pub discovered: Value,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The kind of an action together with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Move the acting player or a named entity.
    Move(MovePayload),
    /// Found an empire or add an internal building.
    Build(BuildPayload),
    /// Send a chat line.
    Chat(ChatPayload),
    /// Attack something.
    Attack(AttackPayload),
    /// Explore a tile.
    Explore(ExplorePayload),
    /// Resource bookkeeping from game systems. Accepted without effect.
    Resources(Value),
    /// Anything else, kept verbatim for the action log.
    Unrecognized {
        /// The `type` string as received.
        kind: String,
        /// The payload as received.
        payload: Value,
    },
}

impl ActionKind {
    /// The wire name of this kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Move(_) => "move",
            Self::Build(_) => "build",
            Self::Chat(_) => "chat",
            Self::Attack(_) => "attack",
            Self::Explore(_) => "explore",
            Self::Resources(_) => "resources",
            Self::Unrecognized { kind, .. } => kind,
        }
    }
}

/// An action submitted by a caller, before sequencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireAction", into = "WireAction")]
pub struct ActionRequest {
    /// Acting player.
    pub player_id: PlayerId,
    /// Kind and payload.
    pub kind: ActionKind,
}

impl ActionRequest {
    /// Build a request.
    pub const fn new(player_id: PlayerId, kind: ActionKind) -> Self {
        Self { player_id, kind }
    }
}

/// Loose wire shape of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAction {
    #[serde(rename = "type")]
    kind: String,
    player_id: PlayerId,
    #[serde(default)]
    payload: Value,
}

/// Decode `payload` as `T`, falling back to an unrecognized action.
fn typed<T, F>(kind: String, payload: Value, wrap: F) -> ActionKind
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(T) -> ActionKind,
{
    match T::deserialize(&payload) {
        Ok(parsed) => wrap(parsed),
        Err(_) => ActionKind::Unrecognized { kind, payload },
    }
}

impl From<WireAction> for ActionRequest {
    fn from(wire: WireAction) -> Self {
        let WireAction {
            kind,
            player_id,
            payload,
        } = wire;
        let kind = match kind.as_str() {
            "move" => typed(kind, payload, ActionKind::Move),
            "build" => typed(kind, payload, ActionKind::Build),
            "chat" => typed(kind, payload, ActionKind::Chat),
            "attack" => typed(kind, payload, ActionKind::Attack),
            "explore" => typed(kind, payload, ActionKind::Explore),
            "resources" => ActionKind::Resources(payload),
            _ => ActionKind::Unrecognized { kind, payload },
        };
        Self { player_id, kind }
    }
}

impl From<ActionRequest> for WireAction {
    fn from(request: ActionRequest) -> Self {
        let name = request.kind.name().to_owned();
        let payload = match request.kind {
            ActionKind::Move(p) => serde_json::to_value(p),
            ActionKind::Build(p) => serde_json::to_value(p),
            ActionKind::Chat(p) => serde_json::to_value(p),
            ActionKind::Attack(p) => serde_json::to_value(p),
            ActionKind::Explore(p) => serde_json::to_value(p),
            ActionKind::Resources(payload) | ActionKind::Unrecognized { payload, .. } => {
                Ok(payload)
            }
        };
        Self {
            kind: name,
            player_id: request.player_id,
            payload: payload.unwrap_or(Value::Null),
        }
    }
}

/// An action after the sequencer accepted it. Immutable from here on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedAction {
    /// Position in the global order, starting at 1, gapless.
    pub sequence: u64,
    /// When the action was accepted.
    pub timestamp: i64,
    /// The original request.
    #[serde(flatten)]
    pub request: ActionRequest,
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// Catch-up payload for a client that last saw `since` sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// Room the delta belongs to.
    pub room_id: RoomId,
    /// Current sequence. The caller's new watermark.
    pub sequence: u64,
    /// Buffered actions newer than the watermark, oldest first.
    pub changes: Vec<StampedAction>,
    /// Time of the last accepted action.
    pub timestamp: i64,
    /// Current version.
    pub version: u64,
    /// Set when actions newer than the watermark were already evicted, so
    /// `changes` is incomplete and the caller must refetch a full snapshot.
    pub resync_required: bool,
}

const fn default_level() -> u32 {
    1
}
