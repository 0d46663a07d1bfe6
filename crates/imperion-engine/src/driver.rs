//! Command dispatch and the engine's main loop.
//!
//! [`Engine::handle`] applies one [`Command`] synchronously and returns its
//! [`Response`]. [`run`] owns the only `Engine`, so every command, timer,
//! and shutdown step is serialized on one task with no locks.
//!
//! Only `join` opens a room. Every other command addressed to a room that
//! is not open is refused, and secondary rooms left with no players and no
//! entities are closed after reconciliation.

use std::time::Duration;

use imperion_core::{
    JoinRequest, PersistenceGateway, RoomRegistry, SaveOutcome, SnapshotSink, TimerConfig, World,
};
use imperion_db::{IdentityStore, WriteScheduler, WriteStatus};
use imperion_types::{Player, PlayerId, PlayerKind, Position, RoomId, now_ms};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::protocol::{Command, Response};

/// Everything the command loop mutates.
#[derive(Debug)]
pub struct Engine<S> {
    rooms: RoomRegistry,
    gateway: PersistenceGateway<S>,
    identities: IdentityStore,
}

impl<S: SnapshotSink> Engine<S> {
    /// Assemble an engine from booted parts.
    pub const fn new(
        rooms: RoomRegistry,
        gateway: PersistenceGateway<S>,
        identities: IdentityStore,
    ) -> Self {
        Self {
            rooms,
            gateway,
            identities,
        }
    }

    /// The persisted world.
    pub const fn primary(&self) -> &World {
        self.rooms.primary()
    }

    /// The snapshot gateway.
    pub const fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    /// Apply one command. Failures come back as [`Response::Error`].
    pub fn handle(&mut self, command: Command) -> Response {
        self.dispatch(command).unwrap_or_else(|err| Response::Error {
            message: err.to_string(),
        })
    }

    fn dispatch(&mut self, command: Command) -> Result<Response, EngineError> {
        let response = match command {
            Command::Join {
                room,
                id,
                name,
                kind,
                is_admin,
                x,
                y,
            } => {
                let preferred = x.zip(y).map(|(x, y)| Position::new(x, y));
                return self.join(room, id, name, kind, is_admin, preferred);
            }
            Command::Leave { room, id } => {
                let world = self.world(room)?;
                let removed = world.remove_player(&id).is_some();
                Response::Left {
                    room: world.room_id().clone(),
                    id,
                    removed,
                }
            }
            Command::Rename { room, id, name } => return self.rename(room, id, &name),
            Command::Action { room, action } => {
                let world = self.world(room)?;
                let receipt = world.process_action(action);
                Response::Action {
                    room: world.room_id().clone(),
                    sequence: receipt.sequence,
                    outcome: receipt.outcome,
                }
            }
            Command::Delta { room, since } => {
                let world = self.world(room)?;
                Response::Delta {
                    room: world.room_id().clone(),
                    delta: world.delta(since),
                }
            }
            Command::Snapshot { room } => Response::Snapshot {
                snapshot: self.world(room)?.snapshot(),
            },
            Command::Spawn { room, owner } => {
                let world = self.world(room)?;
                let outcome = world.generate_valid_spawn(owner.as_ref());
                Response::Spawn {
                    room: world.room_id().clone(),
                    x: outcome.position.x,
                    y: outcome.position.y,
                    tier: outcome.tier.as_str(),
                    degraded: outcome.is_degraded(),
                }
            }
            Command::Reconcile { room } => {
                let world = self.world(room)?;
                let removed = world.reconcile();
                let room = world.room_id().clone();
                self.rooms.close_idle();
                Response::Reconciled { room, removed }
            }
            Command::Map { room } => {
                let world = self.world(room)?;
                world.ensure_map();
                Response::Map {
                    room: world.room_id().clone(),
                    tiles: world.map_data().to_vec(),
                }
            }
            Command::Save { force } => self.save(force),
        };
        Ok(response)
    }

    /// Submit a snapshot of the primary world if it has unsaved changes.
    pub fn persist_if_requested(&mut self) {
        if !self.rooms.primary().save_requested() {
            return;
        }
        if let Err(err) = self.gateway.save(self.rooms.primary_mut(), now_ms()) {
            warn!(error = %err, "Periodic save failed, will retry");
        }
    }

    /// Reconcile every open room, then close secondary rooms left idle.
    pub fn reconcile_all(&mut self) -> usize {
        let removed = self
            .rooms
            .rooms_mut()
            .map(World::reconcile)
            .fold(0, usize::saturating_add);
        let closed = self.rooms.close_idle();
        if closed > 0 {
            debug!(closed, "Idle rooms closed");
        }
        removed
    }

    /// The room registry.
    pub const fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    // -----------------------------------------------------------------------
    // Command helpers
    // -----------------------------------------------------------------------

    /// An open room, or the primary room when none is named.
    fn world(&mut self, room: Option<RoomId>) -> Result<&mut World, EngineError> {
        match room {
            Some(id) => match self.rooms.get_mut(&id) {
                Some(world) => Ok(world),
                None => Err(EngineError::UnknownRoom { room: id }),
            },
            None => Ok(self.rooms.primary_mut()),
        }
    }

    fn is_primary(&self, room: Option<&RoomId>) -> bool {
        room.is_none_or(|id| id == self.rooms.primary_id())
    }

    /// A failed identity store write is returned as an error after the
    /// player has joined. Repeating the join with the same id is safe.
    fn join(
        &mut self,
        room: Option<RoomId>,
        id: Option<PlayerId>,
        name: String,
        kind: PlayerKind,
        is_admin: bool,
        preferred_position: Option<Position>,
    ) -> Result<Response, EngineError> {
        let persisted = self.is_primary(room.as_ref());
        let id = id.unwrap_or_else(|| self.identities.generate_player_id(&mut rand::rng()));
        let returning = self.identities.has_player(&id);

        let world = match room {
            Some(id) => self.rooms.open(&id),
            None => self.rooms.primary_mut(),
        };
        // Clear out departed players first so their cells and names free up.
        world.reconcile();
        let request = JoinRequest {
            id: id.clone(),
            name,
            kind,
            is_admin,
            preferred_position,
        };
        let outcome = match world.add_player(request) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(player_id = %id, error = %err, "Join refused");
                return Ok(Response::Error {
                    message: err.to_string(),
                });
            }
        };
        let room_id = world.room_id().clone();
        let Some(player) = world.player(&id).cloned() else {
            return Ok(Response::Error {
                message: format!("player {id} vanished during join"),
            });
        };

        if persisted {
            self.record_identity(&player)?;
        }
        info!(player_id = %id, returning, room_id = %room_id, "Join accepted");

        let degraded = outcome.is_degraded();
        Ok(Response::Joined {
            room: room_id,
            player,
            empire_id: outcome.empire_id,
            resolution: outcome.resolution,
            degraded,
        })
    }

    fn rename(
        &mut self,
        room: Option<RoomId>,
        id: PlayerId,
        name: &str,
    ) -> Result<Response, EngineError> {
        let persisted = self.is_primary(room.as_ref());
        let world = self.world(room)?;
        if let Err(err) = world.rename_player(&id, name) {
            return Ok(Response::Error {
                message: err.to_string(),
            });
        }
        let room_id = world.room_id().clone();
        let Some(player) = world.player(&id).cloned() else {
            return Ok(Response::Error {
                message: format!("player {id} vanished during rename"),
            });
        };

        if persisted {
            self.record_identity(&player)?;
        }
        Ok(Response::Renamed {
            room: room_id,
            id,
            name: player.name,
        })
    }

    fn record_identity(&mut self, player: &Player) -> Result<(), EngineError> {
        self.identities.upsert(&player.id, &player.name, player.kind);
        self.identities.save().map_err(|err| {
            warn!(player_id = %player.id, error = %err, "Failed to save identity store");
            EngineError::from(err)
        })
    }

    fn save(&mut self, force: bool) -> Response {
        let now = now_ms();
        let world = self.rooms.primary_mut();
        let result = if force {
            self.gateway.flush(world, now)
        } else {
            self.gateway.save(world, now)
        };
        match result {
            Ok(SaveOutcome::Submitted { .. }) => Response::Saved {
                submitted: true,
                retry_in_ms: None,
            },
            Ok(SaveOutcome::Debounced { retry_in_ms }) => Response::Saved {
                submitted: false,
                retry_in_ms: Some(retry_in_ms),
            },
            Err(err) => Response::Error {
                message: err.to_string(),
            },
        }
    }
}

impl Engine<WriteScheduler> {
    /// Apply one command, waiting for the disk write on a forced save.
    pub async fn execute(&mut self, command: Command) -> Response {
        match command {
            Command::Save { force: true } => match self.save_durably().await {
                Ok(()) => Response::Saved {
                    submitted: true,
                    retry_in_ms: None,
                },
                Err(err) => Response::Error {
                    message: err.to_string(),
                },
            },
            command => self.handle(command),
        }
    }

    /// Snapshot the primary world and wait until it is on disk.
    ///
    /// # Errors
    ///
    /// Returns the write error. The world is marked unsaved again so the
    /// periodic save retries.
    pub async fn save_durably(&mut self) -> Result<(), EngineError> {
        let result = match self.gateway.flush(self.rooms.primary_mut(), now_ms()) {
            Ok(_) => self.gateway.sink().flush().await.map_err(EngineError::from),
            Err(err) => Err(err.into()),
        };
        if result.is_err() {
            self.rooms.primary_mut().request_save();
        }
        result
    }

    /// React to a writer outcome. A failed write leaves the world marked
    /// unsaved so the next persist tick submits it again.
    pub fn observe_write(&mut self, status: &WriteStatus) {
        if let WriteStatus::Failed { message } = status {
            warn!(error = %message, "Background snapshot write failed, will resubmit");
            self.rooms.primary_mut().request_save();
        }
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Serve commands from stdin until EOF or ctrl-c, then flush and stop the
/// writer.
///
/// # Errors
///
/// Returns [`EngineError`] if stdin/stdout fail, or if the final flush or
/// writer shutdown fails.
pub async fn run(
    mut engine: Engine<WriteScheduler>,
    timers: &TimerConfig,
) -> Result<(), EngineError> {
    let mut persist_timer =
        tokio::time::interval(Duration::from_millis(timers.persist_interval_ms.max(1)));
    let mut reconcile_timer =
        tokio::time::interval(Duration::from_millis(timers.reconcile_interval_ms.max(1)));
    // Both intervals fire immediately; boot has already done that work.
    persist_timer.tick().await;
    reconcile_timer.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut write_status = engine.gateway().sink().status();
    let mut writer_alive = true;

    info!("Engine ready, reading commands from stdin");
    loop {
        tokio::select! {
            _ = persist_timer.tick() => engine.persist_if_requested(),
            changed = write_status.changed(), if writer_alive => {
                if changed.is_err() {
                    warn!("Snapshot writer stopped");
                    writer_alive = false;
                    continue;
                }
                let status = write_status.borrow_and_update().clone();
                engine.observe_write(&status);
            }
            _ = reconcile_timer.tick() => {
                let removed = engine.reconcile_all();
                debug!(removed, "Periodic reconciliation complete");
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<Command>(&line) {
                    Ok(command) => engine.execute(command).await,
                    Err(err) => Response::Error {
                        message: format!("invalid command: {err}"),
                    },
                };
                let mut encoded = serde_json::to_vec(&response)?;
                encoded.push(b'\n');
                stdout.write_all(&encoded).await?;
                stdout.flush().await?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received");
                break;
            }
        }
    }

    info!(
        players = engine.primary().player_count(),
        sequence = engine.primary().sequence(),
        "Flushing final snapshot"
    );
    engine.save_durably().await?;
    engine.gateway().sink().shutdown().await?;
    info!("Final snapshot written");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use imperion_core::WorldConfig;
    use imperion_db::SnapshotFile;
    use serde_json::json;

    fn engine(dir: &tempfile::TempDir) -> Engine<SnapshotFile> {
        let config = WorldConfig::default();
        let mut rooms = RoomRegistry::new(&config);
        rooms.primary_mut().ensure_map();
        let file = SnapshotFile::new(dir.path().join("state.json"));
        let gateway = PersistenceGateway::new(file, 5000);
        let identities = IdentityStore::load(dir.path().join("players.json"));
        Engine::new(rooms, gateway, identities)
    }

    fn command(value: serde_json::Value) -> Command {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn join_mints_an_id_and_records_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);

        let Response::Joined { player, resolution, .. } =
            engine.handle(command(json!({"op": "join", "name": "Aria"})))
        else {
            panic!("expected joined");
        };
        assert!(player.id.as_str().starts_with("player_"));
        assert_eq!(resolution, imperion_core::EmpireResolution::Founded);

        let stored = IdentityStore::load(dir.path().join("players.json"));
        assert!(stored.has_player(&player.id));
    }

    #[test]
    fn join_reclaims_cells_of_departed_players() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        engine.handle(command(json!({"op": "join", "id": "p1", "name": "Aria"})));
        engine.handle(command(json!({"op": "leave", "id": "p1"})));
        assert!(engine.primary().empire_of(&PlayerId::new("p1")).is_some());

        engine.handle(command(json!({"op": "join", "id": "p2", "name": "Aria"})));
        assert!(engine.primary().empire_of(&PlayerId::new("p1")).is_none());
        assert_eq!(engine.primary().player_count(), 1);
    }

    #[test]
    fn duplicate_names_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        engine.handle(command(json!({"op": "join", "id": "p1", "name": "Aria"})));
        let response = engine.handle(command(json!({"op": "join", "id": "p2", "name": "ARIA"})));
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn actions_flow_into_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        engine.handle(command(json!({"op": "join", "id": "p1", "name": "Aria"})));
        let response = engine.handle(command(json!({
            "op": "action",
            "action": {"type": "chat", "playerId": "p1", "payload": {"text": "hi"}}
        })));
        assert!(matches!(response, Response::Action { sequence: 1, .. }));

        let Response::Delta { delta, .. } = engine.handle(command(json!({"op": "delta", "since": 0})))
        else {
            panic!("expected delta");
        };
        assert_eq!(delta.map(|d| d.changes.len()), Some(1));
    }

    #[test]
    fn side_rooms_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let response = engine.handle(command(json!({
            "op": "join", "room": "arena", "id": "p9", "name": "Zed"
        })));
        assert!(matches!(response, Response::Joined { .. }));
        assert!(engine.primary().player(&PlayerId::new("p9")).is_none());
        let stored = IdentityStore::load(dir.path().join("players.json"));
        assert!(!stored.has_player(&PlayerId::new("p9")));
    }

    #[test]
    fn save_respects_debounce_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        engine.handle(command(json!({"op": "join", "id": "p1", "name": "Aria"})));

        assert!(matches!(
            engine.handle(command(json!({"op": "save"}))),
            Response::Saved { submitted: true, .. }
        ));
        assert!(matches!(
            engine.handle(command(json!({"op": "save"}))),
            Response::Saved { submitted: false, .. }
        ));
        assert!(matches!(
            engine.handle(command(json!({"op": "save", "force": true}))),
            Response::Saved { submitted: true, .. }
        ));

        let saved = SnapshotFile::new(dir.path().join("state.json")).read().unwrap();
        assert_eq!(saved.entities.len(), 1);
    }

    #[test]
    fn commands_for_unknown_rooms_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        for n in 0..32 {
            let room = format!("ghost-{n}");
            let response = engine.handle(command(json!({"op": "delta", "room": room, "since": 0})));
            assert!(matches!(response, Response::Error { .. }));
            let response = engine.handle(command(json!({"op": "map", "room": room})));
            assert!(matches!(response, Response::Error { .. }));
        }
        assert_eq!(engine.rooms().rooms().count(), 1);
    }

    #[test]
    fn side_room_closes_after_its_last_player_is_reconciled_away() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        engine.handle(command(json!({"op": "join", "room": "arena", "id": "p9", "name": "Zed"})));
        engine.handle(command(json!({"op": "leave", "room": "arena", "id": "p9"})));
        assert_eq!(engine.rooms().rooms().count(), 2);

        engine.reconcile_all();
        assert_eq!(engine.rooms().rooms().count(), 1);
        let response = engine.handle(command(json!({"op": "snapshot", "room": "arena"})));
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn identity_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("players.json");
        std::fs::create_dir(&blocked).unwrap();
        let config = WorldConfig::default();
        let mut rooms = RoomRegistry::new(&config);
        rooms.primary_mut().ensure_map();
        let gateway = PersistenceGateway::new(SnapshotFile::new(dir.path().join("state.json")), 0);
        let mut engine = Engine::new(rooms, gateway, IdentityStore::load(&blocked));

        let response = engine.handle(command(json!({"op": "join", "id": "p1", "name": "Aria"})));
        assert!(matches!(response, Response::Error { .. }));
        // The join itself stands, so repeating it is safe.
        assert!(engine.primary().player(&PlayerId::new("p1")).is_some());
    }

    fn scheduled_engine(dir: &tempfile::TempDir) -> Engine<WriteScheduler> {
        // A directory cannot be replaced by the snapshot file.
        let blocked = dir.path().join("state.json");
        std::fs::create_dir(&blocked).unwrap();
        let (scheduler, _task) =
            WriteScheduler::spawn(SnapshotFile::new(&blocked), Duration::from_secs(60));
        let config = WorldConfig::default();
        let mut rooms = RoomRegistry::new(&config);
        rooms.primary_mut().ensure_map();
        let identities = IdentityStore::load(dir.path().join("players.json"));
        Engine::new(rooms, PersistenceGateway::new(scheduler, 5000), identities)
    }

    #[tokio::test]
    async fn forced_save_reports_a_failed_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = scheduled_engine(&dir);
        engine.execute(command(json!({"op": "join", "id": "p1", "name": "Aria"}))).await;

        let response = engine.execute(command(json!({"op": "save", "force": true}))).await;
        assert!(matches!(response, Response::Error { .. }));
        assert!(engine.primary().save_requested());
    }

    #[tokio::test]
    async fn failed_background_write_marks_the_world_unsaved() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = scheduled_engine(&dir);
        engine.execute(command(json!({"op": "join", "id": "p1", "name": "Aria"}))).await;
        engine.persist_if_requested();
        assert!(!engine.primary().save_requested());

        let mut status = engine.gateway().sink().status();
        assert!(engine.gateway().sink().flush().await.is_err());
        let observed = status.borrow_and_update().clone();
        assert!(matches!(observed, WriteStatus::Failed { .. }));

        engine.observe_write(&observed);
        assert!(engine.primary().save_requested());
    }
}
