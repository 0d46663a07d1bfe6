//! Integration tests for the `imperion-db` persistence layer.
//!
//! These drive a real [`World`] through the core persistence gateway into
//! files under a temporary directory.

// Integration tests use unwrap extensively for clarity -- panicking on
// failure is the correct behavior in test code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use imperion_core::{
    JoinRequest, LoadOutcome, PersistenceGateway, SaveOutcome, World, WorldConfig, persist,
};
use imperion_db::{IdentityStore, SnapshotFile, WriteScheduler, WriteStatus};
use imperion_types::{PlayerId, PlayerKind, RoomId};

fn world() -> World {
    World::new(RoomId::new("imperion-global"), &WorldConfig::default())
}

#[test]
fn snapshot_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world-state.json");

    let mut before = world();
    before.add_player(JoinRequest::new("p1", "Aria")).unwrap();
    before.add_player(JoinRequest::new("p2", "Bram")).unwrap();
    let mut gateway = PersistenceGateway::new(SnapshotFile::new(&path), 5000);
    gateway.flush(&mut before, 1_000).unwrap();

    let mut after = world();
    let snapshot = SnapshotFile::new(&path).read();
    assert_eq!(persist::load(&mut after, snapshot), LoadOutcome::Restored);

    assert_eq!(after.map_data(), before.map_data());
    assert_eq!(after.entities().count(), 2);
    // Players are not persisted; they come back through join.
    assert_eq!(after.player_count(), 0);

    let rejoin = after.add_player(JoinRequest::new("p1", "Aria")).unwrap();
    let original = before.player(&PlayerId::new("p1")).unwrap().position;
    assert_eq!(rejoin.position, original);
}

#[test]
fn orphans_are_gone_from_the_next_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world-state.json");
    let mut gateway = PersistenceGateway::new(SnapshotFile::new(&path), 0);

    let mut world = world();
    world.add_player(JoinRequest::new("p1", "Aria")).unwrap();
    world.add_player(JoinRequest::new("p2", "Bram")).unwrap();
    world.remove_player(&PlayerId::new("p1"));
    world.reconcile();
    assert!(matches!(
        gateway.save(&mut world, 10).unwrap(),
        SaveOutcome::Submitted { .. }
    ));

    let saved = SnapshotFile::new(&path).read().unwrap();
    let gone = PlayerId::new("p1");
    assert!(saved.entities.iter().all(|(_, e)| e.owner.as_ref() != Some(&gone)));
    let tiles = saved.map_data.unwrap();
    assert!(tiles.iter().flatten().all(|t| t.owner.as_ref() != Some(&gone)));
    assert!(saved.player_positions.iter().all(|(id, _)| id != &gone));
}

#[tokio::test]
async fn gateway_through_scheduler_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("world-state.json"));
    let (scheduler, task) = WriteScheduler::spawn(file.clone(), Duration::from_millis(20));
    let mut gateway = PersistenceGateway::new(scheduler, 5000);

    let mut world = world();
    world.add_player(JoinRequest::new("p1", "Aria")).unwrap();
    gateway.save(&mut world, 100).unwrap();
    assert!(!world.save_requested());

    let mut status = gateway.sink().status();
    status
        .wait_for(|s| matches!(s, WriteStatus::Written { .. }))
        .await
        .unwrap();
    assert_eq!(file.read().unwrap().entities.len(), 1);

    gateway.sink().shutdown().await.unwrap();
    task.await.unwrap();
}

#[test]
fn identity_store_tracks_joins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("players.json");
    let mut store = IdentityStore::load(&path);
    let mut rng = rand::rng();

    let id = store.generate_player_id(&mut rng);
    assert!(!store.has_player(&id));
    store.upsert(&id, "Aria", PlayerKind::Player);
    store.save().unwrap();

    let reloaded = IdentityStore::load(&path);
    assert!(reloaded.has_player(&id));
    assert_eq!(reloaded.get(&id).map(|r| r.name.as_str()), Some("Aria"));
}
