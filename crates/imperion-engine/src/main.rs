//! Engine binary for Imperion.
//!
//! Boots the primary world from disk, then serves line-delimited JSON
//! commands on stdin and answers on stdout while timers persist and
//! reconcile in the background. Logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `imperion-config.yaml`
//! 3. Load the identity store
//! 4. Start the snapshot write scheduler and restore the primary world
//! 5. Reconcile whatever the snapshot left dangling
//! 6. Serve commands until stdin closes or ctrl-c
//! 7. Flush the final snapshot and stop the writer

mod driver;
mod error;
mod protocol;

use std::path::Path;
use std::time::Duration;

use imperion_core::{EngineConfig, PersistenceGateway, RoomRegistry, persist};
use imperion_db::{IdentityStore, SnapshotFile, WriteScheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::driver::Engine;
use crate::error::EngineError;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the command loop
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging. Stdout carries protocol responses.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("imperion-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        room_id = config.world.room_id,
        seed = config.world.seed,
        max_players = config.world.max_players,
        snapshot_path = %config.persistence.snapshot_path.display(),
        "Configuration loaded"
    );

    // 3. Load the identity store.
    let identities = IdentityStore::load(&config.persistence.identity_path);
    info!(known_players = identities.len(), "Identity store ready");

    // 4. Start the writer and restore the primary world.
    let snapshot_file = SnapshotFile::new(&config.persistence.snapshot_path);
    let snapshot = snapshot_file.read();
    let (scheduler, _writer) = WriteScheduler::spawn(
        snapshot_file,
        Duration::from_millis(config.persistence.write_window_ms),
    );
    let gateway = PersistenceGateway::new(scheduler, config.persistence.debounce_ms);
    let mut rooms = RoomRegistry::new(&config.world);
    let loaded = persist::load(rooms.primary_mut(), snapshot);
    info!(
        outcome = ?loaded,
        entities = rooms.primary().entities().count(),
        "Primary world loaded"
    );

    // 5. Boot reconciliation. Known identities keep their empires while
    //    offline; anything else left dangling goes.
    let primary = rooms.primary_mut();
    primary.retain_offline_owners(identities.all().map(|record| record.id.clone()));
    let removed = primary.reconcile();
    info!(removed, "Boot reconciliation complete");

    // 6-7. Serve, then flush on the way out.
    let engine = Engine::new(rooms, gateway, identities);
    driver::run(engine, &config.timers).await?;

    info!("imperion-engine shutdown complete");
    Ok(())
}

/// Load the engine configuration from `imperion-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<EngineConfig, EngineError> {
    let config_path = Path::new("imperion-config.yaml");
    if config_path.exists() {
        let config = EngineConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        let mut config = EngineConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
