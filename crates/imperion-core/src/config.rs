//! Configuration loading and typed config structures for the Imperion engine.
//!
//! The canonical configuration lives in `imperion-config.yaml` next to the
//! binary. Every field has a default, so a missing file or a partial file
//! both yield a runnable configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// World rules: room, seed, capacities.
    #[serde(default)]
    pub world: WorldConfig,

    /// Snapshot and identity file locations and write timing.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Periodic driver timers.
    #[serde(default)]
    pub timers: TimerConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `IMPERION_SNAPSHOT_PATH` overrides `persistence.snapshot_path`
    /// - `IMPERION_IDENTITY_PATH` overrides `persistence.identity_path`
    /// - `IMPERION_SEED` overrides `world.seed` (ignored if not a `u64`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IMPERION_SNAPSHOT_PATH") {
            self.persistence.snapshot_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("IMPERION_IDENTITY_PATH") {
            self.persistence.identity_path = PathBuf::from(val);
        }
        if let Some(seed) = std::env::var("IMPERION_SEED")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.world.seed = seed;
        }
    }
}

/// World-level rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Room id of the primary, persisted world.
    #[serde(default = "default_room_id")]
    pub room_id: String,

    /// Seed for map generation and spawn sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Maximum live players per world.
    #[serde(default = "default_max_players")]
    pub max_players: usize,

    /// Stamped actions retained for delta catch-up.
    #[serde(default = "default_action_log_capacity")]
    pub action_log_capacity: usize,

    /// Attack records retained per world.
    #[serde(default = "default_combat_log_capacity")]
    pub combat_log_capacity: usize,

    /// Exploration records retained per world.
    #[serde(default = "default_exploration_log_capacity")]
    pub exploration_log_capacity: usize,

    /// Age after which a saved player position is discarded.
    #[serde(default = "default_position_ttl_ms")]
    pub position_ttl_ms: i64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            room_id: default_room_id(),
            seed: default_seed(),
            max_players: default_max_players(),
            action_log_capacity: default_action_log_capacity(),
            combat_log_capacity: default_combat_log_capacity(),
            exploration_log_capacity: default_exploration_log_capacity(),
            position_ttl_ms: default_position_ttl_ms(),
        }
    }
}

/// Persistence locations and write timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// World snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Identity store file.
    #[serde(default = "default_identity_path")]
    pub identity_path: PathBuf,

    /// Minimum time between two snapshot saves.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: i64,

    /// How long the write scheduler coalesces submissions before writing.
    #[serde(default = "default_write_window_ms")]
    pub write_window_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            identity_path: default_identity_path(),
            debounce_ms: default_debounce_ms(),
            write_window_ms: default_write_window_ms(),
        }
    }
}

/// Periodic driver timers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimerConfig {
    /// How often the driver asks the gateway to persist.
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,

    /// How often the driver runs a reconciliation pass.
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            persist_interval_ms: default_persist_interval_ms(),
            reconcile_interval_ms: default_reconcile_interval_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_room_id() -> String {
    String::from("imperion-global")
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_players() -> usize {
    50
}

const fn default_action_log_capacity() -> usize {
    100
}

const fn default_combat_log_capacity() -> usize {
    20
}

const fn default_exploration_log_capacity() -> usize {
    100
}

const fn default_position_ttl_ms() -> i64 {
    86_400_000
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/world-state.json")
}

fn default_identity_path() -> PathBuf {
    PathBuf::from("data/players.json")
}

const fn default_debounce_ms() -> i64 {
    5000
}

const fn default_write_window_ms() -> u64 {
    250
}

const fn default_persist_interval_ms() -> u64 {
    5000
}

const fn default_reconcile_interval_ms() -> u64 {
    300_000
}
