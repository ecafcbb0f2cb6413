//! Saving game state.
//!
//! The engine periodically hands a [`GameSnapshot`] to its [`StateStore`].
//! `save` overwrites the current state; `snapshot` writes a durable,
//! tick-numbered copy.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use galactic_types::{Civilization, GalaxyRegion, PerformanceSnapshot, Player};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::ClockSnapshot;

/// Errors that can occur while persisting state.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("state store I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serialization failure.
    #[error("failed to serialize game state: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Everything needed to inspect or restore a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Clock counters and anchors.
    pub clock: ClockSnapshot,
    /// Registered players.
    pub players: Vec<Player>,
    /// Registered civilizations.
    pub civilizations: Vec<Civilization>,
    /// Region state.
    pub regions: Vec<GalaxyRegion>,
    /// Performance counters.
    pub performance: PerformanceSnapshot,
}

/// Writes state as pretty JSON under a data directory.
///
/// Layout: `<dir>/state.json` and `<dir>/snapshots/tick-<n>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at `dir`. Directories are created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the current-state file.
    pub fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    /// Path of the snapshot for a tick.
    pub fn snapshot_path(&self, tick: u64) -> PathBuf {
        self.dir.join("snapshots").join(format!("tick-{tick}.json"))
    }

    async fn save(&self, snapshot: &GameSnapshot) -> Result<(), PersistError> {
        write_json(&self.state_path(), snapshot).await
    }

    async fn snapshot(&self, snapshot: &GameSnapshot) -> Result<PathBuf, PersistError> {
        let path = self.snapshot_path(snapshot.clock.current_tick);
        write_json(&path, snapshot).await?;
        Ok(path)
    }
}

/// Write through a temporary file so readers never see a partial file.
async fn write_json(path: &Path, value: &GameSnapshot) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Where game state goes.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
#[derive(Debug, Clone, Default)]
pub enum StateStore {
    /// Discards state, logging what would have been written.
    #[default]
    Null,
    /// Writes JSON files.
    JsonFile(JsonFileStore),
}

impl StateStore {
    /// Store for an optional data directory.
    pub fn from_data_dir(dir: Option<&Path>) -> Self {
        dir.map_or(Self::Null, |dir| Self::JsonFile(JsonFileStore::new(dir)))
    }

    /// Overwrite the current state.
    pub async fn save(&self, snapshot: &GameSnapshot) -> Result<(), PersistError> {
        match self {
            Self::Null => {
                debug!(
                    tick = snapshot.clock.current_tick,
                    players = snapshot.players.len(),
                    "Game state save skipped (no store)"
                );
                Ok(())
            }
            Self::JsonFile(store) => store.save(snapshot).await,
        }
    }

    /// Write a durable snapshot.
    pub async fn snapshot(&self, snapshot: &GameSnapshot) -> Result<(), PersistError> {
        match self {
            Self::Null => {
                debug!(tick = snapshot.clock.current_tick, "Snapshot skipped (no store)");
                Ok(())
            }
            Self::JsonFile(store) => {
                let path = store.snapshot(snapshot).await?;
                info!(tick = snapshot.clock.current_tick, path = %path.display(), "Snapshot written");
                Ok(())
            }
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::JsonFile(_) => "json-file",
        }
    }
}
