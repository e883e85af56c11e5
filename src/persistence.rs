//! Durable storage of the game snapshot
//!
//! The whole [`GameState`] is kept as one JSON record under a fixed key
//! in a [`KeyValueStore`]. Every save overwrites the record; there is no
//! merging and no partial write. A record that cannot be read, does not
//! parse, or carries another schema version is treated as absent.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{bank::as_integer, constants::storage::VERSION, roster::Player, state::GameState};

/// Errors surfaced by store implementations
#[derive(Debug, Error)]
pub enum Error {
    /// The backing medium failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The snapshot could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string key-value store holding the snapshot record
///
/// This plays the role of browser local storage: reads and writes are
/// synchronous and a write replaces the previous value.
pub trait KeyValueStore {
    /// Reads the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<(), Error>;

    /// Deletes the value stored under `key`, if any
    fn remove(&mut self, key: &str) -> Result<(), Error>;
}

/// In-memory store
///
/// Clones share the same entries, so a clone kept by the caller observes
/// every write made through a controller.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// File-backed store keeping each key in `<dir>/<key>.json`
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `base_dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, Error> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Maps `key` to its file
    ///
    /// ASCII letters, digits, `.` and `-` are kept; every other byte is
    /// written as `_XX` in hex, so distinct keys never share a file.
    fn path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .bytes()
            .map(|byte| {
                if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
                    char::from(byte).to_string()
                } else {
                    format!("_{byte:02X}")
                }
            })
            .collect();
        self.base_dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        let path = self.path(key);
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// A snapshot record that passed the version check
///
/// The fields are still untyped: they come from storage that an older
/// build or a user may have edited, and are repaired by the controller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    /// Stored roster, repaired with [`crate::roster::normalize_players`]
    #[serde(default)]
    pub players: Value,
    /// Stored used-question ids
    #[serde(default)]
    pub used: Value,
    /// Stored current player id
    #[serde(default)]
    pub current_player_id: Value,
}

/// Builds a fresh state for `players`: no question used, first player's turn
pub fn build_initial_state(players: Vec<Player>) -> GameState {
    let current_player_id = players.first().map(|player| player.id.clone());
    GameState {
        version: VERSION,
        players,
        used: Vec::new(),
        current_player_id,
    }
}

/// Versioned load, save and clear of the snapshot record
pub struct StatePersistence<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> StatePersistence<S> {
    /// Wraps `store`, keeping the snapshot under `key`
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The key of the snapshot record
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the snapshot record
    ///
    /// Returns `None` if the record is absent, unreadable, not JSON, or
    /// tagged with a version other than [`VERSION`].
    pub fn load(&self) -> Option<StoredState> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Could not read snapshot {}: {e}", self.key);
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Discarding unparsable snapshot {}: {e}", self.key);
                return None;
            }
        };

        let version = value.get("version").and_then(as_integer);
        if version != Some(u64::from(VERSION)) {
            tracing::info!(
                "Discarding snapshot {} with version {:?}, expected {VERSION}",
                self.key,
                version
            );
            return None;
        }

        match serde_json::from_value(value) {
            Ok(stored) => {
                tracing::debug!("Loaded snapshot {}", self.key);
                Some(stored)
            }
            Err(e) => {
                tracing::warn!("Discarding malformed snapshot {}: {e}", self.key);
                None
            }
        }
    }

    /// Overwrites the snapshot record with `state`
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub fn save(&mut self, state: &GameState) -> Result<(), Error> {
        let body = serde_json::to_string(state)?;
        self.store.set(&self.key, &body)?;
        tracing::debug!(
            "Saved snapshot {} ({} players, {} used)",
            self.key,
            state.players.len(),
            state.used.len()
        );
        Ok(())
    }

    /// Deletes the snapshot record
    ///
    /// # Errors
    ///
    /// Returns the store's error if the delete fails.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.store.remove(&self.key)?;
        tracing::debug!("Cleared snapshot {}", self.key);
        Ok(())
    }
}
