//! Single-blob persistence of the player and the modified-cell record.

use anyhow::Context;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use worldofbits_protocol::PersistedState;

use crate::grid;

/// Minimal key-value capability the game persists through.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Returns whether anything was removed.
    fn remove(&mut self, key: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self.open()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("read key {key}"))?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value, now_rfc3339()),
        )
        .with_context(|| format!("write key {key}"))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<bool> {
        let conn = self.open()?;
        let n = conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .with_context(|| format!("delete key {key}"))?;
        Ok(n > 0)
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
"#,
        )?;
        conn.pragma_update(None, "user_version", 1_i64)?;
    }
    Ok(())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing stored.
    Fresh,
    Restored(PersistedState),
    /// The stored blob could not be read back and has been discarded.
    Corrupt(String),
}

pub fn save(
    store: &mut impl KeyValueStore,
    key: &str,
    state: &PersistedState,
) -> Result<(), PersistenceError> {
    let blob = serde_json::to_string(state).map_err(PersistenceError::Encode)?;
    store.set(key, &blob)?;
    debug!(key, bytes = blob.len(), cells = state.modified_cell_states.len(), "state saved");
    Ok(())
}

pub fn load(store: &mut impl KeyValueStore, key: &str) -> Result<LoadOutcome, PersistenceError> {
    let Some(blob) = store.get(key)? else {
        return Ok(LoadOutcome::Fresh);
    };
    match decode(&blob) {
        Ok(state) => Ok(LoadOutcome::Restored(state)),
        Err(reason) => {
            warn!(key, %reason, "discarding corrupt saved state");
            store.remove(key)?;
            Ok(LoadOutcome::Corrupt(reason))
        }
    }
}

pub fn reset(store: &mut impl KeyValueStore, key: &str) -> Result<(), PersistenceError> {
    store.remove(key)?;
    Ok(())
}

fn decode(blob: &str) -> Result<PersistedState, String> {
    let state: PersistedState = serde_json::from_str(blob).map_err(|e| e.to_string())?;
    let pos = state.player_lat_lng;
    if !grid::on_map(pos) {
        return Err(format!("player position {},{} is off the map", pos.lat, pos.lng));
    }
    Ok(state)
}
