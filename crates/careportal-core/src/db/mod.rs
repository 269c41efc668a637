//! Persisted local key-value store.
//!
//! Stands in for the browser's local storage: a single SQLite table of
//! string keys to string values. Guest-mode appointments and the settings
//! blobs live here; nothing in this store is ever sent to the remote backend.

mod schema;
mod kv;
mod appointments;
mod settings;

pub use schema::*;
#[allow(unused_imports)]
pub use kv::*;
#[allow(unused_imports)]
pub use appointments::*;
#[allow(unused_imports)]
pub use settings::*;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Local store errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Local store lock poisoned")]
    LockPoisoned,
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        DbError::LockPoisoned
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Process-wide handle to the local store.
///
/// The lock is only held for the duration of a synchronous store call and
/// never across an `.await`.
pub type SharedStore = Arc<Mutex<LocalStore>>;

/// Local store connection wrapper.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Open the store at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing and ephemeral sessions).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Wrap this store in the shared handle used across the crate.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let store = LocalStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let store = LocalStore::open_in_memory().unwrap();

        let tables: Vec<String> = store
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"local_storage".to_string()));
    }

    #[test]
    fn test_reopen_persists_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.db");

        {
            let store = LocalStore::open(&path).unwrap();
            store.set_item("open_as_guest", "true").unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(
            store.get_item("open_as_guest").unwrap(),
            Some("true".to_string())
        );
    }
}
