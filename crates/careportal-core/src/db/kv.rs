//! Key-value operations.

use rusqlite::{params, OptionalExtension};

use super::{DbResult, LocalStore};

impl LocalStore {
    /// Read a value by key.
    pub fn get_item(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Write a value, replacing any previous one.
    pub fn set_item(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO local_storage (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key. Returns whether it existed.
    pub fn remove_item(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_storage WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }

    /// Wipe every key, including settings and the guest flag.
    pub fn clear(&self) -> DbResult<usize> {
        let rows_affected = self.conn.execute("DELETE FROM local_storage", [])?;
        Ok(rows_affected)
    }

    /// List all keys, sorted.
    pub fn keys(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM local_storage ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_store() -> LocalStore {
        LocalStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let store = setup_store();

        assert_eq!(store.get_item("missing").unwrap(), None);

        store.set_item("open_as_guest", "true").unwrap();
        assert_eq!(
            store.get_item("open_as_guest").unwrap(),
            Some("true".to_string())
        );

        store.set_item("open_as_guest", "false").unwrap();
        assert_eq!(
            store.get_item("open_as_guest").unwrap(),
            Some("false".to_string())
        );
    }

    #[test]
    fn test_remove_item() {
        let store = setup_store();
        store.set_item("a", "1").unwrap();

        assert!(store.remove_item("a").unwrap());
        assert!(!store.remove_item("a").unwrap());
        assert_eq!(store.get_item("a").unwrap(), None);
    }

    #[test]
    fn test_clear_wipes_everything() {
        let store = setup_store();
        store.set_item("open_as_guest", "true").unwrap();
        store.set_item("appointments", "[]").unwrap();
        store.set_item("userProfile", "{}").unwrap();

        assert_eq!(store.clear().unwrap(), 3);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_keys_sorted() {
        let store = setup_store();
        store.set_item("userProfile", "{}").unwrap();
        store.set_item("appointments", "[]").unwrap();
        store.set_item("open_as_guest", "true").unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec!["appointments", "open_as_guest", "userProfile"]
        );
    }
}
