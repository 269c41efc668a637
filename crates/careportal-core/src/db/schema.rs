//! SQLite schema definition.

/// Local store schema: one flat table of string keys to string values.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Guest-mode flag key.
pub const KEY_GUEST: &str = "open_as_guest";
/// Guest appointment collection (JSON array).
pub const KEY_APPOINTMENTS: &str = "appointments";
/// Profile settings blob.
pub const KEY_USER_PROFILE: &str = "userProfile";
/// Notification settings blob.
pub const KEY_NOTIFICATION_SETTINGS: &str = "notificationSettings";
/// Security settings blob.
pub const KEY_SECURITY_SETTINGS: &str = "securitySettings";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_value_not_null() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO local_storage (key, value) VALUES ('k', NULL)",
            [],
        );
        assert!(result.is_err());
    }
}
