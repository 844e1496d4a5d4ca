//! v001 -- Initial schema creation.
//!
//! Creates the `snapshots` table: one JSON row per state container holding
//! the whitelisted subset of its state that survives restarts.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    container  TEXT PRIMARY KEY NOT NULL,   -- 'auth' | 'feed' | 'video'
    json       TEXT NOT NULL,               -- serde_json payload
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
