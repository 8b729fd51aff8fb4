//! v001 -- Initial schema creation.
//!
//! Creates the `file_cache` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS file_cache (
    uri          TEXT PRIMARY KEY NOT NULL,   -- original URI, verbatim
    file_name    TEXT NOT NULL,
    local_path   TEXT NOT NULL,
    file_size    INTEGER NOT NULL,
    content_hash TEXT NOT NULL DEFAULT '',
    created_at   TEXT NOT NULL                -- RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_file_cache_name ON file_cache(file_name);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
