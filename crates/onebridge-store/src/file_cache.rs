use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::models::FileCacheRecord;

const SELECT_COLUMNS: &str =
    "SELECT uri, file_name, local_path, file_size, content_hash, created_at FROM file_cache";

impl Database {
    /// Insert a record, replacing any previous record for the same URI.
    pub fn insert_file_cache(&self, record: &FileCacheRecord) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO file_cache (uri, file_name, local_path, file_size, content_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.uri,
                record.file_name,
                record.local_path,
                record.file_size,
                record.content_hash,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find the record for this exact URI string.
    pub fn file_cache_by_uri(&self, uri: &str) -> Result<Option<FileCacheRecord>> {
        let record = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE uri = ?1"),
                params![uri],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recent record stored under `file_name`.
    pub fn file_cache_by_name(&self, file_name: &str) -> Result<Option<FileCacheRecord>> {
        let record = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE file_name = ?1 ORDER BY created_at DESC LIMIT 1"),
                params![file_name],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    // only removes the db record, not the file on disk
    pub fn delete_file_cache(&self, uri: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM file_cache WHERE uri = ?1", params![uri])?;
        Ok(affected > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileCacheRecord> {
    let created_str: String = row.get(5)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(FileCacheRecord {
        uri: row.get(0)?,
        file_name: row.get(1)?,
        local_path: row.get(2)?,
        file_size: row.get(3)?,
        content_hash: row.get(4)?,
        created_at,
    })
}
