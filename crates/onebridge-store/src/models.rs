//! Rows persisted in the local database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file that was previously materialised on disk, keyed by the URI it was
/// fetched or decoded from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileCacheRecord {
    /// The original URI string, used verbatim as the lookup key.
    pub uri: String,
    /// Display file name (including extension when known).
    pub file_name: String,
    /// Absolute path of the materialised file.
    pub local_path: String,
    pub file_size: i64,
    /// Hex content digest, empty when it was never computed.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}
