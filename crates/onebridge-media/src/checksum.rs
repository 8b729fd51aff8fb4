//! Incremental content hashing of files on disk.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{MediaError, Result};

/// Buffer size for reading files during hashing (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hex BLAKE3 digest of the file contents, streamed in chunks so
/// large files never sit in memory whole.
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .await
        .map_err(|e| MediaError::io(path, e))?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| MediaError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}
