//! Waiting on files that the host platform writes asynchronously.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::time::Instant;
use tracing::debug;

use onebridge_shared::constants::FILE_WAIT_POLL_MS;

use crate::error::{MediaError, Result};

/// Poll until `path` exists or `timeout` elapses. Only the calling task is
/// suspended between polls.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    let poll = Duration::from_millis(FILE_WAIT_POLL_MS);

    loop {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        if started.elapsed() > timeout {
            return Err(MediaError::NotArrived {
                path: path.to_path_buf(),
                timeout_ms: timeout.as_millis(),
            });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Wait for `path` to arrive, then return its contents base64 encoded.
pub async fn read_base64_when_ready(path: &Path, timeout: Duration) -> Result<String> {
    wait_for_file(path, timeout).await?;
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| MediaError::io(path, e))?;
    debug!(path = %path.display(), size = data.len(), "Encoded file as base64");
    Ok(STANDARD.encode(data))
}
