//! External audio transcoding tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use onebridge_shared::constants::DEFAULT_SAMPLE_RATE;

use crate::error::{MediaError, Result};

/// Target container and sample layout for a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub format: String,
    pub channels: u16,
    pub sample_rate: u32,
}

impl ConvertOptions {
    /// Mono 16-bit waveform at `sample_rate`, as the silk encoder expects.
    pub fn mono_wav(sample_rate: u32) -> Self {
        Self {
            format: "wav".to_string(),
            channels: 1,
            sample_rate,
        }
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::mono_wav(DEFAULT_SAMPLE_RATE)
    }
}

#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert `src` into `dst`. Completes only once `dst` is fully written.
    async fn convert(&self, src: &Path, dst: &Path, options: &ConvertOptions) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Whether `<ffmpeg> -version` runs successfully.
    pub async fn check_available(&self) -> bool {
        match Command::new(&self.binary).arg("-version").output().await {
            Ok(output) if output.status.success() => {
                let banner = String::from_utf8_lossy(&output.stdout);
                info!(
                    binary = %self.binary.display(),
                    version = banner.lines().next().unwrap_or_default(),
                    "ffmpeg available"
                );
                true
            }
            Ok(output) => {
                warn!(binary = %self.binary.display(), status = %output.status, "ffmpeg check failed");
                false
            }
            Err(e) => {
                warn!(binary = %self.binary.display(), error = %e, "ffmpeg not found");
                false
            }
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl AudioConverter for Ffmpeg {
    async fn convert(&self, src: &Path, dst: &Path, options: &ConvertOptions) -> Result<()> {
        debug!(
            src = %src.display(),
            dst = %dst.display(),
            format = %options.format,
            sample_rate = options.sample_rate,
            "Running ffmpeg"
        );

        let output = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(src)
            .arg("-f")
            .arg(&options.format)
            .arg("-ac")
            .arg(options.channels.to_string())
            .arg("-ar")
            .arg(options.sample_rate.to_string())
            .arg(dst)
            .output()
            .await
            .map_err(|e| {
                MediaError::Conversion(format!("failed to run {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or_default().trim().to_string();
            return Err(MediaError::Conversion(format!(
                "ffmpeg exited with {}: {reason}",
                output.status
            )));
        }

        debug!(dst = %dst.display(), "ffmpeg conversion finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConvertOptions::default();
        assert_eq!(options.format, "wav");
        assert_eq!(options.channels, 1);
        assert_eq!(options.sample_rate, 24_000);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let ffmpeg = Ffmpeg::new("/nonexistent/ffmpeg");
        assert!(!ffmpeg.check_available().await);

        let dir = tempfile::tempdir().unwrap();
        let err = ffmpeg
            .convert(
                &dir.path().join("in.mp3"),
                &dir.path().join("out.wav"),
                &ConvertOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Conversion(_)));
    }
}
