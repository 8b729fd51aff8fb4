//! Voice transcoding into the canonical silk form.
//!
//! Sources already carrying the silk magic are passed through. Anything else
//! is converted to a mono waveform by the external [`AudioConverter`] (unless
//! it already is one) and fed to the [`SilkCodec`] encoder. The reported
//! duration is always reconciled against a size-based estimate taken from the
//! original source file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use onebridge_shared::constants::{
    DEFAULT_AUDIO_BYTES_PER_SEC, DEFAULT_DURATION_TOLERANCE_SECS, DEFAULT_SAMPLE_RATE, SILK_MAGIC,
};

use crate::error::{MediaError, Result};
use crate::ffmpeg::{AudioConverter, ConvertOptions};
use crate::silk::{has_silk_magic, SilkCodec};

/// Constants of the duration heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    /// Assumed bitrate for the size-based estimate.
    pub bytes_per_second: u64,
    /// Disagreement (seconds) above which the size estimate wins.
    pub tolerance_secs: u64,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            bytes_per_second: DEFAULT_AUDIO_BYTES_PER_SEC,
            tolerance_secs: DEFAULT_DURATION_TOLERANCE_SECS,
        }
    }
}

impl DurationPolicy {
    /// Floor of `size / bytes_per_second`, at least one second.
    pub fn estimate_from_size(&self, size: u64) -> u64 {
        (size / self.bytes_per_second.max(1)).max(1)
    }

    /// Pick between the codec-reported duration and the size estimate.
    pub fn reconcile(&self, codec_secs: u64, estimate_secs: u64) -> u64 {
        if codec_secs.abs_diff(estimate_secs) > self.tolerance_secs {
            estimate_secs
        } else {
            codec_secs.max(1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodedAudio {
    /// Whether an encode actually happened.
    pub converted: bool,
    pub path: PathBuf,
    /// Whole seconds, never below 1.
    pub duration: u64,
}

pub struct SilkTranscoder {
    output_dir: PathBuf,
    converter: Arc<dyn AudioConverter>,
    codec: Arc<dyn SilkCodec>,
    policy: DurationPolicy,
    sample_rate: u32,
}

impl SilkTranscoder {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        converter: Arc<dyn AudioConverter>,
        codec: Arc<dyn SilkCodec>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            converter,
            codec,
            policy: DurationPolicy::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    pub fn with_policy(mut self, policy: DurationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn policy(&self) -> DurationPolicy {
        self.policy
    }

    /// Transcode `src`, logging and swallowing any failure.
    pub async fn transcode(&self, src: &Path) -> Option<TranscodedAudio> {
        match self.try_transcode(src).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(path = %src.display(), error = %e, "Silk transcoding failed");
                None
            }
        }
    }

    pub async fn try_transcode(&self, src: &Path) -> Result<TranscodedAudio> {
        let size = tokio::fs::metadata(src)
            .await
            .map_err(|e| MediaError::io(src, e))?
            .len();
        let estimate = self.policy.estimate_from_size(size);
        debug!(path = %src.display(), size, estimate, "Estimated voice duration from size");

        if has_silk_magic(&read_header(src).await?) {
            return self.passthrough(src, estimate).await;
        }

        info!(path = %src.display(), "Voice file needs conversion to silk");
        let source = tokio::fs::read(src)
            .await
            .map_err(|e| MediaError::io(src, e))?;

        let stem = Uuid::new_v4().to_string();
        let output = self.output_dir.join(format!("{stem}.silk"));

        let (pcm, intermediate) = if self.codec.is_wav(&source) {
            (source, None)
        } else {
            let wav_path = self.output_dir.join(format!("{stem}.wav"));
            let converted = self.to_waveform(src, &wav_path).await;
            (converted?, Some(wav_path))
        };

        let encoded = self.codec.encode(&pcm, 0).await;
        if let Some(wav_path) = &intermediate {
            remove_best_effort(wav_path).await;
        }
        let encoded = encoded?;

        tokio::fs::write(&output, &encoded.data)
            .await
            .map_err(|e| MediaError::io(&output, e))?;

        let duration = self.policy.reconcile(encoded.duration_ms / 1000, estimate);
        info!(
            src = %src.display(),
            output = %output.display(),
            codec_ms = encoded.duration_ms,
            duration,
            "Voice converted to silk"
        );

        Ok(TranscodedAudio {
            converted: true,
            path: output,
            duration,
        })
    }

    async fn passthrough(&self, src: &Path, estimate: u64) -> Result<TranscodedAudio> {
        let data = tokio::fs::read(src)
            .await
            .map_err(|e| MediaError::io(src, e))?;

        let duration = match self.codec.decode_duration_ms(&data) {
            Ok(ms) => self.policy.reconcile(ms / 1000, estimate),
            Err(e) => {
                warn!(
                    path = %src.display(),
                    error = %e,
                    "Could not read silk duration, using size estimate"
                );
                estimate
            }
        };

        Ok(TranscodedAudio {
            converted: false,
            path: src.to_path_buf(),
            duration,
        })
    }

    async fn to_waveform(&self, src: &Path, wav_path: &Path) -> Result<Vec<u8>> {
        let options = ConvertOptions::mono_wav(self.sample_rate);
        if let Err(e) = self.converter.convert(src, wav_path, &options).await {
            remove_best_effort(wav_path).await;
            return Err(e);
        }
        let pcm = tokio::fs::read(wav_path)
            .await
            .map_err(|e| MediaError::io(wav_path, e));
        if pcm.is_err() {
            remove_best_effort(wav_path).await;
        }
        pcm
    }
}

async fn read_header(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)
        .await
        .map_err(|e| MediaError::io(path, e))?;
    let mut header = Vec::with_capacity(SILK_MAGIC.len());
    file.take(SILK_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .await
        .map_err(|e| MediaError::io(path, e))?;
    Ok(header)
}

async fn remove_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "Could not remove intermediate file"),
    }
}
