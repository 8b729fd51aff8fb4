//! The silk v3 voice codec as seen from the bridge.
//!
//! Encoding is delegated to an external encoder; duration reading and
//! container checks are done natively by walking the frame structure.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use onebridge_shared::constants::{SILK_FRAME_MS, SILK_MAGIC, SILK_V3_HEADER};

use crate::error::{MediaError, Result};
use crate::wav;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilkEncoded {
    pub data: Vec<u8>,
    /// Encoder-reported duration in milliseconds.
    pub duration_ms: u64,
}

/// Codec operations the transcoder relies on.
#[async_trait]
pub trait SilkCodec: Send + Sync {
    /// Encode PCM (raw 16-bit mono, or a WAVE container) into silk.
    /// `sample_rate_hint` of 0 means "take it from the container".
    async fn encode(&self, pcm: &[u8], sample_rate_hint: u32) -> Result<SilkEncoded>;

    fn decode_duration_ms(&self, silk: &[u8]) -> Result<u64> {
        frame_duration_ms(silk)
    }

    fn is_wav(&self, bytes: &[u8]) -> bool {
        wav::is_wav(bytes)
    }
}

/// True when `header` begins with the Tencent silk magic (`\x02#!SILK`).
pub fn has_silk_magic(header: &[u8]) -> bool {
    header.starts_with(&SILK_MAGIC)
}

/// Duration of a silk v3 stream, counting 20 ms per frame.
///
/// Frames are `i16` little-endian length prefixed; a negative length marks
/// the end of stream. Zero-length or truncated frames mean the stream is not
/// trustworthy and are reported as errors.
pub fn frame_duration_ms(bytes: &[u8]) -> Result<u64> {
    let body = bytes.strip_prefix(&[0x02u8]).unwrap_or(bytes);
    let mut rest = body
        .strip_prefix(SILK_V3_HEADER)
        .ok_or_else(|| MediaError::InvalidSilk("missing #!SILK_V3 header".into()))?;

    let mut frames: u64 = 0;
    while rest.len() >= 2 {
        let len = i16::from_le_bytes([rest[0], rest[1]]);
        if len < 0 {
            break;
        }
        if len == 0 {
            return Err(MediaError::InvalidSilk(format!("empty frame #{frames}")));
        }
        let len = len as usize;
        if rest.len() < 2 + len {
            return Err(MediaError::InvalidSilk(format!("truncated frame #{frames}")));
        }
        rest = &rest[2 + len..];
        frames += 1;
    }

    Ok(frames * SILK_FRAME_MS)
}

/// Runs a `silk_v3_encoder`-compatible binary:
/// `<encoder> <in.pcm> <out.silk> -Fs_API <rate> -tencent -quiet`.
#[derive(Debug, Clone)]
pub struct SilkEncoderCli {
    binary: PathBuf,
    work_dir: PathBuf,
}

impl SilkEncoderCli {
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl SilkCodec for SilkEncoderCli {
    async fn encode(&self, pcm: &[u8], sample_rate_hint: u32) -> Result<SilkEncoded> {
        let (raw, container_rate) = if wav::is_wav(pcm) {
            let (format, data) = wav::pcm_data(pcm)?;
            if format.channels != 1 || format.bits_per_sample != 16 {
                return Err(MediaError::Encoder(format!(
                    "expected 16-bit mono PCM, got {} channel(s) at {} bits",
                    format.channels, format.bits_per_sample
                )));
            }
            (data, format.sample_rate)
        } else {
            (pcm, 0)
        };

        let sample_rate = match (sample_rate_hint, container_rate) {
            (0, 0) => onebridge_shared::constants::DEFAULT_SAMPLE_RATE,
            (0, rate) => rate,
            (hint, _) => hint,
        };

        let stem = Uuid::new_v4().to_string();
        let input = self.work_dir.join(format!("{stem}.pcm"));
        let output = self.work_dir.join(format!("{stem}.silk"));

        tokio::fs::write(&input, raw)
            .await
            .map_err(|e| MediaError::io(&input, e))?;

        let result = Command::new(&self.binary)
            .arg(&input)
            .arg(&output)
            .arg("-Fs_API")
            .arg(sample_rate.to_string())
            .args(["-tencent", "-quiet"])
            .output()
            .await;

        if let Err(e) = tokio::fs::remove_file(&input).await {
            debug!(path = %input.display(), error = %e, "Could not remove encoder input");
        }

        let out = result.map_err(|e| {
            MediaError::Encoder(format!("failed to run {}: {e}", self.binary.display()))
        })?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(MediaError::Encoder(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                out.status,
                stderr.trim()
            )));
        }

        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| MediaError::io(&output, e))?;
        if let Err(e) = tokio::fs::remove_file(&output).await {
            warn!(path = %output.display(), error = %e, "Could not remove encoder output");
        }

        let duration_ms = frame_duration_ms(&data)?;
        debug!(size = data.len(), duration_ms, sample_rate, "Encoded silk");
        Ok(SilkEncoded { data, duration_ms })
    }
}

/// Build a Tencent silk stream of `frames` frames, `frame_len` bytes each.
#[cfg(test)]
pub(crate) fn build_silk(frames: usize, frame_len: u16) -> Vec<u8> {
    let mut out = vec![0x02];
    out.extend_from_slice(SILK_V3_HEADER);
    for _ in 0..frames {
        out.extend_from_slice(&(frame_len as i16).to_le_bytes());
        out.extend(std::iter::repeat(0xAB).take(frame_len as usize));
    }
    out
}
