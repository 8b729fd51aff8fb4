//! Bridge configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the bridge can start with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use onebridge_media::DurationPolicy;
use onebridge_shared::constants::{DEFAULT_FILE_WAIT_MS, DEFAULT_SAMPLE_RATE};

use crate::resolver::PathStyle;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where downloaded and decoded media are materialised.
    /// Env: `ONEBRIDGE_TEMP_DIR`
    /// Default: `<platform data dir>/temp`
    pub temp_dir: PathBuf,

    /// Where transcoded voice files are written.
    /// Env: `ONEBRIDGE_DATA_DIR`
    /// Default: `<platform data dir>/data`
    pub data_dir: PathBuf,

    /// Env: `ONEBRIDGE_FFMPEG`
    /// Default: `ffmpeg` (resolved through `PATH`)
    pub ffmpeg_path: PathBuf,

    /// Env: `ONEBRIDGE_SILK_ENCODER`
    /// Default: `silk_v3_encoder`
    pub silk_encoder_path: PathBuf,

    /// How long to wait for files the host platform hands off.
    /// Env: `ONEBRIDGE_FILE_WAIT_MS`
    pub file_wait_timeout: Duration,

    /// How `file://` paths are normalised.
    /// Env: `ONEBRIDGE_PATH_STYLE` (`windows` / `posix`)
    /// Default: the host platform.
    pub path_style: PathStyle,

    /// Env: `ONEBRIDGE_AUDIO_BYTES_PER_SEC`, `ONEBRIDGE_DURATION_TOLERANCE_SECS`
    pub duration: DurationPolicy,

    /// Sample rate of the intermediate waveform.
    /// Env: `ONEBRIDGE_SAMPLE_RATE`
    pub sample_rate: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let base = ProjectDirs::from("org", "onebridge", "onebridge")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            temp_dir: base.join("temp"),
            data_dir: base.join("data"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            silk_encoder_path: PathBuf::from("silk_v3_encoder"),
            file_wait_timeout: Duration::from_millis(DEFAULT_FILE_WAIT_MS),
            path_style: PathStyle::host(),
            duration: DurationPolicy::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("ONEBRIDGE_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("ONEBRIDGE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(path) = lookup("ONEBRIDGE_FFMPEG") {
            if !path.is_empty() {
                config.ffmpeg_path = PathBuf::from(path);
            }
        }

        if let Some(path) = lookup("ONEBRIDGE_SILK_ENCODER") {
            if !path.is_empty() {
                config.silk_encoder_path = PathBuf::from(path);
            }
        }

        if let Some(ms) = parse_number::<u64>(&lookup, "ONEBRIDGE_FILE_WAIT_MS") {
            config.file_wait_timeout = Duration::from_millis(ms);
        }

        if let Some(style) = lookup("ONEBRIDGE_PATH_STYLE") {
            match style.to_ascii_lowercase().as_str() {
                "windows" => config.path_style = PathStyle::Windows,
                "posix" => config.path_style = PathStyle::Posix,
                _ => tracing::warn!(value = %style, "Invalid ONEBRIDGE_PATH_STYLE, using default"),
            }
        }

        if let Some(rate) = parse_number::<u64>(&lookup, "ONEBRIDGE_AUDIO_BYTES_PER_SEC") {
            if rate > 0 {
                config.duration.bytes_per_second = rate;
            }
        }

        if let Some(secs) = parse_number::<u64>(&lookup, "ONEBRIDGE_DURATION_TOLERANCE_SECS") {
            config.duration.tolerance_secs = secs;
        }

        if let Some(rate) = parse_number::<u32>(&lookup, "ONEBRIDGE_SAMPLE_RATE") {
            if rate > 0 {
                config.sample_rate = rate;
            }
        }

        config
    }

    /// Create the temp and data directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid number, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.file_wait_timeout, Duration::from_millis(3_000));
        assert_eq!(config.duration.bytes_per_second, 3_072);
        assert_eq!(config.duration.tolerance_secs, 10);
        assert_eq!(config.sample_rate, 24_000);
        assert!(config.temp_dir.ends_with("temp"));
    }

    #[test]
    fn test_overrides() {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            ("ONEBRIDGE_TEMP_DIR", "/srv/bridge/tmp"),
            ("ONEBRIDGE_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
            ("ONEBRIDGE_FILE_WAIT_MS", "5000"),
            ("ONEBRIDGE_PATH_STYLE", "Windows"),
            ("ONEBRIDGE_DURATION_TOLERANCE_SECS", "4"),
        ]));

        assert_eq!(config.temp_dir, PathBuf::from("/srv/bridge/tmp"));
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.file_wait_timeout, Duration::from_secs(5));
        assert_eq!(config.path_style, PathStyle::Windows);
        assert_eq!(config.duration.tolerance_secs, 4);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            ("ONEBRIDGE_FILE_WAIT_MS", "soon"),
            ("ONEBRIDGE_AUDIO_BYTES_PER_SEC", "0"),
            ("ONEBRIDGE_PATH_STYLE", "amiga"),
            ("ONEBRIDGE_FFMPEG", ""),
        ]));

        assert_eq!(config.file_wait_timeout, Duration::from_millis(3_000));
        assert_eq!(config.duration.bytes_per_second, 3_072);
        assert_eq!(config.path_style, PathStyle::host());
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_ensure_dirs() {
        let root = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            temp_dir: root.path().join("a/temp"),
            data_dir: root.path().join("a/data"),
            ..BridgeConfig::default()
        };
        config.ensure_dirs().unwrap();
        assert!(config.temp_dir.is_dir());
        assert!(config.data_dir.is_dir());
    }
}
