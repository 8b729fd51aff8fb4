use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File did not arrive within {timeout_ms} ms: {}", path.display())]
    NotArrived { path: PathBuf, timeout_ms: u128 },

    #[error("Audio conversion failed: {0}")]
    Conversion(String),

    #[error("Silk encoder failed: {0}")]
    Encoder(String),

    #[error("Invalid silk stream: {0}")]
    InvalidSilk(String),

    #[error("Invalid waveform container: {0}")]
    InvalidWav(String),
}

impl MediaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
