use std::path::PathBuf;

use thiserror::Error;

use onebridge_media::MediaError;
use onebridge_net::NetError;
use onebridge_store::StoreError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Remote fetch failed: {0}")]
    Remote(String),

    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn remote(err: anyhow::Error) -> Self {
        Self::Remote(format!("{err:#}"))
    }
}

/// Why a media reference could not be turned into a local file. Rendered
/// into `ResolvedResource::err_msg` at the resolver boundary.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("uri {uri} could not be parsed: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("embedded data could not be decoded: {0}")]
    Decode(String),

    #[error("{url} download failed: {source}")]
    Download {
        url: String,
        #[source]
        source: NetError,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
}
