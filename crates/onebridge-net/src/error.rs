use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Download failed: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Invalid header set: {0}")]
    InvalidHeaders(String),
}

pub type Result<T> = std::result::Result<T, NetError>;
