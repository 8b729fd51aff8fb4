// HTTP fetching for remote media references.

pub mod download;
mod error;

pub use download::{DownloadOptions, Downloader, RequestHeaders};
pub use error::NetError;
pub use reqwest::Url;
