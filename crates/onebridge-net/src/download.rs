//! Remote fetches into memory.
//!
//! Every request carries a browser-like default header set unless the caller
//! supplies its own; a caller-supplied set replaces the defaults entirely.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tracing::debug;

use onebridge_shared::constants::DEFAULT_USER_AGENT;

use crate::error::{NetError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Caller-supplied headers, either as a map or as a JSON object string
/// (`{"Referer": "https://..."}`).
#[derive(Debug, Clone)]
pub enum RequestHeaders {
    Map(HashMap<String, String>),
    Json(String),
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub url: String,
    pub headers: Option<RequestHeaders>,
}

impl From<&str> for DownloadOptions {
    fn from(url: &str) -> Self {
        Self {
            url: url.to_string(),
            headers: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` with the default header set.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.fetch_with(&DownloadOptions::from(url)).await
    }

    /// Fetch with explicit options. Non-2xx responses are reported as
    /// [`NetError::Status`].
    pub async fn fetch_with(&self, options: &DownloadOptions) -> Result<Bytes> {
        let headers = match &options.headers {
            Some(custom) => build_headers(custom)?,
            None => default_headers(),
        };

        let response = self
            .client
            .get(&options.url)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response.bytes().await?;
        debug!(url = %options.url, size = body.len(), "Downloaded remote file");
        Ok(body)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

fn build_headers(custom: &RequestHeaders) -> Result<HeaderMap> {
    let pairs: HashMap<String, String> = match custom {
        RequestHeaders::Map(map) => map.clone(),
        RequestHeaders::Json(raw) => serde_json::from_str(raw)
            .map_err(|e| NetError::InvalidHeaders(format!("not a JSON string map: {e}")))?,
    };

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NetError::InvalidHeaders(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| NetError::InvalidHeaders(format!("{name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::get;
    use axum::Router;

    async fn start_server() -> String {
        let app = Router::new()
            .route("/hello.txt", get(|| async { "hello" }))
            .route(
                "/echo-ua",
                get(|headers: AxumHeaders| async move {
                    headers
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
            .route(
                "/echo-referer",
                get(|headers: AxumHeaders| async move {
                    headers
                        .get("referer")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("server addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_body() {
        let base = start_server().await;
        let downloader = Downloader::new().unwrap();

        let body = downloader.fetch(&format!("{base}/hello.txt")).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_default_user_agent_sent() {
        let base = start_server().await;
        let downloader = Downloader::new().unwrap();

        let body = downloader.fetch(&format!("{base}/echo-ua")).await.unwrap();
        assert_eq!(&body[..], DEFAULT_USER_AGENT.as_bytes());
    }

    #[tokio::test]
    async fn test_json_headers_replace_defaults() {
        let base = start_server().await;
        let downloader = Downloader::new().unwrap();

        let options = DownloadOptions {
            url: format!("{base}/echo-referer"),
            headers: Some(RequestHeaders::Json(
                r#"{"Referer": "https://example.org/"}"#.to_string(),
            )),
        };
        let body = downloader.fetch_with(&options).await.unwrap();
        assert_eq!(&body[..], b"https://example.org/");

        let options = DownloadOptions {
            url: format!("{base}/echo-ua"),
            headers: Some(RequestHeaders::Map(HashMap::new())),
        };
        let body = downloader.fetch_with(&options).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_status_error() {
        let base = start_server().await;
        let downloader = Downloader::new().unwrap();

        let err = downloader
            .fetch(&format!("{base}/missing"))
            .await
            .unwrap_err();
        match err {
            NetError::Status { status, reason } => {
                assert_eq!(status, 404);
                assert_eq!(reason, "Not Found");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error() {
        let downloader = Downloader::new().unwrap();
        let err = downloader.fetch("http://127.0.0.1:1/x").await.unwrap_err();
        assert!(matches!(err, NetError::Transport(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_headers() {
        let downloader = Downloader::new().unwrap();
        let options = DownloadOptions {
            url: "http://127.0.0.1:1/x".to_string(),
            headers: Some(RequestHeaders::Json("not json".to_string())),
        };
        let err = downloader.fetch_with(&options).await.unwrap_err();
        assert!(matches!(err, NetError::InvalidHeaders(_)));
    }
}
