//! Turning inbound media references into local files.
//!
//! A reference is one of:
//! - `base64://<payload>` or `data:<mime>[;base64],<payload>`: decoded and
//!   written under the temp dir
//! - `http://` / `https://`: downloaded and written under the temp dir
//! - `file://<path>`: used in place
//! - anything else that parses as a URI: looked up in the file cache, falling
//!   back to the URI string itself as a path
//!
//! Materialised files without a known extension are sniffed and renamed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use onebridge_media::detect_file;
use onebridge_net::{Downloader, Url};
use onebridge_store::Database;

use crate::error::ResolveError;

/// Accepts padded and unpadded input alike.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// How the path component of a `file://` URI maps onto the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/home/a/x.png` is used verbatim.
    Posix,
    /// `/C:/x.png` loses its leading slash.
    Windows,
}

impl PathStyle {
    pub fn host() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }
}

/// Normalise the decoded path component of a `file://` URI.
pub fn file_uri_path(decoded: &str, style: PathStyle) -> &str {
    match style {
        PathStyle::Posix => decoded,
        PathStyle::Windows => {
            let mut chars = decoded.chars();
            chars.next();
            chars.as_str()
        }
    }
}

/// Read side of the persisted URI -> local path cache.
#[async_trait]
pub trait FileCacheLookup: Send + Sync {
    async fn lookup_by_uri(&self, uri: &str) -> Option<PathBuf>;
}

/// A lookup that never hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFileCache;

#[async_trait]
impl FileCacheLookup for NoFileCache {
    async fn lookup_by_uri(&self, _uri: &str) -> Option<PathBuf> {
        None
    }
}

#[async_trait]
impl FileCacheLookup for Mutex<Database> {
    async fn lookup_by_uri(&self, uri: &str) -> Option<PathBuf> {
        let db = match self.lock() {
            Ok(db) => db,
            Err(_) => {
                warn!(uri, "File cache database lock poisoned");
                return None;
            }
        };
        match db.file_cache_by_uri(uri) {
            Ok(record) => record.map(|r| PathBuf::from(r.local_path)),
            Err(e) => {
                warn!(uri, error = %e, "File cache lookup failed");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedResource {
    pub success: bool,
    pub err_msg: String,
    pub file_name: String,
    /// Extension without the dot, empty when unknown.
    pub ext: String,
    pub path: PathBuf,
    /// Whether the file already existed locally (nothing was materialised).
    pub is_local: bool,
}

impl ResolvedResource {
    fn failure(err: &ResolveError) -> Self {
        Self {
            err_msg: err.to_string(),
            ..Self::default()
        }
    }
}

pub struct ResourceResolver {
    temp_dir: PathBuf,
    path_style: PathStyle,
    downloader: Downloader,
    file_cache: Box<dyn FileCacheLookup>,
}

impl ResourceResolver {
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        path_style: PathStyle,
        downloader: Downloader,
        file_cache: Box<dyn FileCacheLookup>,
    ) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            path_style,
            downloader,
            file_cache,
        }
    }

    /// Resolve `uri` to a local file. Never fails outright: errors come back
    /// as `success == false` with `err_msg` set.
    pub async fn resolve(&self, uri: &str, hint: Option<&str>) -> ResolvedResource {
        match self.try_resolve(uri, hint).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(uri = %truncated(uri), error = %e, "Failed to resolve resource");
                ResolvedResource::failure(&e)
            }
        }
    }

    pub async fn try_resolve(
        &self,
        uri: &str,
        hint: Option<&str>,
    ) -> Result<ResolvedResource, ResolveError> {
        let url = Url::parse(uri).map_err(|e| ResolveError::InvalidUri {
            uri: truncated(uri).to_string(),
            reason: e.to_string(),
        })?;
        let hint = hint.and_then(base_name);

        let resolved = match url.scheme() {
            "base64" => {
                let payload = uri.split_once("://").map(|(_, p)| p).unwrap_or_default();
                let data = decode_base64(payload)?;
                self.materialize(&data, hint, None).await?
            }
            "data" => {
                let (data, ext) = decode_data_uri(uri)?;
                self.materialize(&data, hint, ext).await?
            }
            "http" | "https" => {
                let data = self
                    .downloader
                    .fetch(url.as_str())
                    .await
                    .map_err(|source| ResolveError::Download {
                        url: url.to_string(),
                        source,
                    })?;
                let name = url_file_name(&url);
                self.materialize(&data, name.as_deref().or(hint), None)
                    .await?
            }
            "file" => {
                let decoded = urlencoding::decode(url.path())
                    .map_err(|e| ResolveError::InvalidUri {
                        uri: uri.to_string(),
                        reason: e.to_string(),
                    })?;
                local(PathBuf::from(file_uri_path(&decoded, self.path_style)))?
            }
            _ => {
                let path = match self.file_cache.lookup_by_uri(uri).await {
                    Some(path) => {
                        debug!(uri, path = %path.display(), "File cache hit");
                        path
                    }
                    None => PathBuf::from(uri),
                };
                local(path)?
            }
        };

        if resolved.is_local || !resolved.ext.is_empty() {
            return Ok(resolved);
        }
        Ok(sniff_and_rename(resolved).await)
    }

    async fn materialize(
        &self,
        data: &[u8],
        name: Option<&str>,
        ext: Option<String>,
    ) -> Result<ResolvedResource, ResolveError> {
        let path = unique_path(&self.temp_dir, name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| ResolveError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), size = data.len(), "Materialised resource");

        // name extensions are not trusted, only a declared media type is
        let file_name = name.map(str::to_string).unwrap_or_else(|| file_name_of(&path));
        Ok(ResolvedResource {
            success: true,
            err_msg: String::new(),
            file_name,
            ext: ext.unwrap_or_default(),
            path,
            is_local: false,
        })
    }
}

fn local(path: PathBuf) -> Result<ResolvedResource, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::NotFound(path));
    }
    Ok(ResolvedResource {
        success: true,
        err_msg: String::new(),
        file_name: file_name_of(&path),
        ext: extension_of(&path),
        path,
        is_local: true,
    })
}

async fn sniff_and_rename(mut resolved: ResolvedResource) -> ResolvedResource {
    let kind = match detect_file(&resolved.path).await {
        Ok(Some(kind)) => kind,
        Ok(None) => return resolved,
        Err(e) => {
            debug!(path = %resolved.path.display(), error = %e, "Could not sniff file type");
            return resolved;
        }
    };

    let mut renamed = resolved.path.clone().into_os_string();
    renamed.push(".");
    renamed.push(kind.ext);
    let renamed = PathBuf::from(renamed);

    if let Err(e) = tokio::fs::rename(&resolved.path, &renamed).await {
        warn!(path = %resolved.path.display(), error = %e, "Could not append sniffed extension");
        return resolved;
    }
    debug!(path = %renamed.display(), ext = kind.ext, "Detected file type");

    resolved.path = renamed;
    resolved.file_name = format!("{}.{}", resolved.file_name, kind.ext);
    resolved.ext = kind.ext.to_string();
    resolved
}

/// `<temp_dir>/<uuid>-<name>`, or `<temp_dir>/<uuid>` without a name.
fn unique_path(temp_dir: &Path, name: Option<&str>) -> PathBuf {
    let id = Uuid::new_v4();
    match name {
        Some(name) => temp_dir.join(format!("{id}-{name}")),
        None => temp_dir.join(id.to_string()),
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, ResolveError> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT
        .decode(cleaned)
        .map_err(|e| ResolveError::Decode(e.to_string()))
}

/// Decode an RFC 2397 `data:` URI, returning the bytes and the extension
/// implied by its media type.
fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, Option<String>), ResolveError> {
    let rest = uri.get("data:".len()..).unwrap_or_default();
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ResolveError::Decode("data uri without ','".into()))?;

    let mut params = meta.split(';');
    let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let data = if is_base64 {
        decode_base64(payload)?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok((data, mime_extension(&mime)))
}

fn mime_extension(mime: &str) -> Option<String> {
    let subtype = mime.split_once('/')?.1;
    let subtype = subtype.split('+').next().unwrap_or(subtype);
    match subtype {
        "" => None,
        "jpeg" => Some("jpg".to_string()),
        "mpeg" => Some("mp3".to_string()),
        "plain" => Some("txt".to_string()),
        other => Some(other.to_string()),
    }
}

/// Last path segment of a URL, percent-decoded.
fn url_file_name(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    base_name(&decoded).map(str::to_string)
}

/// Final component of a caller-supplied name, so a decoded `%2F` or a hint
/// like `../x.png` cannot leave the temp dir.
fn base_name(name: &str) -> Option<&str> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    (!last.is_empty() && last != "." && last != "..").then_some(last)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Embedded payloads can be megabytes long; keep logs readable.
fn truncated(uri: &str) -> &str {
    match uri.char_indices().nth(120) {
        Some((idx, _)) => &uri[..idx],
        None => uri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use onebridge_store::FileCacheRecord;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn resolver(temp: &TempDir, style: PathStyle) -> ResourceResolver {
        ResourceResolver::new(
            temp.path(),
            style,
            Downloader::new().unwrap(),
            Box::new(NoFileCache),
        )
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    async fn start_server() -> String {
        let app = Router::new()
            .route("/files/logo", get(|| async { PNG_HEADER.to_vec() }))
            .route("/files/notes.txt", get(|| async { "plain text" }))
            .route("/img.php", get(|| async { PNG_HEADER.to_vec() }))
            .route("/unicode/*name", get(|| async { "x" }))
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));

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
    async fn test_base64_payload() {
        let temp = TempDir::new().unwrap();
        let res = resolver(&temp, PathStyle::Posix)
            .resolve("base64://aGVsbG8=", None)
            .await;

        assert!(res.success, "{}", res.err_msg);
        assert!(!res.is_local);
        assert!(res.path.starts_with(temp.path()));
        assert_eq!(std::fs::read(&res.path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_base64_unpadded_with_hint() {
        let temp = TempDir::new().unwrap();
        let res = resolver(&temp, PathStyle::Posix)
            .resolve("base64://aGVsbG8", Some("greeting.txt"))
            .await;

        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.file_name, "greeting.txt");
        // nothing recognisable in the bytes, so no extension is claimed
        assert_eq!(res.ext, "");
        assert!(res
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-greeting.txt"));
        assert_eq!(std::fs::read(&res.path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_base64_sniffed_extension() {
        let temp = TempDir::new().unwrap();
        let uri = format!("base64://{}", base64::engine::general_purpose::STANDARD.encode(PNG_HEADER));
        let res = resolver(&temp, PathStyle::Posix).resolve(&uri, None).await;

        assert!(res.success);
        assert_eq!(res.ext, "png");
        assert!(res.file_name.ends_with(".png"));
        assert_eq!(res.path.extension().unwrap(), "png");
        assert!(res.path.exists());
        assert_eq!(entries(temp.path()), 1);
    }

    #[tokio::test]
    async fn test_data_uri() {
        let temp = TempDir::new().unwrap();
        let r = resolver(&temp, PathStyle::Posix);

        let res = r.resolve("data:image/jpeg;base64,aGVsbG8=", None).await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.ext, "jpg");
        assert_eq!(std::fs::read(&res.path).unwrap(), b"hello");

        let res = r.resolve("data:text/plain,hi%20there", None).await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.ext, "txt");
        assert_eq!(std::fs::read(&res.path).unwrap(), b"hi there");
    }

    #[tokio::test]
    async fn test_malformed_inputs_write_nothing() {
        let temp = TempDir::new().unwrap();
        let r = resolver(&temp, PathStyle::Posix);

        let res = r.resolve("definitely not a uri", None).await;
        assert!(!res.success);
        assert!(res.err_msg.contains("could not be parsed"));

        let res = r.resolve("base64://!!!!", None).await;
        assert!(!res.success);
        assert!(res.err_msg.contains("decoded"));

        assert_eq!(entries(temp.path()), 0);
    }

    #[test]
    fn test_file_uri_path_styles() {
        let url = Url::parse("file:///C:/x.png").unwrap();
        let decoded = urlencoding::decode(url.path()).unwrap();
        assert_eq!(file_uri_path(&decoded, PathStyle::Windows), "C:/x.png");
        assert_eq!(file_uri_path(&decoded, PathStyle::Posix), "/C:/x.png");
    }

    #[tokio::test]
    async fn test_local_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("my pic.gif");
        std::fs::write(&file, b"GIF89a").unwrap();

        let uri = Url::from_file_path(&file).unwrap();
        assert!(uri.as_str().contains("my%20pic.gif"));

        let res = resolver(&temp, PathStyle::Posix)
            .resolve(uri.as_str(), None)
            .await;
        assert!(res.success, "{}", res.err_msg);
        assert!(res.is_local);
        assert_eq!(res.path, file);
        assert_eq!(res.file_name, "my pic.gif");
        assert_eq!(res.ext, "gif");
        assert_eq!(entries(temp.path()), 1);
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let temp = TempDir::new().unwrap();
        let res = resolver(&temp, PathStyle::Posix)
            .resolve("file:///nonexistent/onebridge/x.png", None)
            .await;
        assert!(!res.success);
        assert!(res.err_msg.contains("not found"));
    }

    #[tokio::test]
    async fn test_opaque_reference_uses_file_cache() {
        let temp = TempDir::new().unwrap();
        let cached = temp.path().join("cached.mp4");
        std::fs::write(&cached, b"video").unwrap();

        let db = Database::open_in_memory().unwrap();
        db.insert_file_cache(&FileCacheRecord {
            uri: "cache:abc123".to_string(),
            file_name: "cached.mp4".to_string(),
            local_path: cached.to_string_lossy().into_owned(),
            file_size: 5,
            content_hash: String::new(),
            created_at: chrono::Utc::now(),
        })
        .unwrap();

        let r = ResourceResolver::new(
            temp.path(),
            PathStyle::Posix,
            Downloader::new().unwrap(),
            Box::new(Mutex::new(db)),
        );

        let res = r.resolve("cache:abc123", None).await;
        assert!(res.success, "{}", res.err_msg);
        assert!(res.is_local);
        assert_eq!(res.path, cached);
        assert_eq!(res.ext, "mp4");

        // no record and no such path
        let res = r.resolve("cache:unknown", None).await;
        assert!(!res.success);
    }

    #[tokio::test]
    async fn test_http_download_named_from_url() {
        let base = start_server().await;
        let temp = TempDir::new().unwrap();
        let r = resolver(&temp, PathStyle::Posix);

        let res = r
            .resolve(&format!("{base}/files/notes.txt"), Some("ignored.bin"))
            .await;
        assert!(res.success, "{}", res.err_msg);
        assert!(!res.is_local);
        assert_eq!(res.file_name, "notes.txt");
        assert_eq!(res.ext, "");
        assert_eq!(std::fs::read(&res.path).unwrap(), b"plain text");

        let res = r.resolve(&format!("{base}/unicode/%E5%9B%BE.bin"), None).await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.file_name, "图.bin");
    }

    #[tokio::test]
    async fn test_http_download_sniffed() {
        let base = start_server().await;
        let temp = TempDir::new().unwrap();

        let res = resolver(&temp, PathStyle::Posix)
            .resolve(&format!("{base}/files/logo"), None)
            .await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.file_name, "logo.png");
        assert_eq!(res.ext, "png");
        assert_eq!(std::fs::read(&res.path).unwrap(), PNG_HEADER);
    }

    #[tokio::test]
    async fn test_url_extension_does_not_skip_sniffing() {
        let base = start_server().await;
        let temp = TempDir::new().unwrap();

        let res = resolver(&temp, PathStyle::Posix)
            .resolve(&format!("{base}/img.php"), None)
            .await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.ext, "png");
        assert_eq!(res.file_name, "img.php.png");
        assert!(res.path.to_string_lossy().ends_with("-img.php.png"));
        assert!(res.path.exists());
    }

    #[tokio::test]
    async fn test_hint_extension_does_not_skip_sniffing() {
        let temp = TempDir::new().unwrap();
        let uri = format!("base64://{}", base64::engine::general_purpose::STANDARD.encode(PNG_HEADER));

        let res = resolver(&temp, PathStyle::Posix)
            .resolve(&uri, Some("photo.jpg"))
            .await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.ext, "png");
        assert_eq!(res.file_name, "photo.jpg.png");
    }

    #[tokio::test]
    async fn test_hint_is_reduced_to_its_file_name() {
        let temp = TempDir::new().unwrap();
        let r = resolver(&temp, PathStyle::Posix);

        let res = r.resolve("base64://aGVsbG8=", Some("../nested/dir\\note.txt")).await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.file_name, "note.txt");
        assert_eq!(res.path.parent(), Some(temp.path()));
        assert_eq!(std::fs::read(&res.path).unwrap(), b"hello");

        // nothing usable left: fall back to a bare generated name
        let res = r.resolve("base64://aGVsbG8=", Some("a/..")).await;
        assert!(res.success, "{}", res.err_msg);
        assert_eq!(res.path.parent(), Some(temp.path()));
        assert!(!res.file_name.contains(".."));
    }

    #[tokio::test]
    async fn test_http_failure() {
        let base = start_server().await;
        let temp = TempDir::new().unwrap();

        let res = resolver(&temp, PathStyle::Posix)
            .resolve(&format!("{base}/gone"), None)
            .await;
        assert!(!res.success);
        assert!(res.err_msg.contains("download failed"));
        assert!(res.err_msg.contains("404"));
        assert_eq!(entries(temp.path()), 0);
    }

    #[test]
    fn test_mime_extension() {
        assert_eq!(mime_extension("image/png").as_deref(), Some("png"));
        assert_eq!(mime_extension("image/svg+xml").as_deref(), Some("svg"));
        assert_eq!(mime_extension("audio/mpeg").as_deref(), Some("mp3"));
        assert_eq!(mime_extension(""), None);
    }
}
