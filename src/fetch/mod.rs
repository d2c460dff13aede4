//! Resource fetching.
//!
//! The [`Fetch`] trait is the narrow boundary the core requires of its
//! retrieval collaborators: give it a URI, get back bytes plus a media
//! type. Built-in implementations cover HTTP(S) and local files;
//! everything else is rejected as an unsupported medium.

use crate::config::FetchConfig;
use crate::models::Committable;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// A fetched, crawl-visitable resource.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Location the resource was fetched from.
    pub url: Url,
    /// Media type, without parameters.
    pub media_type: String,
    /// Raw bytes of the resource.
    pub body: Vec<u8>,
}

impl Resource {
    /// Wraps an already-resolved payload as a resource.
    #[must_use]
    pub const fn new(url: Url, media_type: String, body: Vec<u8>) -> Self {
        Self {
            url,
            media_type,
            body,
        }
    }

    /// Extracts outbound links, used by the crawler to expand its
    /// frontier. Only HTML resources carry links; everything else is a
    /// leaf.
    #[must_use]
    pub fn links(&self) -> Vec<Url> {
        if self.media_type.starts_with("text/html") {
            crate::parse::html::extract_links(&self.url, &self.body)
        } else {
            Vec::new()
        }
    }

    /// Converts into the committable shape used by the parser dispatch.
    #[must_use]
    pub fn into_committable(self) -> Committable {
        Committable {
            url: self.url,
            encoding_format: self.media_type,
            blob: self.body,
            name: None,
            encoding: None,
        }
    }
}

impl From<Committable> for Resource {
    fn from(c: Committable) -> Self {
        Self::new(c.url, c.encoding_format, c.blob)
    }
}

/// Trait for resource fetchers.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Retrieves the resource at `uri`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnsupportedMedium`] when the scheme is not
    /// supported or the media type cannot be determined, and
    /// [`Error::OperationFailed`] on I/O failure.
    async fn fetch(&self, uri: &Url) -> Result<Resource>;
}

/// HTTP(S) fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Creates an HTTP fetcher from the given settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::op("build_http_client", e))?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, uri: &Url) -> Result<Resource> {
        tracing::debug!(url = %uri, "fetching over http");
        let response = self
            .client
            .get(uri.clone())
            .send()
            .await
            .map_err(|e| Error::op("http_fetch", e))?;

        // The media type must be determinable; strip parameters such as
        // "; charset=utf-8".
        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .ok_or_else(|| {
                Error::UnsupportedMedium(format!("could not determine media type for {uri}"))
            })?;

        // Redirects may land elsewhere; keep the final location.
        let final_url = response.url().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::op("http_fetch_body", e))?;
        if body.len() as u64 > self.max_body_bytes {
            return Err(Error::op(
                "http_fetch_body",
                format!("body of {uri} exceeds {} bytes", self.max_body_bytes),
            ));
        }

        Ok(Resource::new(final_url, media_type, body.to_vec()))
    }
}

/// Local file fetcher.
///
/// Media type is derived from the file extension, falling back to
/// `application/octet-stream`.
#[derive(Debug, Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self, uri: &Url) -> Result<Resource> {
        let path = uri
            .to_file_path()
            .map_err(|()| Error::InvalidInput(format!("not a file path: {uri}")))?;
        tracing::debug!(path = %path.display(), "reading local file");
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::op("file_fetch", e))?;
        Ok(Resource::new(
            uri.clone(),
            media_type_for_path(&path).to_string(),
            body,
        ))
    }
}

/// Dispatches to the appropriate fetcher by URI scheme.
pub struct FetchDispatcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl FetchDispatcher {
    /// Creates a dispatcher covering the built-in schemes.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
            file: FileFetcher,
        })
    }
}

#[async_trait]
impl Fetch for FetchDispatcher {
    async fn fetch(&self, uri: &Url) -> Result<Resource> {
        match uri.scheme() {
            "http" | "https" => self.http.fetch(uri).await,
            "file" => self.file.fetch(uri).await,
            other => Err(Error::UnsupportedMedium(format!(
                "scheme not supported: {other} ({uri})"
            ))),
        }
    }
}

/// Maps a file extension to a media type.
fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("md" | "markdown") => "text/markdown",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
