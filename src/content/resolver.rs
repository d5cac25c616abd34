use std::sync::Arc;
use thiserror::Error;
use url::Url;

use super::blobs::{BlobRegistry, LocalRef};
use super::fetcher::{FetchError, FetchMode, FetchedBody, MediaFetcher};
use super::metadata::parse_metadata;
use crate::trust::TrustPolicy;

const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png", "webp", "bmp", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "ogv"];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Host is not trusted: {0}")]
    Untrusted(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Empty response body")]
    EmptyPayload,
    #[error("Unrecognized content")]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Media ready to display.
#[derive(Debug)]
pub struct ResolvedMedia {
    pub source_url: Url,
    /// Downloaded copy, or `None` when the source URL is displayed directly.
    pub local_ref: Option<LocalRef>,
    pub kind: MediaKind,
}

impl ResolvedMedia {
    /// The URL a renderer should load.
    pub fn display_url(&self) -> String {
        match &self.local_ref {
            Some(local) => local.url(),
            None => self.source_url.to_string(),
        }
    }
}

/// A web page summarized from its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePreview {
    pub url: Url,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug)]
pub enum Resolution {
    Media(ResolvedMedia),
    Page(PagePreview),
}

/// What an explicit link preview shows.
#[derive(Debug)]
pub enum LinkPreview {
    Media(ResolvedMedia),
    Page(PagePreview),
    /// Shown for untrusted links and when resolution failed.
    HostOnly { url: Url, host: String },
}

/// Media kind implied by the last path segment's extension.
///
/// ```
/// use murmur::content::{media_kind_for_url, MediaKind};
/// use url::Url;
///
/// let url = Url::parse("https://i.imgur.com/a.PNG?size=2").unwrap();
/// assert_eq!(media_kind_for_url(&url), Some(MediaKind::Image));
/// let url = Url::parse("https://example.com/clip.webm").unwrap();
/// assert_eq!(media_kind_for_url(&url), Some(MediaKind::Video));
/// let url = Url::parse("https://example.com/page.html").unwrap();
/// assert_eq!(media_kind_for_url(&url), None);
/// ```
pub fn media_kind_for_url(url: &Url) -> Option<MediaKind> {
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Recognizes common media formats from their leading bytes.
fn sniff(bytes: &[u8]) -> Option<(MediaKind, &'static str)> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some((MediaKind::Image, "image/png")),
        [b'G', b'I', b'F', b'8', ..] => Some((MediaKind::Image, "image/gif")),
        [0xFF, 0xD8, 0xFF, ..] => Some((MediaKind::Image, "image/jpeg")),
        [b'B', b'M', ..] => Some((MediaKind::Image, "image/bmp")),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
            Some((MediaKind::Image, "image/webp"))
        }
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some((MediaKind::Video, "video/webm")),
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some((MediaKind::Video, "video/mp4")),
        _ => None,
    }
}

fn is_html(mime: &str) -> bool {
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Turns a URL into something displayable, honoring the trust policy.
///
/// Resolution order:
/// 1. trusted URL with an image extension: displayed directly, no request
/// 2. normal fetch: media bodies become a [`LocalRef`], HTML becomes a
///    [`PagePreview`]
/// 3. anonymous fetch when the normal one failed: the body is kept if it
///    looks like media
pub struct BlobResolver {
    policy: Arc<TrustPolicy>,
    fetcher: Arc<dyn MediaFetcher>,
    blobs: Arc<BlobRegistry>,
}

impl BlobResolver {
    pub fn new(
        policy: Arc<TrustPolicy>,
        fetcher: Arc<dyn MediaFetcher>,
        blobs: Arc<BlobRegistry>,
    ) -> Self {
        Self {
            policy,
            fetcher,
            blobs,
        }
    }

    pub fn policy(&self) -> &Arc<TrustPolicy> {
        &self.policy
    }

    pub fn blobs(&self) -> &Arc<BlobRegistry> {
        &self.blobs
    }

    pub async fn resolve(&self, url: &Url) -> Result<Resolution, ResolveError> {
        if !self.policy.is_trusted_url(url) {
            return Err(ResolveError::Untrusted(url.to_string()));
        }

        if media_kind_for_url(url) == Some(MediaKind::Image) {
            return Ok(Resolution::Media(ResolvedMedia {
                source_url: url.clone(),
                local_ref: None,
                kind: MediaKind::Image,
            }));
        }

        // Only a request that never got an answer is retried. A server that
        // answered with an error status has nothing to embed.
        match self.fetcher.fetch(url, FetchMode::Cors).await {
            Ok(body) => self.from_readable(url, body),
            Err(e @ (FetchError::Network(_) | FetchError::Timeout)) => {
                tracing::debug!(url = %url, error = %e, "Direct fetch failed, retrying anonymously");
                let body = self.fetcher.fetch(url, FetchMode::Opaque).await?;
                self.from_opaque(url, body)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves for an inline embed. Anything other than media is dropped
    /// without noise.
    pub async fn resolve_inline(&self, url: &Url) -> Option<ResolvedMedia> {
        match self.resolve(url).await {
            Ok(Resolution::Media(media)) => Some(media),
            Ok(Resolution::Page(_)) => None,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Inline media not resolved");
                None
            }
        }
    }

    /// Resolves for an explicit preview. Untrusted links are not fetched and
    /// failures degrade to the hostname.
    pub async fn preview(&self, url: &Url) -> LinkPreview {
        let host_only = || LinkPreview::HostOnly {
            url: url.clone(),
            host: url.host_str().unwrap_or_default().to_owned(),
        };

        if !self.policy.is_trusted_url(url) {
            return host_only();
        }
        match self.resolve(url).await {
            Ok(Resolution::Media(media)) => LinkPreview::Media(media),
            Ok(Resolution::Page(page)) => LinkPreview::Page(page),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Preview degraded to hostname");
                host_only()
            }
        }
    }

    fn from_readable(&self, url: &Url, body: FetchedBody) -> Result<Resolution, ResolveError> {
        let mime = body.mime().unwrap_or_default();
        let kind = if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        };

        if let Some(kind) = kind {
            if body.is_empty() {
                return Err(ResolveError::EmptyPayload);
            }
            return Ok(self.materialize(url, kind, Some(mime), body.bytes));
        }

        if is_html(&mime) {
            let html = String::from_utf8_lossy(&body.bytes);
            let meta = parse_metadata(&html, Some(url));
            return Ok(Resolution::Page(PagePreview {
                url: url.clone(),
                title: meta.title,
                description: meta.description,
                image: meta.image,
            }));
        }

        // Servers that mislabel media still get a chance
        match sniff(&body.bytes) {
            Some((kind, mime)) => Ok(self.materialize(url, kind, Some(mime.to_owned()), body.bytes)),
            None if body.is_empty() => Err(ResolveError::EmptyPayload),
            None => Err(ResolveError::Unrecognized),
        }
    }

    fn from_opaque(&self, url: &Url, body: FetchedBody) -> Result<Resolution, ResolveError> {
        if body.is_empty() {
            return Err(ResolveError::EmptyPayload);
        }
        let (kind, mime) = match sniff(&body.bytes) {
            Some((kind, mime)) => (kind, Some(mime.to_owned())),
            None => match media_kind_for_url(url) {
                Some(kind) => (kind, None),
                None => return Err(ResolveError::Unrecognized),
            },
        };
        Ok(self.materialize(url, kind, mime, body.bytes))
    }

    fn materialize(
        &self,
        url: &Url,
        kind: MediaKind,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Resolution {
        let local = self.blobs.create(mime, bytes);
        tracing::debug!(url = %url, local = %local.url(), ?kind, "Media materialized");
        Resolution::Media(ResolvedMedia {
            source_url: url.clone(),
            local_ref: Some(local),
            kind,
        })
    }
}
