use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::util::{check_public_url, check_scheme};

/// Default cap on a fetched media or page body.
pub const DEFAULT_MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Refusing to fetch {0}")]
    InvalidUrl(String),
}

/// How a request is made, mirroring what a browser allows a page to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Normal request. Status and headers are readable.
    Cors,
    /// Anonymous request without referrer. Only the body is usable; status
    /// and content type are hidden from the caller.
    Opaque,
}

#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// `None` for opaque responses.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content type without parameters, lowercased.
    pub fn mime(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Network access for media and link previews.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<FetchedBody, FetchError>;
}

/// [`MediaFetcher`] over `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
    anonymous: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    allow_loopback: bool,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let anonymous = reqwest::Client::builder()
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .referer(false)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            anonymous,
            timeout,
            max_bytes,
            allow_loopback: false,
        })
    }

    /// Permits loopback and private addresses. Only for talking to local
    /// mock servers.
    pub fn allow_loopback(mut self, allow: bool) -> Self {
        self.allow_loopback = allow;
        self
    }

    fn check(&self, url: &Url) -> Result<(), FetchError> {
        let checked = if self.allow_loopback {
            check_scheme(url)
        } else {
            check_public_url(url)
        };
        checked.map_err(|e| {
            tracing::debug!(url = %url, reason = %e, "Fetch blocked by URL validation");
            FetchError::InvalidUrl(url.to_string())
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<FetchedBody, FetchError> {
        self.check(url)?;

        let client = match mode {
            FetchMode::Cors => &self.client,
            FetchMode::Opaque => &self.anonymous,
        };
        let response = tokio::time::timeout(self.timeout, client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e)
                }
            })?;

        let content_type = match mode {
            FetchMode::Cors => {
                if !response.status().is_success() {
                    return Err(FetchError::HttpStatus(response.status().as_u16()));
                }
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            }
            FetchMode::Opaque => None,
        };

        let bytes = read_limited_bytes(response, self.max_bytes).await?;
        tracing::debug!(url = %url, ?mode, len = bytes.len(), "Fetched");
        Ok(FetchedBody {
            content_type,
            bytes,
        })
    }
}

pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if usize::try_from(len).map_or(true, |len| len > limit) {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5), 1024)
            .unwrap()
            .allow_loopback(true)
    }

    #[tokio::test]
    async fn test_cors_fetch_reads_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G'])
                    .insert_header("Content-Type", "image/png; charset=binary"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/cat.png", server.uri())).unwrap();
        let body = fetcher().fetch(&url, FetchMode::Cors).await.unwrap();
        assert_eq!(body.mime().as_deref(), Some("image/png"));
        assert_eq!(body.bytes.len(), 4);
    }

    #[tokio::test]
    async fn test_cors_fetch_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let err = fetcher().fetch(&url, FetchMode::Cors).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(403)));
    }

    #[tokio::test]
    async fn test_opaque_fetch_hides_headers_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_bytes(b"GIF89a".to_vec())
                    .insert_header("Content-Type", "image/gif"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let body = fetcher().fetch(&url, FetchMode::Opaque).await.unwrap();
        assert!(body.content_type.is_none());
        assert_eq!(body.bytes, b"GIF89a");
    }

    #[tokio::test]
    async fn test_body_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/big", server.uri())).unwrap();
        let err = fetcher().fetch(&url, FetchMode::Cors).await.unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge(1024)));
    }

    #[tokio::test]
    async fn test_loopback_blocked_by_default() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5), 1024).unwrap();
        let url = Url::parse("http://127.0.0.1:9/x.png").unwrap();
        let err = fetcher.fetch(&url, FetchMode::Cors).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
