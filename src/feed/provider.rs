use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::content::{read_limited_bytes, FetchError};

pub const DEFAULT_TRENDING_URL: &str =
    "https://discord.com/api/v9/gifs/trending?provider=tenor&locale=en-US&media_format=mp4";
pub const DEFAULT_SEARCH_URL: &str =
    "https://discord.com/api/v9/gifs/search?provider=tenor&locale=en-US&media_format=mp4";

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// A single picker result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Direct media URL inserted into the message when picked.
    pub url: String,
    /// Smaller rendition shown in the grid.
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A browse category; selecting it searches for its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Preview clip for the category tile.
    #[serde(default)]
    pub src: Option<String>,
}

/// Trending categories and keyword search for the media picker.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn trending(&self) -> Result<Vec<Category>, ProviderError>;
    async fn search(&self, query: &str) -> Result<Vec<MediaItem>, ProviderError>;
}

/// [`SearchProvider`] for a Tenor-style JSON API.
///
/// Error statuses and unparseable bodies yield empty results; only transport
/// failures are errors.
pub struct HttpSearchProvider {
    client: reqwest::Client,
    trending_url: Url,
    search_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpSearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSearchProvider")
            .field("trending_url", &self.trending_url.as_str())
            .field("search_url", &self.search_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpSearchProvider {
    /// Builds a provider for the given endpoints.
    ///
    /// # Errors
    ///
    /// `InvalidEndpoint` if either URL does not parse or is plain HTTP to
    /// anything but localhost.
    pub fn new(
        client: reqwest::Client,
        trending_url: &str,
        search_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            trending_url: parse_endpoint(trending_url)?,
            search_url: parse_endpoint(search_url)?,
            api_key,
            timeout,
        })
    }

    async fn get_json(&self, url: Url) -> Result<Option<Value>, ProviderError> {
        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ProviderError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url.path(), status = status.as_u16(), "Picker request failed");
            return Ok(None);
        }

        let bytes = match read_limited_bytes(response, MAX_RESPONSE_SIZE).await {
            Ok(bytes) => bytes,
            Err(FetchError::Network(e)) => return Err(ProviderError::Network(e)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding picker response");
                return Ok(None);
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(error = %e, "Picker response is not JSON");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn trending(&self) -> Result<Vec<Category>, ProviderError> {
        let body = self.get_json(self.trending_url.clone()).await?;
        let categories = body.as_ref().map(parse_categories).unwrap_or_default();
        tracing::debug!(count = categories.len(), "Trending categories fetched");
        Ok(categories)
    }

    async fn search(&self, query: &str) -> Result<Vec<MediaItem>, ProviderError> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut().append_pair("q", query);
        let body = self.get_json(url).await?;
        let items = body.as_ref().map(parse_items).unwrap_or_default();
        tracing::debug!(query = %query, count = items.len(), "Search results fetched");
        Ok(items)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw).map_err(|_| ProviderError::InvalidEndpoint(raw.to_owned()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")) => {
            tracing::warn!(endpoint = %raw, "Using non-HTTPS picker endpoint (localhost only)");
            Ok(url)
        }
        _ => Err(ProviderError::InvalidEndpoint(raw.to_owned())),
    }
}

fn http_url(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    let parsed = Url::parse(s).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| s.to_owned())
}

fn dimension(value: Option<&Value>) -> Option<u32> {
    value?.as_u64().and_then(|n| u32::try_from(n).ok())
}

/// Accepts either a bare array of items or `{"gifs": [...]}`. Items without a
/// usable media URL are dropped.
pub fn parse_items(body: &Value) -> Vec<MediaItem> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("gifs").or_else(|| map.get("results")) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    list.iter()
        .filter_map(|item| {
            let url = ["gif_src", "src", "url"]
                .iter()
                .find_map(|field| item.get(*field).and_then(http_url))?;
            let preview = item.get("preview").and_then(http_url).unwrap_or_else(|| url.clone());
            Some(MediaItem {
                url,
                preview,
                width: dimension(item.get("width")),
                height: dimension(item.get("height")),
            })
        })
        .collect()
}

/// Reads `{"categories": [{"name", "src"}]}`. Categories without a name are dropped.
pub fn parse_categories(body: &Value) -> Vec<Category> {
    let Some(Value::Array(list)) = body.get("categories") else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|c| {
            let name = c.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(Category {
                name: name.to_owned(),
                src: c.get("src").and_then(http_url),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, key: Option<&str>) -> HttpSearchProvider {
        HttpSearchProvider::new(
            reqwest::Client::new(),
            &format!("{}/trending", server.uri()),
            &format!("{}/search?provider=tenor", server.uri()),
            key.map(SecretString::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_items_shapes() {
        let array = json!([
            {"gif_src": "https://media.tenor.com/a.gif", "src": "https://x/ignored", "width": 200, "height": 150},
            {"src": "https://media.tenor.com/b.mp4"},
            {"url": "https://media.tenor.com/c.gif", "preview": "https://media.tenor.com/c_small.gif"},
            {"url": "javascript:alert(1)"},
            {"title": "no media"}
        ]);
        let items = parse_items(&array);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].url, "https://media.tenor.com/a.gif");
        assert_eq!(items[0].width, Some(200));
        assert_eq!(items[1].preview, "https://media.tenor.com/b.mp4");
        assert_eq!(items[2].preview, "https://media.tenor.com/c_small.gif");

        let wrapped = json!({"gifs": [{"url": "https://media.tenor.com/d.gif"}]});
        assert_eq!(parse_items(&wrapped).len(), 1);

        assert!(parse_items(&json!({"unexpected": true})).is_empty());
        assert!(parse_items(&json!("string")).is_empty());
    }

    #[test]
    fn test_parse_categories() {
        let body = json!({"categories": [
            {"name": "happy", "src": "https://media.tenor.com/h.mp4"},
            {"name": "  "},
            {"src": "https://media.tenor.com/x.mp4"},
            {"name": "sad"}
        ]});
        assert_eq!(
            parse_categories(&body),
            vec![
                Category {
                    name: "happy".into(),
                    src: Some("https://media.tenor.com/h.mp4".into())
                },
                Category {
                    name: "sad".into(),
                    src: None
                },
            ]
        );
    }

    #[test]
    fn test_endpoint_validation() {
        let client = reqwest::Client::new();
        let build = |t: &str| {
            HttpSearchProvider::new(client.clone(), t, DEFAULT_SEARCH_URL, None, Duration::from_secs(1))
        };
        assert!(build(DEFAULT_TRENDING_URL).is_ok());
        assert!(build("http://localhost:8080/trending").is_ok());
        assert!(matches!(
            build("http://example.com/trending"),
            Err(ProviderError::InvalidEndpoint(_))
        ));
        assert!(matches!(build("not a url"), Err(ProviderError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_search_sends_query_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "happy cat"))
            .and(query_param("provider", "tenor"))
            .and(header("Authorization", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"url": "https://media.tenor.com/a.gif"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let items = provider(&server, Some("secret"))
            .search("happy cat")
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let p = provider(&server, None);
        assert!(p.trending().await.unwrap().is_empty());
        assert!(p.search("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(provider(&server, None).trending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_is_error() {
        let server = MockServer::builder().start().await;
        let p = provider(&server, None);
        drop(server);
        assert!(p.search("x").await.is_err());
    }
}
