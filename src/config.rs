//! Configuration file parser for ~/.config/murmur/config.toml.
//!
//! The file is optional; a missing or empty file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::content::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_MEDIA_BYTES};
use crate::feed::{FeedOptions, DEFAULT_SEARCH_URL, DEFAULT_TRENDING_URL};
use crate::scroll::DEFAULT_NEAR_BOTTOM_THRESHOLD;
use crate::storage::DEFAULT_TTL;

/// Environment variable that overrides `search_api_key`.
pub const API_KEY_ENV: &str = "MURMUR_SEARCH_API_KEY";

const KNOWN_KEYS: &[&str] = &[
    "search_debounce_ms",
    "page_size",
    "cache_ttl_hours",
    "near_bottom_threshold",
    "history_page_size",
    "fetch_timeout_secs",
    "max_media_bytes",
    "trending_url",
    "search_url",
    "search_api_key",
    "trusted_domains",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {size} bytes (max {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },
}

/// Top-level application configuration.
///
/// Every key is optional. The `Debug` impl masks `search_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quiet period after the last keystroke before the picker searches.
    pub search_debounce_ms: u64,

    /// Picker results shown per page.
    pub page_size: usize,

    /// How long picker results stay cached.
    pub cache_ttl_hours: u64,

    /// Rows from the bottom within which new messages are followed.
    pub near_bottom_threshold: usize,

    /// Messages loaded per history page.
    pub history_page_size: usize,

    pub fetch_timeout_secs: u64,

    /// Largest media or page body that will be downloaded.
    pub max_media_bytes: usize,

    pub trending_url: String,

    pub search_url: String,

    /// Sent as the `Authorization` header to the picker endpoints.
    /// `MURMUR_SEARCH_API_KEY` takes precedence.
    pub search_api_key: Option<String>,

    /// Extra domains trusted in addition to the built-in list.
    pub trusted_domains: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_debounce_ms: 500,
            page_size: 20,
            cache_ttl_hours: DEFAULT_TTL.as_secs() / 3600,
            near_bottom_threshold: DEFAULT_NEAR_BOTTOM_THRESHOLD,
            history_page_size: 30,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
            trending_url: DEFAULT_TRENDING_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            search_api_key: None,
            trusted_domains: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("search_debounce_ms", &self.search_debounce_ms)
            .field("page_size", &self.page_size)
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("near_bottom_threshold", &self.near_bottom_threshold)
            .field("history_page_size", &self.history_page_size)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_media_bytes", &self.max_media_bytes)
            .field("trending_url", &self.trending_url)
            .field("search_url", &self.search_url)
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("trusted_domains", &self.trusted_domains)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing, empty or whitespace-only file → `Ok(Config::default())`
    /// - Invalid TOML or wrong value types → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warnings
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a corrupted file can't exhaust memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge {
                    size: meta.len(),
                    limit: Self::MAX_FILE_SIZE,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parses TOML text. Blank input gives the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            page_size = config.page_size,
            debounce_ms = config.search_debounce_ms,
            extra_domains = config.trusted_domains.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(60 * 60))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            page_size: self.page_size.max(1),
            debounce: Duration::from_millis(self.search_debounce_ms),
            ..FeedOptions::default()
        }
    }

    /// The picker API key, from the environment first, then the file.
    pub fn api_key(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.search_api_key.clone())
            .map(SecretString::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search_debounce_ms, 500);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.cache_ttl(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.near_bottom_threshold, 50);
        assert_eq!(config.history_page_size, 30);
        assert!(config.trusted_domains.is_empty());
        assert!(config.search_api_key.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let file = write_config("   \n  \n  ");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let file = write_config("page_size = 12\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.page_size, 12);
        assert_eq!(config.search_debounce_ms, 500);
        assert_eq!(config.feed_options().page_size, 12);
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
search_debounce_ms = 250
page_size = 10
cache_ttl_hours = 1
near_bottom_threshold = 3
history_page_size = 15
fetch_timeout_secs = 5
max_media_bytes = 1024
trending_url = "https://gifs.example/trending"
search_url = "https://gifs.example/search"
search_api_key = "test-key-123"
trusted_domains = ["cdn.example.org"]
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.feed_options().debounce, Duration::from_millis(250));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.near_bottom_threshold, 3);
        assert_eq!(config.history_page_size, 15);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_media_bytes, 1024);
        assert_eq!(config.search_url, "https://gifs.example/search");
        assert_eq!(config.search_api_key.as_deref(), Some("test-key-123"));
        assert_eq!(config.trusted_domains, vec!["cdn.example.org".to_string()]);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let file = write_config("this is not [valid toml");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("page_size = \"twenty\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("page_size = 5\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let file = write_config(&"a".repeat(1_048_577));
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let config = Config::parse("page_size = 0\n").unwrap();
        assert_eq!(config.feed_options().page_size, 1);
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = Config {
            search_api_key: Some("super-secret-key-12345".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-key-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
