use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use url::Url;

use crate::storage::{KeyValueStore, MemoryStore};

/// Domains trusted out of the box: the CDNs that GIF providers and the common
/// image hosts serve media from.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "giphy.com",
    "media.giphy.com",
    "googleusercontent.com",
    "fbcdn.net",
    "cdn.discordapp.com",
    "imgur.com",
    "i.imgur.com",
    "reddit.com",
    "i.redd.it",
    "youtube.com",
    "youtu.be",
    "twimg.com",
    "pbs.twimg.com",
    "tenor.com",
    "media.tenor.com",
];

/// Store key holding the user's additions as a JSON list.
pub const TRUSTED_DOMAINS_KEY: &str = "trusted_domains";

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Not a valid domain: {0:?}")]
    InvalidDomain(String),
}

/// Outcome of checking a URL against the allow-list.
///
/// [`TrustPolicy`] only ever produces `Trusted` or `Unknown`; `Blocked` is
/// reserved for callers that want to record an explicit refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Trusted,
    Unknown,
    Blocked,
}

/// Allow-list of domain suffixes that may be fetched or opened without asking.
///
/// The list is the built-in seed plus whatever the user added through the
/// confirmation dialog. User additions are persisted; the seed is not.
pub struct TrustPolicy {
    store: Arc<dyn KeyValueStore>,
    seed: Vec<String>,
    user_domains: RwLock<Vec<String>>,
}

impl TrustPolicy {
    /// Builds a policy seeded with [`DEFAULT_TRUSTED_DOMAINS`] and loads the
    /// user's additions from `store`.
    ///
    /// A missing or unreadable stored list is treated as empty.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self::load_with_seed(store, DEFAULT_TRUSTED_DOMAINS.iter().copied()).await
    }

    pub async fn load_with_seed<'a>(
        store: Arc<dyn KeyValueStore>,
        seed: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let user_domains = match store.get(TRUSTED_DOMAINS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => list
                    .iter()
                    .filter_map(|d| normalize_domain(d).ok())
                    .fold(Vec::new(), push_unique),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored trusted domain list is corrupt, ignoring it");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read trusted domain list");
                Vec::new()
            }
        };

        let seed = seed
            .into_iter()
            .filter_map(|d| normalize_domain(d).ok())
            .fold(Vec::new(), push_unique);

        tracing::debug!(
            seeded = seed.len(),
            user = user_domains.len(),
            "Trust policy loaded"
        );

        Self {
            store,
            seed,
            user_domains: RwLock::new(user_domains),
        }
    }

    /// A policy backed by a fresh in-memory store.
    pub async fn in_memory() -> Self {
        Self::load(Arc::new(MemoryStore::new())).await
    }

    /// Every trusted domain: seed first, then user additions, without duplicates.
    pub fn domains(&self) -> Vec<String> {
        let user = self
            .user_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        user.iter().cloned().fold(self.seed.clone(), push_unique)
    }

    /// Domains the user added, in the order they were added.
    pub fn user_domains(&self) -> Vec<String> {
        self.user_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn classify(&self, url: &str) -> TrustDecision {
        match Url::parse(url) {
            Ok(parsed) => self.classify_url(&parsed),
            Err(_) => TrustDecision::Unknown,
        }
    }

    pub fn classify_url(&self, url: &Url) -> TrustDecision {
        let Some(host) = url.host_str() else {
            return TrustDecision::Unknown;
        };
        let host = host.to_ascii_lowercase();
        let matches = |domain: &String| host.ends_with(domain.as_str());

        let user = self
            .user_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if self.seed.iter().any(matches) || user.iter().any(matches) {
            TrustDecision::Trusted
        } else {
            TrustDecision::Unknown
        }
    }

    /// True iff the URL's hostname ends with a trusted domain.
    ///
    /// Unparseable URLs are never trusted.
    pub fn is_trusted(&self, url: &str) -> bool {
        self.classify(url) == TrustDecision::Trusted
    }

    pub fn is_trusted_url(&self, url: &Url) -> bool {
        self.classify_url(url) == TrustDecision::Trusted
    }

    /// Adds `domain` to the user's allow-list and persists the list.
    ///
    /// Returns `Ok(false)` if the domain was already present. A failed write is
    /// logged; the domain stays trusted for this session.
    pub async fn add_trusted_domain(&self, domain: &str) -> Result<bool, TrustError> {
        let domain = normalize_domain(domain)?;

        let snapshot = {
            let mut user = self
                .user_domains
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if user.contains(&domain) {
                return Ok(false);
            }
            user.push(domain.clone());
            user.clone()
        };

        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.store.set(TRUSTED_DOMAINS_KEY, &raw).await {
                    tracing::warn!(domain = %domain, error = %e, "Failed to persist trusted domain");
                }
            }
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "Failed to encode trusted domains");
            }
        }

        tracing::info!(domain = %domain, "Domain added to allow-list");
        Ok(true)
    }

    /// Trusts the host of `url` permanently.
    pub async fn trust_host_of(&self, url: &Url) -> Result<bool, TrustError> {
        match url.host_str() {
            Some(host) => self.add_trusted_domain(host).await,
            None => Err(TrustError::InvalidDomain(url.to_string())),
        }
    }
}

fn push_unique(mut list: Vec<String>, item: String) -> Vec<String> {
    if !list.contains(&item) {
        list.push(item);
    }
    list
}

/// Lowercases and strips any scheme, credentials, port and path.
///
/// ```
/// use murmur::trust::normalize_domain;
///
/// assert_eq!(normalize_domain("HTTPS://Media.Tenor.com/view/x").unwrap(), "media.tenor.com");
/// assert_eq!(normalize_domain("example.org:8080").unwrap(), "example.org");
/// assert!(normalize_domain("  ").is_err());
/// ```
pub fn normalize_domain(input: &str) -> Result<String, TrustError> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host.rsplit_once(':') {
        Some((h, port)) if !h.contains(']') && port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '[' | ']' | ':'));
    if valid {
        Ok(host)
    } else {
        Err(TrustError::InvalidDomain(input.to_owned()))
    }
}
