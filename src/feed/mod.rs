//! The media picker's search and browse engine.
//!
//! # Architecture
//!
//! - [`provider`] - trending categories and keyword search over HTTP
//! - [`visibility`] - one-shot "came into view" tracking for lazy previews
//! - [`paginated`] - debounced, cache-first query handling with client-side
//!   paging
//!
//! # Example
//!
//! ```ignore
//! let mut feed = PaginatedFeed::new(provider, cache, FeedOptions::default());
//! feed.on_query_change("cat");
//! feed.settle().await;
//! for item in feed.state().visible_results() {
//!     println!("{}", item.url);
//! }
//! ```

pub mod paginated;
pub mod provider;
pub mod visibility;

pub use paginated::{
    normalize_query, search_cache_key, FeedEvent, FeedOptions, FeedState, FeedView,
    PaginatedFeed, ViewportChange, TRENDING_CACHE_KEY,
};
pub use provider::{
    Category, HttpSearchProvider, MediaItem, ProviderError, SearchProvider, DEFAULT_SEARCH_URL,
    DEFAULT_TRENDING_URL,
};
pub use visibility::VisibilityObserver;
