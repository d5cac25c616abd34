//! murmur: a terminal chat view with trust-gated media embeds, a cached GIF
//! picker and scroll anchoring for paged history.
//!
//! The library holds everything that does not touch the terminal:
//!
//! - [`storage`] - key/value stores and the TTL cache
//! - [`trust`] - the domain allow-list and the link confirmation gate
//! - [`content`] - fetching remote media into local references
//! - [`feed`] - the paginated, debounced picker
//! - [`scroll`] - keeping the message view steady as history loads
//! - [`inline`] - media embedded in message text
//! - [`messages`] - transcripts and paged chat history
//! - [`config`] - `config.toml`

pub mod config;
pub mod content;
pub mod feed;
pub mod inline;
pub mod messages;
pub mod scroll;
pub mod storage;
pub mod trust;
pub mod util;
