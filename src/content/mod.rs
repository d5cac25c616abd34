//! Turning external URLs into displayable content.
//!
//! - [`MediaFetcher`] / [`HttpFetcher`] - size-limited HTTP with a normal and
//!   an anonymous mode
//! - [`BlobRegistry`] / [`LocalRef`] - downloaded bodies with RAII release
//! - [`BlobResolver`] - trust-gated URL resolution and link previews

mod blobs;
mod fetcher;
mod metadata;
mod resolver;

pub use blobs::{BlobRegistry, LocalRef};
pub(crate) use fetcher::read_limited_bytes;
pub use fetcher::{
    FetchError, FetchMode, FetchedBody, HttpFetcher, MediaFetcher, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_MEDIA_BYTES,
};
pub use metadata::{parse_metadata, PageMetadata};
pub use resolver::{
    media_kind_for_url, BlobResolver, LinkPreview, MediaKind, PagePreview, Resolution,
    ResolveError, ResolvedMedia,
};
