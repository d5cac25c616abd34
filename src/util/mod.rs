//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: SSRF guards applied before fetching message-supplied URLs
//! - **Text processing**: terminal width, truncation and control-character stripping
//! - **Clocks**: a wall clock abstraction so cache expiry can be tested
//!
//! # Examples
//!
//! ```
//! use murmur::util::{check_public_url, display_width, truncate_to_width};
//! use url::Url;
//!
//! let url = Url::parse("https://i.imgur.com/cat.png").unwrap();
//! assert!(check_public_url(&url).is_ok());
//!
//! assert_eq!(display_width("hi 世界"), 7);
//! assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
//! ```

mod clock;
mod text;
mod url_validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use text::{display_width, strip_control_chars, truncate_to_width};
pub use url_validator::{check_public_url, check_scheme, UrlValidationError};

/// Maximum accepted picker query length, in bytes.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
