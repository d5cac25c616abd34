//! Viewport stability for the growing message list.
//!
//! The host measures its layout through [`Viewport`] and calls
//! [`ScrollAnchor::observe`] after each render; the anchor decides whether
//! the change was a chat switch, older history arriving above, or new
//! messages below, and moves the offset accordingly.

mod anchor;
mod viewport;

pub use anchor::{
    AnchorTransition, HistoryLoader, ScrollAnchor, ScrollState, DEFAULT_NEAR_BOTTOM_THRESHOLD,
};
pub use viewport::{Viewport, ViewportMetrics};
