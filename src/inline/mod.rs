//! Media embedded in message text.
//!
//! URLs are pulled out of the text, filtered to trusted image and video
//! links, and resolved through the [`BlobResolver`](crate::content::BlobResolver).
//! Everything else renders as a link that goes through the confirmation gate.

mod extract;
mod session;

pub use extract::{classify, extract_urls, segments, LinkTarget, Segment};
pub use session::{EmbedAction, EmbedBatch, EmbedTicket, InlineEmbed, InlineMediaView};
