use futures::future::join_all;
use std::sync::Arc;
use url::Url;

use super::extract::{classify, extract_urls, segments, Segment};
use crate::content::{BlobResolver, MediaKind, ResolvedMedia};

/// How an embed behaves when activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedAction {
    /// Images open the shared media viewer.
    OpenViewer,
    /// Videos play in place with native controls.
    NativePlayback,
}

#[derive(Debug)]
pub struct InlineEmbed {
    pub media: ResolvedMedia,
    pub action: EmbedAction,
}

impl InlineEmbed {
    fn new(media: ResolvedMedia) -> Self {
        let action = match media.kind {
            MediaKind::Image => EmbedAction::OpenViewer,
            MediaKind::Video => EmbedAction::NativePlayback,
        };
        Self { media, action }
    }
}

/// Work order for one message's embeds, produced by [`InlineMediaView::begin`].
#[derive(Debug, Clone)]
pub struct EmbedTicket {
    generation: u64,
    pub message_id: String,
    pub urls: Vec<Url>,
}

/// Resolved embeds for a ticket, ready for [`InlineMediaView::complete`].
#[derive(Debug)]
pub struct EmbedBatch {
    generation: u64,
    pub message_id: String,
    pub embeds: Vec<InlineEmbed>,
}

impl EmbedTicket {
    /// Resolves every URL in the ticket concurrently. Failures are dropped.
    pub async fn resolve(self, resolver: &BlobResolver) -> EmbedBatch {
        let resolved = join_all(self.urls.iter().map(|url| resolver.resolve_inline(url))).await;
        EmbedBatch {
            generation: self.generation,
            message_id: self.message_id,
            embeds: resolved.into_iter().flatten().map(InlineEmbed::new).collect(),
        }
    }
}

/// Inline media for the message currently on screen.
///
/// Owns the resolved embeds of exactly one message. Switching to another
/// message or text, or unmounting, drops them (releasing their local refs)
/// before anything new is resolved. Batches that finish after such a switch
/// are discarded.
pub struct InlineMediaView {
    resolver: Arc<BlobResolver>,
    current: Option<(String, String)>,
    generation: u64,
    embeds: Vec<InlineEmbed>,
}

impl InlineMediaView {
    pub fn new(resolver: Arc<BlobResolver>) -> Self {
        Self {
            resolver,
            current: None,
            generation: 0,
            embeds: Vec::new(),
        }
    }

    pub fn resolver(&self) -> &Arc<BlobResolver> {
        &self.resolver
    }

    /// Switches to `message_id` / `text`.
    ///
    /// Returns `None` when nothing changed or there is nothing to resolve.
    /// Otherwise the returned ticket can be resolved anywhere (e.g. a spawned
    /// task) and handed back through [`complete`](Self::complete).
    pub fn begin(&mut self, message_id: &str, text: &str) -> Option<EmbedTicket> {
        let unchanged = self
            .current
            .as_ref()
            .is_some_and(|(id, t)| id == message_id && t == text);
        if unchanged {
            return None;
        }

        self.release_all();
        self.generation = self.generation.wrapping_add(1);
        self.current = Some((message_id.to_owned(), text.to_owned()));

        let policy = self.resolver.policy();
        let urls: Vec<Url> = extract_urls(text)
            .into_iter()
            .filter(|u| classify(u).is_some())
            .filter_map(|u| Url::parse(&u).ok())
            .filter(|u| policy.is_trusted_url(u))
            .collect();

        tracing::debug!(message_id, candidates = urls.len(), "Inline media extraction");
        if urls.is_empty() {
            return None;
        }
        Some(EmbedTicket {
            generation: self.generation,
            message_id: message_id.to_owned(),
            urls,
        })
    }

    /// Installs a finished batch. Returns false (and drops the batch) if the
    /// view moved on since its ticket was issued.
    pub fn complete(&mut self, batch: EmbedBatch) -> bool {
        if batch.generation != self.generation {
            tracing::debug!(
                message_id = %batch.message_id,
                expected = self.generation,
                got = batch.generation,
                "Discarding stale embed batch"
            );
            return false;
        }
        self.embeds = batch.embeds;
        true
    }

    /// Begins, resolves and completes in one step.
    pub async fn show(&mut self, message_id: &str, text: &str) -> &[InlineEmbed] {
        if let Some(ticket) = self.begin(message_id, text) {
            let batch = ticket.resolve(&self.resolver).await;
            self.complete(batch);
        }
        &self.embeds
    }

    /// Releases everything; in-flight batches become stale.
    pub fn unmount(&mut self) {
        self.release_all();
        self.current = None;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn embeds(&self) -> &[InlineEmbed] {
        &self.embeds
    }

    pub fn message_id(&self) -> Option<&str> {
        self.current.as_ref().map(|(id, _)| id.as_str())
    }

    /// Text and link runs of `text`, links tagged by trust.
    pub fn segments(&self, text: &str) -> Vec<Segment> {
        segments(text, self.resolver.policy())
    }

    fn release_all(&mut self) {
        if !self.embeds.is_empty() {
            tracing::trace!(count = self.embeds.len(), "Releasing inline embeds");
        }
        self.embeds.clear();
    }
}
