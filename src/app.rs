use murmur::content::BlobResolver;
use murmur::feed::{MediaItem, PaginatedFeed};
use murmur::inline::{EmbedBatch, InlineMediaView};
use murmur::messages::{ChatHistory, MediaRef, Message};
use murmur::scroll::{AnchorTransition, ScrollAnchor, Viewport, ViewportMetrics};
use murmur::trust::{GateOutcome, LinkGate, LinkRisk};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::time::Instant;
use url::Url;

/// Sender name used for messages picked from the GIF picker.
pub const LOCAL_SENDER: &str = "me";

/// A link waiting on the confirmation dialog.
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub url: Url,
    pub risk: LinkRisk,
}

/// Cursor and scroll position inside the picker overlay.
#[derive(Debug, Default)]
pub struct PickerState {
    pub open: bool,
    pub query: String,
    pub selected: usize,
    pub scroll: usize,
    /// Set once the category grid has been requested.
    pub primed: bool,
}

/// Results from background tasks.
pub enum AppEvent {
    EmbedsResolved(EmbedBatch),
    PreviewLoaded {
        summary: String,
    },
    LinkHandled {
        url: String,
        result: Result<GateOutcome, String>,
    },
    /// A background task panicked.
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

pub struct App {
    pub chats: Vec<ChatHistory>,
    pub active_chat: usize,
    pub anchor: ScrollAnchor<String, String>,
    pub viewport: ViewportMetrics,
    /// Index into the active chat's visible messages; `None` follows the newest.
    pub selected_message: Option<usize>,
    pub gate: Arc<LinkGate>,
    pub inline: InlineMediaView,
    pub feed: PaginatedFeed,
    pub picker: PickerState,
    pub pending_link: Option<PendingLink>,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,
    pub show_help: bool,
    local_counter: u64,
}

impl App {
    pub fn new(
        chats: Vec<ChatHistory>,
        gate: Arc<LinkGate>,
        resolver: Arc<BlobResolver>,
        feed: PaginatedFeed,
        near_bottom_threshold: usize,
    ) -> Self {
        Self {
            chats,
            active_chat: 0,
            anchor: ScrollAnchor::new(near_bottom_threshold),
            viewport: ViewportMetrics::default(),
            selected_message: None,
            gate,
            inline: InlineMediaView::new(resolver),
            feed,
            picker: PickerState::default(),
            pending_link: None,
            status_message: None,
            needs_redraw: true,
            show_help: false,
            local_counter: 0,
        }
    }

    pub fn active(&self) -> Option<&ChatHistory> {
        self.chats.get(self.active_chat)
    }

    pub fn active_mut(&mut self) -> Option<&mut ChatHistory> {
        self.chats.get_mut(self.active_chat)
    }

    /// Moves to the next (`delta > 0`) or previous chat, wrapping around.
    pub fn switch_chat(&mut self, delta: isize) {
        if self.chats.len() < 2 {
            return;
        }
        let len = self.chats.len() as isize;
        self.active_chat = (self.active_chat as isize + delta).rem_euclid(len) as usize;
        self.selected_message = None;
        self.inline.unmount();
        tracing::debug!(chat = self.active_chat, "Switched chat");
    }

    /// Index of the message embeds and links apply to.
    pub fn selected_index(&self) -> Option<usize> {
        let len = self.active()?.visible().len();
        if len == 0 {
            return None;
        }
        Some(self.selected_message.unwrap_or(len - 1).min(len - 1))
    }

    pub fn selected(&self) -> Option<&Message> {
        let index = self.selected_index()?;
        self.active()?.visible().get(index)
    }

    /// Moves the selection by `delta` messages. Selecting past the newest
    /// message goes back to following it.
    pub fn move_selection(&mut self, delta: isize) {
        let Some(len) = self.active().map(|c| c.visible().len()) else {
            return;
        };
        let Some(current) = self.selected_index() else {
            return;
        };
        let target = current as isize + delta;
        self.selected_message = if target >= len as isize - 1 {
            None
        } else {
            Some(target.max(0) as usize)
        };
    }

    /// Scrolls the message view and asks for older history at the top.
    pub fn scroll_messages(&mut self, delta: isize) {
        self.viewport.scroll_by(delta);
        let offset = self.viewport.view_offset();
        let Some(chat) = self.chats.get_mut(self.active_chat) else {
            return;
        };
        if self.anchor.on_scroll(offset, Some(chat)) {
            self.set_status("Loading older messages...");
        }
    }

    /// Completes an outstanding history request on the active chat.
    ///
    /// An explicit selection shifts by the number of prepended messages so
    /// it stays on the same message.
    pub fn apply_history(&mut self) -> usize {
        let added = self.active_mut().map_or(0, |c| c.apply_pending());
        if added > 0 {
            if let Some(selected) = self.selected_message.as_mut() {
                *selected += added;
            }
        }
        added
    }

    /// Feeds the measured layout to the scroll anchor.
    pub fn sync_layout(&mut self, content_rows: usize, view_rows: usize) -> AnchorTransition {
        self.viewport.set_view_extent(view_rows);
        self.viewport.set_content_extent(content_rows);
        let Some(chat) = self.chats.get(self.active_chat) else {
            return AnchorTransition::Unchanged;
        };
        let chat_id = chat.chat_id().to_owned();
        let leading = chat.leading_id().map(str::to_owned);
        self.anchor
            .observe(&chat_id, leading.as_ref(), &mut self.viewport)
    }

    /// Appends a picked GIF to the active chat as a live message.
    pub fn send_media(&mut self, item: &MediaItem) -> Option<String> {
        self.local_counter += 1;
        let id = format!("local-{}", self.local_counter);
        let message = Message {
            id: id.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            sender: LOCAL_SENDER.to_string(),
            text: item.url.clone(),
            media: Some(MediaRef {
                filename: None,
                mime: None,
                url: Some(item.url.clone()),
            }),
        };
        self.active_mut()?.push_live(message);
        tracing::info!(id = %id, url = %item.url, "Sent media message");
        Some(id)
    }

    pub fn open_picker(&mut self) {
        self.picker.open = true;
        if !self.picker.primed {
            self.picker.primed = true;
            self.feed.on_query_change(&self.picker.query);
        }
    }

    pub fn close_picker(&mut self) {
        self.picker.open = false;
    }

    pub fn set_picker_query(&mut self, query: String) {
        self.picker.query = query;
        self.picker.selected = 0;
        self.picker.scroll = 0;
        self.feed.on_query_change(&self.picker.query);
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= 3 {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

/// Text handed to inline extraction: the body plus any attachment URL.
pub fn embed_source(message: &Message) -> Cow<'_, str> {
    match message.media.as_ref().and_then(|m| m.url.as_deref()) {
        Some(url) if !message.text.contains(url) => {
            Cow::Owned(format!("{} {}", message.text, url))
        }
        _ => Cow::Borrowed(message.text.as_str()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use murmur::content::{BlobRegistry, HttpFetcher};
    use murmur::feed::{Category, FeedOptions, ProviderError, SearchProvider};
    use murmur::messages::Chat;
    use murmur::storage::{MemoryStore, TtlCache, DEFAULT_TTL, PICKER_CACHE_PREFIX};
    use murmur::trust::{GateError, LinkOpener, TrustPolicy};
    use std::time::Duration;

    struct NoopOpener;

    impl LinkOpener for NoopOpener {
        fn open(&self, _url: &Url) -> Result<(), GateError> {
            Ok(())
        }
    }

    struct EmptyProvider;

    #[async_trait]
    impl SearchProvider for EmptyProvider {
        async fn trending(&self) -> Result<Vec<Category>, ProviderError> {
            Ok(Vec::new())
        }

        async fn search(&self, _query: &str) -> Result<Vec<MediaItem>, ProviderError> {
            Ok(Vec::new())
        }
    }

    /// A chat with `n` messages and a history page size of 10.
    pub(crate) fn chat(id: &str, n: usize) -> ChatHistory {
        let messages = (0..n)
            .map(|i| Message {
                id: format!("{id}-m{i}"),
                timestamp: i as i64,
                sender: "alice".into(),
                text: format!("message {i}"),
                media: None,
            })
            .collect();
        ChatHistory::new(
            Chat {
                id: id.into(),
                title: String::new(),
                messages,
            },
            10,
        )
    }

    pub(crate) async fn test_app(chats: Vec<ChatHistory>) -> App {
        let policy = Arc::new(TrustPolicy::in_memory().await);
        let fetcher = HttpFetcher::new(Duration::from_secs(1), 1024).unwrap();
        let resolver = Arc::new(BlobResolver::new(
            Arc::clone(&policy),
            Arc::new(fetcher),
            BlobRegistry::new(),
        ));
        let gate = Arc::new(LinkGate::new(policy, Arc::new(NoopOpener)));
        let cache = Arc::new(TtlCache::new(
            Arc::new(MemoryStore::new()),
            PICKER_CACHE_PREFIX,
            DEFAULT_TTL,
        ));
        let feed = PaginatedFeed::new(Arc::new(EmptyProvider), cache, FeedOptions::default());
        App::new(chats, gate, resolver, feed, 3)
    }
}
