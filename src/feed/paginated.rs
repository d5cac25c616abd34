use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::provider::{Category, MediaItem, SearchProvider};
use super::visibility::VisibilityObserver;
use crate::storage::TtlCache;
use crate::util::MAX_SEARCH_QUERY_LENGTH;

/// Cache key for the category browse view.
pub const TRENDING_CACHE_KEY: &str = "trending";

#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub page_size: usize,
    /// Quiet period after the last keystroke before a lookup starts.
    pub debounce: Duration,
    /// Items this many rows outside the viewport count as visible.
    pub lookahead: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            debounce: Duration::from_millis(500),
            lookahead: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedView {
    Categories,
    Results,
}

/// What the picker is showing.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub query: String,
    pub view: FeedView,
    pub categories: Vec<Category>,
    pub all_results: Vec<MediaItem>,
    /// 1-based page count of results currently shown.
    pub page: usize,
    pub page_size: usize,
    pub loading: bool,
}

impl FeedState {
    fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            view: FeedView::Categories,
            categories: Vec::new(),
            all_results: Vec::new(),
            page: 1,
            page_size: page_size.max(1),
            loading: false,
        }
    }

    /// The first `page * page_size` results.
    pub fn visible_results(&self) -> &[MediaItem] {
        let end = self
            .page
            .saturating_mul(self.page_size)
            .min(self.all_results.len());
        &self.all_results[..end]
    }

    /// Highest reachable page, at least 1.
    pub fn max_page(&self) -> usize {
        self.all_results.len().div_ceil(self.page_size).max(1)
    }

    /// Number of entries in whichever list the current view shows.
    pub fn visible_len(&self) -> usize {
        match self.view {
            FeedView::Categories => self.categories.len(),
            FeedView::Results => self.visible_results().len(),
        }
    }
}

/// Completion messages from the feed's background tasks.
#[derive(Debug)]
pub enum FeedEvent {
    DebounceElapsed {
        generation: u64,
    },
    CategoriesLoaded {
        result: Result<Vec<Category>, String>,
    },
    ResultsLoaded {
        /// Normalized query the request was made for.
        query: String,
        result: Result<Vec<MediaItem>, String>,
    },
}

/// Outcome of a viewport update.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ViewportChange {
    /// Indices whose previews should now be requested.
    pub revealed: Vec<usize>,
    pub loaded_more: bool,
}

/// Debounced, cache-first search and browse engine for the media picker.
///
/// State only changes inside [`on_query_change`](Self::on_query_change),
/// [`handle_event`](Self::handle_event) and the paging calls. Background
/// timers and fetches report through the event channel; a keystroke cancels a
/// pending timer but never a fetch already in flight. A fetch result is
/// dropped if the query changed since it was issued.
pub struct PaginatedFeed {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<TtlCache>,
    options: FeedOptions,
    state: FeedState,
    visibility: VisibilityObserver<usize>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    in_flight: usize,
    event_tx: mpsc::Sender<FeedEvent>,
    event_rx: Option<mpsc::Receiver<FeedEvent>>,
}

impl PaginatedFeed {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        cache: Arc<TtlCache>,
        options: FeedOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(16);
        Self {
            provider,
            cache,
            state: FeedState::new(options.page_size),
            visibility: VisibilityObserver::new(options.lookahead),
            options,
            timer: None,
            generation: 0,
            in_flight: 0,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Hands the event receiver to an outer loop. After this,
    /// [`next_event`](Self::next_event) and [`settle`](Self::settle) return
    /// immediately.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<FeedEvent>> {
        self.event_rx.take()
    }

    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.event_rx.as_mut()?.recv().await
    }

    /// True while a debounce timer or fetch is outstanding.
    pub fn is_busy(&self) -> bool {
        self.timer.is_some() || self.in_flight > 0
    }

    /// Records a keystroke. The view flips immediately; the lookup runs once
    /// the debounce period passes without another call.
    pub fn on_query_change(&mut self, query: &str) {
        let query: String = query.chars().take(MAX_SEARCH_QUERY_LENGTH).collect();
        self.state.view = if normalize_query(&query).is_empty() {
            FeedView::Categories
        } else {
            FeedView::Results
        };
        self.state.query = query;
        self.state.page = 1;
        self.visibility.reset();

        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let delay = self.options.debounce;
        let tx = self.event_tx.clone();

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(FeedEvent::DebounceElapsed { generation }).await.is_err() {
                tracing::debug!("Feed dropped before debounce elapsed");
            }
        }));
    }

    /// Opens a category by searching for its name.
    pub fn select_category(&mut self, name: &str) {
        tracing::debug!(category = %name, "Category selected");
        self.on_query_change(name);
    }

    /// Clears the query and returns to the category grid.
    pub fn back_to_categories(&mut self) {
        self.on_query_change("");
    }

    /// Shows one more page of results. Returns false when every result is
    /// already visible or the category grid is showing.
    pub fn load_more(&mut self) -> bool {
        if self.state.view != FeedView::Results || self.state.page >= self.state.max_page() {
            return false;
        }
        self.state.page += 1;
        tracing::debug!(page = self.state.page, "Loaded next page");
        true
    }

    /// Applies the rows currently on screen (`first..first + count`).
    ///
    /// Newly visible items are reported once. When the end-of-list sentinel
    /// is within the lookahead, the next page is shown.
    pub fn on_viewport(&mut self, first: usize, count: usize) -> ViewportChange {
        let len = self.state.visible_len();
        for index in 0..len {
            if !self.visibility.is_revealed(&index) {
                self.visibility.observe(index, index, 1);
            }
        }
        let revealed = self.visibility.update(first, count);

        let sentinel = len;
        let near_sentinel = first
            .saturating_add(count)
            .saturating_add(self.options.lookahead)
            >= sentinel;
        let loaded_more = near_sentinel && self.load_more();

        ViewportChange {
            revealed,
            loaded_more,
        }
    }

    pub fn is_revealed(&self, index: usize) -> bool {
        self.visibility.is_revealed(&index)
    }

    pub async fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::DebounceElapsed { generation } => {
                if generation != self.generation {
                    tracing::debug!(
                        expected = self.generation,
                        got = generation,
                        "Ignoring stale debounce timer"
                    );
                    return;
                }
                self.timer = None;
                self.start_lookup().await;
            }
            FeedEvent::CategoriesLoaded { result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if !normalize_query(&self.state.query).is_empty() {
                    tracing::debug!("Ignoring categories, query changed");
                    return;
                }
                match result {
                    Ok(categories) => {
                        if !categories.is_empty() {
                            self.cache.set(TRENDING_CACHE_KEY, &categories).await;
                        }
                        self.state.categories = categories;
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to load categories"),
                }
                self.state.loading = false;
            }
            FeedEvent::ResultsLoaded { query, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if query != normalize_query(&self.state.query) {
                    tracing::debug!(query = %query, current = %self.state.query, "Ignoring stale results");
                    return;
                }
                match result {
                    Ok(items) => {
                        if !items.is_empty() {
                            self.cache.set(&search_cache_key(&query), &items).await;
                        }
                        tracing::debug!(query = %query, count = items.len(), "Results loaded");
                        self.state.all_results = items;
                        self.state.page = 1;
                        self.visibility.reset();
                    }
                    Err(e) => tracing::warn!(query = %query, error = %e, "Search failed"),
                }
                self.state.loading = false;
            }
        }
    }

    /// Processes events until no timer or fetch is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            let Some(event) = self.next_event().await else {
                break;
            };
            self.handle_event(event).await;
        }
    }

    async fn start_lookup(&mut self) {
        let query = normalize_query(&self.state.query);
        let tx = self.event_tx.clone();
        let provider = Arc::clone(&self.provider);

        if query.is_empty() {
            if let Some(categories) = self.cache.get::<Vec<Category>>(TRENDING_CACHE_KEY).await {
                tracing::debug!(count = categories.len(), "Categories served from cache");
                self.state.categories = categories;
                self.state.loading = false;
                return;
            }
            self.state.loading = true;
            self.in_flight += 1;
            tokio::spawn(async move {
                let result = provider.trending().await.map_err(|e| e.to_string());
                if tx.send(FeedEvent::CategoriesLoaded { result }).await.is_err() {
                    tracing::debug!("Feed dropped before categories arrived");
                }
            });
            return;
        }

        if let Some(items) = self
            .cache
            .get::<Vec<MediaItem>>(&search_cache_key(&query))
            .await
        {
            tracing::debug!(query = %query, count = items.len(), "Results served from cache");
            self.state.all_results = items;
            self.state.page = 1;
            self.visibility.reset();
            self.state.loading = false;
            return;
        }

        self.state.loading = true;
        self.in_flight += 1;
        tracing::debug!(query = %query, generation = self.generation, "Searching");
        tokio::spawn(async move {
            let result = provider.search(&query).await.map_err(|e| e.to_string());
            if tx.send(FeedEvent::ResultsLoaded { query, result }).await.is_err() {
                tracing::debug!("Feed dropped before results arrived");
            }
        });
    }
}

impl Drop for PaginatedFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

/// Trims, lowercases and collapses internal whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key for a normalized query.
pub fn search_cache_key(normalized: &str) -> String {
    format!("search_{:x}", Sha256::digest(normalized.as_bytes()))
}
