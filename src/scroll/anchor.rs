use super::viewport::Viewport;

/// Default distance from the bottom within which live messages are followed.
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD: usize = 50;

/// Source of older messages for the list being viewed.
pub trait HistoryLoader {
    /// True while a previous request is still being served.
    fn is_loading(&self) -> bool;
    fn load_older(&mut self);
}

/// What [`ScrollAnchor::observe`] did to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorTransition {
    /// A different list is showing; jumped to the bottom.
    ChatSwitch,
    /// Older messages were inserted above; the offset moved down by `shift`
    /// so the same messages stay on screen.
    HistoryPrepend { shift: usize },
    /// Messages were added below. `followed` is true if the view jumped to
    /// the new bottom.
    LiveAppend { followed: bool },
    Unchanged,
}

/// What the anchor remembers from the previous render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollState<L, I> {
    pub active_list_id: Option<L>,
    pub last_scroll_height: usize,
    pub last_leading_item_id: Option<I>,
}

impl<L, I> Default for ScrollState<L, I> {
    fn default() -> Self {
        Self {
            active_list_id: None,
            last_scroll_height: 0,
            last_leading_item_id: None,
        }
    }
}

/// Keeps the viewport steady while the message list grows.
///
/// Call [`observe`](Self::observe) after every layout with the current list
/// id and the id of the first (oldest) item. The list id identifies the chat;
/// `L` and `I` are whatever the host uses for chat and message ids.
///
/// Growth is classified from the height and the leading item alone, so an
/// in-place replacement of the first item that also grows the list is treated
/// as a prepend.
#[derive(Debug)]
pub struct ScrollAnchor<L, I> {
    state: ScrollState<L, I>,
    threshold: usize,
}

impl<L: Clone + PartialEq, I: Clone + PartialEq> ScrollAnchor<L, I> {
    pub fn new(near_bottom_threshold: usize) -> Self {
        Self {
            state: ScrollState::default(),
            threshold: near_bottom_threshold,
        }
    }

    pub fn state(&self) -> &ScrollState<L, I> {
        &self.state
    }

    pub fn observe<V>(&mut self, list_id: &L, leading: Option<&I>, viewport: &mut V) -> AnchorTransition
    where
        V: Viewport + ?Sized,
    {
        let height = viewport.content_extent();

        if self.state.active_list_id.as_ref() != Some(list_id) {
            viewport.set_view_offset(height);
            self.state = ScrollState {
                active_list_id: Some(list_id.clone()),
                last_scroll_height: height,
                last_leading_item_id: leading.cloned(),
            };
            tracing::debug!(height, "Chat switched, jumped to bottom");
            return AnchorTransition::ChatSwitch;
        }

        let last = self.state.last_scroll_height;
        let leading_changed = self.state.last_leading_item_id.as_ref() != leading;

        let transition = if last > 0 && height > last && leading_changed {
            let shift = height - last;
            viewport.set_view_offset(viewport.view_offset().saturating_add(shift));
            tracing::debug!(shift, "History prepended, offset preserved");
            AnchorTransition::HistoryPrepend { shift }
        } else if height > last {
            // Measured against the height before growth
            let bottom_edge = viewport.view_offset().saturating_add(viewport.view_extent());
            let followed = bottom_edge >= last.saturating_sub(self.threshold);
            if followed {
                viewport.set_view_offset(height);
            }
            AnchorTransition::LiveAppend { followed }
        } else {
            AnchorTransition::Unchanged
        };

        self.state.last_scroll_height = height;
        self.state.last_leading_item_id = leading.cloned();
        transition
    }

    /// Requests older history when the view has reached the top.
    ///
    /// Returns true if `load_older` was called. Nothing happens without a
    /// loader or while the loader is busy.
    pub fn on_scroll(&self, offset: usize, loader: Option<&mut dyn HistoryLoader>) -> bool {
        match loader {
            Some(loader) if offset == 0 && !loader.is_loading() => {
                tracing::debug!("Reached top, loading older history");
                loader.load_older();
                true
            }
            _ => false,
        }
    }

    /// Forgets the active list so the next observe is a chat switch.
    pub fn reset(&mut self) {
        self.state = ScrollState::default();
    }
}

impl<L: Clone + PartialEq, I: Clone + PartialEq> Default for ScrollAnchor<L, I> {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR_BOTTOM_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::ViewportMetrics;

    fn anchor() -> ScrollAnchor<&'static str, &'static str> {
        ScrollAnchor::default()
    }

    #[test]
    fn test_first_observe_is_chat_switch() {
        let mut a = anchor();
        let mut vp = ViewportMetrics::new(1000, 0, 300);
        assert_eq!(a.observe(&"a", Some(&"m1"), &mut vp), AnchorTransition::ChatSwitch);
        assert_eq!(vp.offset, 700);
        assert_eq!(a.state().active_list_id, Some("a"));
        assert_eq!(a.state().last_scroll_height, 1000);
    }

    #[test]
    fn test_no_growth_is_unchanged() {
        let mut a = anchor();
        let mut vp = ViewportMetrics::new(1000, 0, 300);
        a.observe(&"a", Some(&"m1"), &mut vp);
        vp.set_view_offset(120);
        assert_eq!(a.observe(&"a", Some(&"m1"), &mut vp), AnchorTransition::Unchanged);
        assert_eq!(vp.offset, 120);
    }

    #[test]
    fn test_shrink_updates_height_without_scrolling() {
        let mut a = anchor();
        let mut vp = ViewportMetrics::new(1000, 0, 300);
        a.observe(&"a", Some(&"m1"), &mut vp);
        vp.set_content_extent(800);
        assert_eq!(a.observe(&"a", Some(&"m1"), &mut vp), AnchorTransition::Unchanged);
        assert_eq!(a.state().last_scroll_height, 800);
    }

    #[test]
    fn test_growth_from_empty_follows() {
        let mut a = anchor();
        let mut vp = ViewportMetrics::new(0, 0, 300);
        a.observe(&"a", None, &mut vp);
        vp.set_content_extent(900);
        assert_eq!(
            a.observe(&"a", Some(&"m1"), &mut vp),
            AnchorTransition::LiveAppend { followed: true }
        );
        assert_eq!(vp.offset, 600);
    }

    struct Loader {
        loading: bool,
        calls: usize,
    }

    impl HistoryLoader for Loader {
        fn is_loading(&self) -> bool {
            self.loading
        }
        fn load_older(&mut self) {
            self.calls += 1;
            self.loading = true;
        }
    }

    #[test]
    fn test_load_older_only_at_top_and_idle() {
        let a = anchor();
        let mut loader = Loader {
            loading: false,
            calls: 0,
        };

        assert!(!a.on_scroll(5, Some(&mut loader)));
        assert!(a.on_scroll(0, Some(&mut loader)));
        // in flight
        assert!(!a.on_scroll(0, Some(&mut loader)));
        assert_eq!(loader.calls, 1);

        assert!(!a.on_scroll(0, None));
    }
}
