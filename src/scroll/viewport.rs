/// A scrollable region, measured in whatever unit the renderer uses (rows in
/// the terminal client).
pub trait Viewport {
    /// Total height of the content.
    fn content_extent(&self) -> usize;
    /// Distance from the top of the content to the top of the view.
    fn view_offset(&self) -> usize;
    /// Height of the visible window.
    fn view_extent(&self) -> usize;
    fn set_view_offset(&mut self, offset: usize);

    /// Offset that shows the end of the content.
    fn max_offset(&self) -> usize {
        self.content_extent().saturating_sub(self.view_extent())
    }

    fn is_at_bottom(&self) -> bool {
        self.view_offset() >= self.max_offset()
    }
}

/// Plain measurements. Offsets are clamped to `0..=max_offset()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewportMetrics {
    pub content: usize,
    pub offset: usize,
    pub extent: usize,
}

impl ViewportMetrics {
    pub fn new(content: usize, offset: usize, extent: usize) -> Self {
        let mut vp = Self {
            content,
            offset: 0,
            extent,
        };
        vp.set_view_offset(offset);
        vp
    }

    /// Changes the content height, keeping the offset where it was if it
    /// still fits.
    pub fn set_content_extent(&mut self, content: usize) {
        self.content = content;
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn set_view_extent(&mut self, extent: usize) {
        self.extent = extent;
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.offset.saturating_add_signed(delta);
        self.set_view_offset(target);
    }
}

impl Viewport for ViewportMetrics {
    fn content_extent(&self) -> usize {
        self.content
    }

    fn view_offset(&self) -> usize {
        self.offset
    }

    fn view_extent(&self) -> usize {
        self.extent
    }

    fn set_view_offset(&mut self, offset: usize) {
        self.offset = offset.min(self.max_offset());
    }
}
