use std::ops::Range;

use tracing::trace;

/// Scroll notification produced by any change of position, including
/// programmatic ones that end up not moving the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollEvent {
    pub at_bottom: bool,
}

/// Vertical window over the table body.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    scroll_top: usize,
    height: usize,
    total: usize,
    events: Vec<ScrollEvent>,
}

impl Viewport {
    pub fn new(height: usize) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn max_scroll(&self) -> usize {
        self.total.saturating_sub(self.height)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.scroll_top >= self.max_scroll()
    }

    /// Row count changed. The position is kept; appending never scrolls on
    /// its own.
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    /// Body height changed (terminal resize).
    pub fn set_height(&mut self, height: usize) {
        if height == self.height {
            return;
        }
        self.height = height;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    pub fn visible_range(&self) -> Range<usize> {
        let end = self.scroll_top.saturating_add(self.height).min(self.total);
        self.scroll_top.min(end)..end
    }

    pub fn scroll_lines(&mut self, delta: isize) {
        let max_scroll = self.max_scroll();
        if delta.is_positive() {
            self.scroll_top = self.scroll_top.saturating_add(delta as usize).min(max_scroll);
        } else {
            self.scroll_top = self.scroll_top.saturating_sub(delta.unsigned_abs());
        }
        self.emit("lines");
    }

    pub fn scroll_pages(&mut self, delta_pages: isize) {
        let page = self.height.max(1) as isize;
        self.scroll_lines(delta_pages.saturating_mul(page));
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_top = 0;
        self.emit("top");
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll();
        self.emit("bottom");
    }

    /// Drains the scroll notifications raised since the last call.
    pub fn take_events(&mut self) -> Vec<ScrollEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, cause: &'static str) {
        let event = ScrollEvent {
            at_bottom: self.is_at_bottom(),
        };
        trace!(
            target = "slate::render",
            cause,
            scroll_top = self.scroll_top,
            height = self.height,
            total = self.total,
            at_bottom = event.at_bottom,
            "viewport scrolled"
        );
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(total: usize, height: usize) -> Viewport {
        let mut view = Viewport::new(height);
        view.set_total(total);
        view
    }

    #[test]
    fn short_tables_are_always_at_bottom() {
        let mut view = filled(3, 10);
        assert!(view.is_at_bottom());
        view.scroll_lines(-5);
        assert_eq!(view.take_events(), vec![ScrollEvent { at_bottom: true }]);
        assert_eq!(view.visible_range(), 0..3);
    }

    #[test]
    fn appending_keeps_position() {
        let mut view = filled(20, 5);
        view.scroll_to_bottom();
        assert_eq!(view.scroll_top(), 15);
        view.set_total(25);
        assert_eq!(view.scroll_top(), 15);
        assert!(!view.is_at_bottom());
        view.take_events();
        assert!(view.take_events().is_empty());
    }

    #[test]
    fn scrolling_clamps_and_reports_position() {
        let mut view = filled(20, 5);
        view.scroll_pages(10);
        assert_eq!(view.scroll_top(), 15);
        view.scroll_lines(-1);
        view.scroll_to_top();
        assert_eq!(
            view.take_events(),
            vec![
                ScrollEvent { at_bottom: true },
                ScrollEvent { at_bottom: false },
                ScrollEvent { at_bottom: false },
            ]
        );
        assert_eq!(view.visible_range(), 0..5);
    }

    #[test]
    fn no_op_scroll_still_emits() {
        let mut view = filled(0, 5);
        view.scroll_to_bottom();
        assert_eq!(view.take_events().len(), 1);
    }

    #[test]
    fn shrinking_height_clamps_scroll_top() {
        let mut view = filled(10, 2);
        view.scroll_to_bottom();
        view.set_height(8);
        assert_eq!(view.scroll_top(), 2);
        assert_eq!(view.visible_range(), 2..10);
    }
}
