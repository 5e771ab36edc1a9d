//! Incremental page-by-page reveal of a result set that may be replaced at
//! any time by the poller.
//!
//! What has been shown is tracked as a count only, so a wholesale
//! replacement of the items keeps the reader's position without any notion
//! of record identity.

pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Fraction of the end-of-list sentinel that must be visible to load more.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct Pager<T> {
    items: Vec<T>,
    page_size: usize,
    threshold: f32,
    shown: usize,
}

impl<T> Default for Pager<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T> Pager<T> {
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            items: Vec::new(),
            page_size,
            threshold: DEFAULT_THRESHOLD,
            shown: page_size,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Reveal the first `pages` pages, whether or not the items are there
    /// yet; later replacements keep the request.
    pub fn show_pages(&mut self, pages: usize) {
        self.shown = self.page_size.saturating_mul(pages.max(1));
    }

    /// Install a new result set. Replaying the same set changes nothing.
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn visible(&self) -> &[T] {
        &self.items[..self.shown.min(self.items.len())]
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn has_more(&self) -> bool {
        self.visible().len() < self.items.len()
    }

    /// Reveal the next page; returns how many items became visible.
    pub fn load_more(&mut self) -> usize {
        let current = self.visible().len();
        if current >= self.items.len() {
            return 0;
        }
        self.shown = current.saturating_add(self.page_size);
        self.visible().len() - current
    }

    /// Sentinel visibility report from the view; loads more once it crosses
    /// the threshold.
    pub fn on_sentinel_visible(&mut self, ratio: f32) -> usize {
        if ratio >= self.threshold {
            self.load_more()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn reveals_pages_without_skipping() {
        let mut pager = Pager::new(10);
        pager.replace(numbers(25));
        assert_eq!(pager.visible().len(), 10);
        assert_eq!(pager.load_more(), 10);
        assert_eq!(pager.visible().len(), 20);
        assert_eq!(pager.load_more(), 5);
        assert_eq!(pager.visible(), numbers(25).as_slice());
        assert_eq!(pager.load_more(), 0);
        assert!(!pager.has_more());
    }

    #[test]
    fn threshold_gates_loading() {
        let mut pager = Pager::new(10).with_threshold(0.5);
        pager.replace(numbers(15));
        assert_eq!(pager.on_sentinel_visible(0.2), 0);
        assert_eq!(pager.visible().len(), 10);
        assert_eq!(pager.on_sentinel_visible(0.5), 5);
    }

    #[test]
    fn replacement_keeps_count_and_clamps() {
        let mut pager = Pager::new(10);
        pager.replace(numbers(25));
        pager.load_more();

        pager.replace(numbers(12));
        assert_eq!(pager.visible().len(), 12);
        assert!(!pager.has_more());

        pager.replace(numbers(40));
        assert_eq!(pager.visible().len(), 20);
        assert_eq!(pager.load_more(), 10);
    }

    #[test]
    fn replaying_same_items_is_idempotent() {
        let mut pager = Pager::new(10);
        pager.replace(numbers(25));
        pager.load_more();
        let before = pager.visible().to_vec();
        pager.replace(numbers(25));
        pager.replace(numbers(25));
        assert_eq!(pager.visible(), before.as_slice());
    }

    #[test]
    fn requested_pages_apply_to_later_results() {
        let mut pager = Pager::new(10);
        pager.show_pages(3);
        assert!(pager.visible().is_empty());

        pager.replace(numbers(25));
        assert_eq!(pager.visible().len(), 25);
        assert!(!pager.has_more());

        let mut pager = Pager::new(10);
        pager.show_pages(2);
        pager.replace(numbers(25));
        assert_eq!(pager.visible().len(), 20);
        assert_eq!(pager.load_more(), 5);

        let mut pager = Pager::new(10);
        pager.show_pages(0);
        pager.replace(numbers(25));
        assert_eq!(pager.visible().len(), 10);
    }

    #[test]
    fn huge_page_size_does_not_overflow() {
        let mut pager = Pager::new(usize::MAX);
        pager.show_pages(4);
        pager.replace(numbers(7));
        assert_eq!(pager.visible().len(), 7);
        assert_eq!(pager.load_more(), 0);

        let mut pager = Pager::new(usize::MAX / 2 + 1);
        pager.replace(numbers(3));
        assert_eq!(pager.load_more(), 0);
        assert_eq!(pager.visible().len(), 3);
    }

    #[test]
    fn empty_set_shows_nothing() {
        let mut pager: Pager<usize> = Pager::default();
        assert!(pager.visible().is_empty());
        assert_eq!(pager.load_more(), 0);
    }
}
