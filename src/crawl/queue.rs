// src/crawl/queue.rs
// =============================================================================
// The crawl frontier: a FIFO queue of (url, depth) pairs plus the visited set.
//
// How it works:
// 1. The seed goes in at depth 0
// 2. Every newly discovered URL is checked against the visited set
// 3. New URLs are marked visited *before* they are queued, so a URL can never
//    sit in the queue twice
// 4. Once the visited set reaches the page cap, nothing else gets in
//
// Rust concepts:
// - HashSet: To track visited URLs (O(1) lookup)
// - VecDeque: Double-ended queue; the scheduler pushes an item back to the
//   front when the depth barrier says "not yet"
// =============================================================================

use std::collections::{HashSet, VecDeque};

// Represents a page in the crawl queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlItem {
    pub url: String,
    pub depth: usize, // How many link hops from the seed
}

#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlItem>,
    visited: HashSet<String>,
    max_pages: usize,
}

impl Frontier {
    pub fn new(max_pages: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            max_pages,
        }
    }

    // Marks `url` visited and queues it at `depth`
    //
    // Returns the new visited count, or None when the URL was already seen
    // or the page cap has been reached.
    pub fn admit(&mut self, url: String, depth: usize) -> Option<usize> {
        if self.is_capped() || self.visited.contains(&url) {
            return None;
        }
        self.visited.insert(url.clone());
        self.queue.push_back(CrawlItem { url, depth });
        Some(self.visited.len())
    }

    pub fn pop_front(&mut self) -> Option<CrawlItem> {
        self.queue.pop_front()
    }

    /// Puts an item back at the head of the queue
    pub fn push_front(&mut self, item: CrawlItem) {
        self.queue.push_front(item);
    }

    pub fn is_capped(&self) -> bool {
        self.visited.len() >= self.max_pages
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_deduplicates() {
        let mut frontier = Frontier::new(10);
        assert_eq!(frontier.admit("https://example.com/".into(), 0), Some(1));
        assert_eq!(frontier.admit("https://example.com/".into(), 1), None);
        frontier.pop_front();
        assert!(frontier.is_empty());
        assert_eq!(frontier.visited_count(), 1);
    }

    #[test]
    fn test_popped_urls_stay_visited() {
        let mut frontier = Frontier::new(10);
        frontier.admit("https://example.com/a.html".into(), 1);
        let item = frontier.pop_front().unwrap();
        assert_eq!(item.url, "https://example.com/a.html");
        assert!(frontier.is_empty());
        assert_eq!(frontier.admit("https://example.com/a.html".into(), 2), None);
    }

    #[test]
    fn test_page_cap() {
        let mut frontier = Frontier::new(2);
        assert_eq!(frontier.admit("https://example.com/".into(), 0), Some(1));
        assert_eq!(frontier.admit("https://example.com/a/".into(), 1), Some(2));
        assert!(frontier.is_capped());
        assert_eq!(frontier.admit("https://example.com/b/".into(), 1), None);
        assert_eq!(frontier.visited_count(), 2);
    }

    #[test]
    fn test_push_front_restores_order() {
        let mut frontier = Frontier::new(10);
        frontier.admit("https://example.com/1/".into(), 1);
        frontier.admit("https://example.com/2/".into(), 1);

        let first = frontier.pop_front().unwrap();
        frontier.push_front(first.clone());
        assert_eq!(frontier.pop_front(), Some(first));
        assert_eq!(frontier.pop_front().map(|item| item.url), Some("https://example.com/2/".to_string()));
    }
}
