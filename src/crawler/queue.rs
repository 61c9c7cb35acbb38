//! FIFO work queue of `(url, depth)` items.
//!
//! Processing order is discovery order. A URL is accepted into the queue at
//! most once per crawl; later discoveries of the same URL are dropped.

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlQueueItem {
    pub url: String,
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct CrawlQueue {
    items: VecDeque<CrawlQueueItem>,
    accepted: HashSet<String>,
}

impl CrawlQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `url` unless it has been accepted before. Returns whether it was added.
    pub fn push(&mut self, url: impl Into<String>, depth: usize) -> bool {
        let url = url.into();
        if !self.accepted.insert(url.clone()) {
            return false;
        }
        self.items.push_back(CrawlQueueItem { url, depth });
        true
    }

    pub fn pop(&mut self) -> Option<CrawlQueueItem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// URLs already dequeued for processing.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    /// Marks `url` visited; false if it already was.
    pub fn mark(&mut self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
