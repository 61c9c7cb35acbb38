use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::signal::AbortReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageErrorKind {
    /// Uncaught exception in page script.
    PageError,
    /// `console.error` output not matched by any ignore pattern.
    ConsoleError,
    /// The page could not be navigated to.
    Navigation,
}

/// A fatal problem surfaced while visiting one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    #[serde(rename = "type")]
    pub kind: PageErrorKind,
    pub message: String,
}

impl PageError {
    pub fn new(kind: PageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A subresource that failed to load. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Everything observed while one URL was open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub url: String,
    pub depth: usize,
    #[serde(default)]
    pub errors: Vec<PageError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_requests: Vec<FailedRequest>,
    #[serde(default)]
    pub console_warnings: usize,
}

impl CrawlResult {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
            errors: Vec::new(),
            failed_requests: Vec::new(),
            console_warnings: 0,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Per-URL results of one crawl, in visit order.
#[derive(Debug, Clone, Default)]
pub struct CrawlResults {
    pages: Vec<CrawlResult>,
    index: HashMap<String, usize>,
    abort: Option<AbortReason>,
}

impl CrawlResults {
    pub(crate) fn insert(&mut self, result: CrawlResult) {
        match self.index.get(&result.url) {
            Some(&slot) => self.pages[slot] = result,
            None => {
                self.index.insert(result.url.clone(), self.pages.len());
                self.pages.push(result);
            }
        }
    }

    pub(crate) fn set_abort(&mut self, reason: Option<AbortReason>) {
        self.abort = reason;
    }

    pub fn get(&self, url: &str) -> Option<&CrawlResult> {
        self.index.get(url).map(|&slot| &self.pages[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CrawlResult> {
        self.pages.iter()
    }

    /// Visited URLs in the order they were opened.
    pub fn urls(&self) -> Vec<&str> {
        self.pages.iter().map(|page| page.url.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The first fatal error, if the crawl was aborted.
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.abort.as_ref()
    }

    /// Whether the run must be treated as failed.
    pub fn errored(&self) -> bool {
        self.abort.is_some()
    }
}
