//! Crawl-wide abort signal.
//!
//! Page event handlers run on whatever task delivers browser events, while the
//! crawl loop runs on its own task. The signal is how the former tells the
//! latter to stop: it is set at most once per crawl and never cleared.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::crawler::PageError;

/// Why a crawl was aborted: the first fatal error and the page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortReason {
    pub url: String,
    pub error: PageError,
}

#[derive(Debug, Clone, Default)]
pub struct CrawlAbortSignal {
    token: CancellationToken,
    reason: Arc<Mutex<Option<AbortReason>>>,
}

impl CrawlAbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal. Only the first reason is kept; returns whether this call set it.
    pub fn trigger(&self, reason: AbortReason) -> bool {
        let mut slot = self
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        drop(slot);
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<AbortReason> {
        self.reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Resolves once the signal has been triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::PageErrorKind;
    use std::time::Duration;

    fn reason(url: &str, message: &str) -> AbortReason {
        AbortReason {
            url: url.to_string(),
            error: PageError::new(PageErrorKind::PageError, message),
        }
    }

    #[test]
    fn first_reason_wins() {
        let signal = CrawlAbortSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger(reason("http://a/", "first")));
        assert!(!signal.trigger(reason("http://b/", "second")));

        let kept = signal.reason().unwrap();
        assert_eq!(kept.url, "http://a/");
        assert_eq!(kept.error.message, "first");
        assert!(signal.is_triggered());
    }

    #[test]
    fn clones_share_state() {
        let signal = CrawlAbortSignal::new();
        let listener_side = signal.clone();
        listener_side.trigger(reason("http://a/", "boom"));
        assert!(signal.is_triggered());
        assert!(signal.reason().is_some());
    }

    #[tokio::test]
    async fn triggered_resolves_after_trigger() {
        let signal = CrawlAbortSignal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            setter.trigger(reason("http://a/", "late"));
        });
        tokio::time::timeout(Duration::from_secs(2), signal.triggered())
            .await
            .expect("signal should fire");
    }
}
