//! Bounded polling until a page-side condition holds.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::{CrawlError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Calls `predicate` every `interval` until it yields `true` or `timeout` elapses.
///
/// A predicate error counts as "not yet" (pages routinely throw while they are
/// still navigating); the last error is folded into the timeout message.
pub async fn poll_until<F, Fut>(what: &str, options: PollOptions, mut predicate: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + options.timeout;
    let mut last_error: Option<CrawlError> = None;

    loop {
        match predicate().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => {
                trace!(what, %err, "poll predicate failed");
                last_error = Some(err);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            let operation = match last_error {
                Some(err) => format!("{what} (last error: {err})"),
                None => what.to_string(),
            };
            return Err(CrawlError::timeout(operation, options.timeout));
        }
        sleep(options.interval.min(deadline - now)).await;
    }
}
