//! Per-page error and console classification.

use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::result::{CrawlResult, FailedRequest, PageError, PageErrorKind};
use crate::browser::{Page, PageEvent};
use crate::signal::{AbortReason, CrawlAbortSignal};
use crate::CrawlError;

/// Regexes whose matches turn a console error into noise.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Regex>,
}

impl IgnorePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// How one page event affects the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    /// Ends the crawl.
    Fatal(PageError),
    /// Console error matched by an ignore pattern.
    Ignored,
    /// `console.warn` output.
    Warning,
    /// Failed subresource request.
    RequestFailed(FailedRequest),
    /// Any other console output.
    Info,
}

pub fn classify(event: &PageEvent, ignore: &IgnorePatterns) -> EventClass {
    match event {
        PageEvent::PageError { message } => {
            EventClass::Fatal(PageError::new(PageErrorKind::PageError, message.clone()))
        }
        PageEvent::Console { level, text } => match level.as_str() {
            "error" if ignore.matches(text) => EventClass::Ignored,
            "error" => EventClass::Fatal(PageError::new(PageErrorKind::ConsoleError, text.clone())),
            "warning" | "warn" => EventClass::Warning,
            _ => EventClass::Info,
        },
        PageEvent::RequestFailed { url, failure } => EventClass::RequestFailed(FailedRequest {
            url: url.clone(),
            failure: failure.clone(),
        }),
    }
}

#[derive(Debug)]
struct SessionState {
    errors: Vec<PageError>,
    failed_requests: Vec<FailedRequest>,
    console_warnings: usize,
}

#[derive(Debug)]
struct SessionInner {
    url: String,
    ignore: Arc<IgnorePatterns>,
    signal: CrawlAbortSignal,
    show_probe: bool,
    state: Mutex<SessionState>,
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_fatal(&self, err: PageError) {
        self.state().errors.push(err.clone());
        self.signal.trigger(AbortReason {
            url: self.url.clone(),
            error: err,
        });
    }

    fn handle(&self, event: PageEvent) {
        let url = self.url.as_str();
        match classify(&event, &self.ignore) {
            EventClass::Fatal(err) => {
                error!(url, kind = ?err.kind, message = %err.message, "page error");
                self.record_fatal(err);
            }
            EventClass::Ignored => {
                debug!(url, ?event, "ignored console error");
            }
            EventClass::Warning => {
                self.state().console_warnings += 1;
                if let PageEvent::Console { text, .. } = &event {
                    if self.show_probe {
                        info!(url, text = %text, "console warning");
                    } else {
                        warn!(url, text = %text, "console warning");
                    }
                }
            }
            EventClass::RequestFailed(request) => {
                if self.show_probe {
                    warn!(url, request = %request.url, failure = ?request.failure, "request failed");
                } else {
                    info!(url, request = %request.url, failure = ?request.failure, "request failed");
                }
                self.state().failed_requests.push(request);
            }
            EventClass::Info => {
                if let PageEvent::Console { level, text } = &event {
                    if self.show_probe {
                        info!(url, level = %level, text = %text, "console");
                    } else {
                        debug!(url, level = %level, text = %text, "console");
                    }
                }
            }
        }
    }
}

/// Listens to one page for the duration of a visit.
#[derive(Debug, Clone)]
pub struct PageSession {
    inner: Arc<SessionInner>,
}

impl PageSession {
    pub fn new(
        url: impl Into<String>,
        ignore: Arc<IgnorePatterns>,
        signal: CrawlAbortSignal,
        show_probe: bool,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                url: url.into(),
                ignore,
                signal,
                show_probe,
                state: Mutex::new(SessionState {
                    errors: Vec::new(),
                    failed_requests: Vec::new(),
                    console_warnings: 0,
                }),
            }),
        }
    }

    /// Installs this session as `page`'s event handler.
    pub fn attach(&self, page: &dyn Page) {
        let inner = Arc::clone(&self.inner);
        page.set_event_handler(Arc::new(move |event| inner.handle(event)));
    }

    /// Feeds one event through classification; what the page handler does.
    pub fn handle(&self, event: PageEvent) {
        self.inner.handle(event);
    }

    /// Records a failed navigation; always fatal.
    pub fn record_navigation_failure(&self, err: &CrawlError) {
        let message = match err {
            CrawlError::Navigation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        error!(url = %self.inner.url, %message, "navigation failed");
        self.inner
            .record_fatal(PageError::new(PageErrorKind::Navigation, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.inner.state().errors.is_empty()
    }

    /// What has been observed so far.
    pub fn snapshot(&self, depth: usize) -> CrawlResult {
        let state = self.inner.state();
        CrawlResult {
            url: self.inner.url.clone(),
            depth,
            errors: state.errors.clone(),
            failed_requests: state.failed_requests.clone(),
            console_warnings: state.console_warnings,
        }
    }
}
