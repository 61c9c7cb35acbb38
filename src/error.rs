use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Demo mismatch: requested {expected}, page loaded {}", actual.as_deref().unwrap_or("nothing"))]
    DemoMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl CrawlError {
    pub fn browser(message: impl Into<String>) -> Self {
        CrawlError::Browser(message.into())
    }

    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlError::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        CrawlError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CrawlError::Timeout { .. })
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            CrawlError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions for the screenshot and report locations.",
            ),
            CrawlError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify the start URL (e.g., http://localhost:5000/demos/).",
            ),
            CrawlError::InvalidPattern(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Fix the --ignore / ignore_patterns regular expression.",
            ),
            CrawlError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Browser,
                e.to_string(),
                "The browser helper produced unexpected output; run with --verbose for details.",
            ),
            CrawlError::Config(msg) => ErrorPayload::new(
                ErrorCategory::Config,
                msg.to_string(),
                "Check flags and the config file (see --help).",
            ),
            CrawlError::Browser(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`).",
                    )
                } else if lower.contains("executable doesn't exist")
                    || lower.contains("chromium executable")
                {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Run `npx playwright install chromium` to download the browser.",
                    )
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Node.js and ensure the node binary is on PATH (or set node_command in the config).",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Re-run with --verbose to see the browser helper output.",
                    )
                }
            }
            CrawlError::Navigation { .. } => ErrorPayload::new(
                ErrorCategory::Page,
                self.to_string(),
                "Ensure the site under test is being served and the URL is reachable.",
            ),
            CrawlError::Timeout { .. } => ErrorPayload::new(
                ErrorCategory::Page,
                self.to_string(),
                "Increase the matching [timeouts] entry in the config or check that the page becomes ready.",
            ),
            CrawlError::DemoMismatch { .. } => ErrorPayload::new(
                ErrorCategory::Capture,
                self.to_string(),
                "The demo route loaded a different demo; check the site's hash routing and demo registry keys.",
            ),
            CrawlError::Unknown(msg) => ErrorPayload::new(
                ErrorCategory::Unknown,
                msg.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Browser,
    Page,
    Capture,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
