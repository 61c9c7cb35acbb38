use crate::crawler::{CrawlResult, CrawlResults};
use crate::error::ErrorPayload;
use crate::plugins::CaptureSummary;
use crate::signal::AbortReason;
use serde::{Deserialize, Serialize};

/// Schema version for output payloads.
pub const OUTPUT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum CrawlReport {
    Crawl(CrawlOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOutput {
    pub version: String,
    pub start_url: String,
    pub passed: bool,
    pub pages_visited: usize,
    pub pages: Vec<CrawlResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache_extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<CaptureSummary>,
}

impl CrawlOutput {
    pub fn from_results(
        start_url: impl Into<String>,
        results: &CrawlResults,
        cache_extensions: Vec<String>,
        screenshots: Option<CaptureSummary>,
    ) -> Self {
        Self {
            version: OUTPUT_VERSION.to_string(),
            start_url: start_url.into(),
            passed: !results.errored(),
            pages_visited: results.len(),
            pages: results.iter().cloned().collect(),
            abort: results.abort_reason().cloned(),
            cache_extensions,
            screenshots,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    pub error: ErrorPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
