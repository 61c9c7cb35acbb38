//! Headless browser seam used by the crawler and its plugins.
//!
//! The crawler never talks to a browser directly; it goes through the
//! [`Browser`] / [`BrowserContext`] / [`Page`] traits defined here. The
//! production implementation is [`PlaywrightBrowser`], a long-lived Node.js
//! helper driving Playwright over newline-delimited JSON.
//!
//! # Module Structure
//!
//! - [`bridge`] - Playwright helper process and request/event routing
//! - [`playwright`] - Helper script and availability checks for Node/Playwright
//! - [`protocol`] - Wire types exchanged with the helper
//! - [`scripts`] - Page-side JavaScript expressions evaluated by the crawler
//!
//! # Example
//!
//! ```no_run
//! use democrawl_lib::browser::{Browser, BrowserOptions, ContextOptions, PlaywrightBrowser, WaitUntil};
//! use std::time::Duration;
//!
//! # async fn example() -> democrawl_lib::Result<()> {
//! let browser = PlaywrightBrowser::launch(BrowserOptions::default()).await?;
//! let context = browser.new_context(ContextOptions::default()).await?;
//! let page = context.new_page().await?;
//! page.goto("http://localhost:5000/", WaitUntil::DomContentLoaded, Duration::from_secs(5)).await?;
//! page.close().await?;
//! context.close().await?;
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod playwright;
mod protocol;
pub mod scripts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{ColorScheme, Result, ViewportConfig};

pub use bridge::{
    BrowserOptions, PlaywrightBrowser, DEFAULT_LAUNCH_TIMEOUT, DEFAULT_REQUEST_MARGIN,
};

/// Load state a navigation or explicit wait resolves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitUntil {
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

/// What a screenshot should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotTarget {
    /// The whole scrollable page.
    FullPage,
    /// The first element matching a CSS selector.
    Element(String),
}

/// Emulation settings for a fresh, isolated browser context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextOptions {
    pub viewport: Option<ViewportConfig>,
    pub color_scheme: Option<ColorScheme>,
}

/// Something the page reported while it was open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageEvent {
    /// Uncaught exception thrown by page script.
    PageError { message: String },
    /// A `console.*` call; `level` is the console method (`error`, `warning`, ...).
    Console { level: String, text: String },
    /// A subresource request that never completed.
    #[serde(rename_all = "camelCase")]
    RequestFailed {
        url: String,
        failure: Option<String>,
    },
}

/// Receives a page's events as they arrive, possibly from another task.
pub type EventHandler = Arc<dyn Fn(PageEvent) + Send + Sync>;

/// A running browser shared across the whole crawl.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Opens a new isolated context (own cookies, storage and emulation).
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn BrowserContext>>;

    /// Shuts the browser down.
    async fn close(&self) -> Result<()>;
}

/// An isolated browser context.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>>;

    async fn close(&self) -> Result<()>;
}

/// A single browser tab.
#[async_trait]
pub trait Page: Send + Sync {
    /// Installs the handler receiving this page's events, replacing any previous one.
    fn set_event_handler(&self, handler: EventHandler);

    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;

    /// Waits for a load state; a [`crate::CrawlError::Timeout`] means it was not reached in time.
    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()>;

    /// Evaluates a JavaScript expression in the page and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    async fn screenshot(&self, target: &ScreenshotTarget, path: &Path) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
