//! democrawl library
//!
//! A headless-browser regression gate for documentation sites with live
//! demos. The crawler walks every same-origin page reachable from a start
//! URL and stops at the first page error; plugins hook into the crawl, and
//! the bundled screenshot plugin captures each demo across viewports and
//! color schemes once the crawl is done.
//!
//! # Module Overview
//!
//! - [`crawler`] - Traversal loop, queue, link discovery and page error classification
//! - [`plugin`] - Lifecycle hooks (`before_crawl`, `after_visit`, `after_crawl`)
//! - [`plugins`] - Built-in plugins (demo screenshots)
//! - [`browser`] - Browser traits and the Playwright-backed implementation
//! - [`signal`] - Crawl-wide abort signal
//! - [`wait`] - Bounded polling helper
//! - [`config`] - Configuration file support
//! - [`output`] - JSON report schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use democrawl_lib::{BrowserOptions, Crawler, CrawlerOptions, PlaywrightBrowser};
//!
//! # async fn example() -> democrawl_lib::Result<()> {
//! let browser = Arc::new(PlaywrightBrowser::launch(BrowserOptions::default()).await?);
//! let crawler = Crawler::new(browser.clone(), CrawlerOptions::default())?;
//! let results = crawler.crawl("http://localhost:5000/demos/").await?;
//! assert!(!results.errored());
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod color_scheme;
pub mod config;
pub mod crawler;
pub mod error;
pub mod output;
pub mod plugin;
pub mod plugins;
pub mod signal;
pub mod viewport;
pub mod wait;

pub use browser::{Browser, BrowserContext, BrowserOptions, Page, PlaywrightBrowser};
pub use color_scheme::ColorScheme;
pub use config::Config;
pub use crawler::{CrawlResult, CrawlResults, Crawler, CrawlerOptions, PageError, PageErrorKind};
pub use error::{CrawlError, ErrorCategory, ErrorPayload, Result};
pub use output::{CrawlOutput, CrawlReport, ErrorOutput, OUTPUT_VERSION};
pub use plugin::{Plugin, PluginHost};
pub use plugins::{CaptureSummary, DemoScreenshotOptions, DemoScreenshotPlugin};
pub use signal::{AbortReason, CrawlAbortSignal};
pub use viewport::{ViewportConfig, ViewportSelection};
