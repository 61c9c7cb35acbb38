//! Demo screenshot sweep.
//!
//! After the crawl, [`DemoScreenshotPlugin`] opens one fresh browser context
//! per `(viewport, color scheme)` pair and captures every registered demo
//! (or a single one) in it:
//!
//! ```text
//! {screenshot_dir}/{category}/{slug}-{viewport}[-{scheme}]-{base|canvas|full}.png
//! ```
//!
//! Demos are found through the page globals `window.demoMetadata` and
//! `window.demoRegistry` and addressed by URL fragment (`/#physics/electric-field`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{
    scripts, BrowserContext, ContextOptions, Page, PageEvent, ScreenshotTarget, WaitUntil,
};
use crate::crawler::{normalize_url, CrawlResult, CrawlResults, Crawler};
use crate::plugin::Plugin;
use crate::wait::{poll_until, PollOptions, DEFAULT_POLL_INTERVAL};
use crate::{ColorScheme, CrawlError, Result, ViewportConfig};

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between the demo root becoming visible and the first capture.
///
/// Demo setup (p5.js `setup`, first `draw`, async asset loads) exposes no
/// readiness signal, so a fixed wait is the only option.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone)]
pub struct DemoScreenshotOptions {
    pub screenshot_dir: PathBuf,
    /// Page hosting the demo registry; demos are opened as `{base_url}#{id}`.
    pub base_url: Url,
    /// Restrict the sweep to this registry key and verify it actually loads.
    pub single_demo: Option<String>,
    pub viewports: Vec<ViewportConfig>,
    /// Sweep light and dark; when false a single light pass runs and file
    /// names carry no scheme.
    pub capture_color_schemes: bool,
    pub navigation_timeout: Duration,
    pub visibility_timeout: Duration,
    pub discovery_timeout: Duration,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl DemoScreenshotOptions {
    pub fn new(screenshot_dir: impl Into<PathBuf>, base_url: Url) -> Self {
        Self {
            screenshot_dir: screenshot_dir.into(),
            base_url,
            single_demo: None,
            viewports: vec![ViewportConfig::desktop(), ViewportConfig::mobile()],
            capture_color_schemes: true,
            navigation_timeout: crate::crawler::DEFAULT_NAVIGATION_TIMEOUT,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One entry of `window.demoMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub index: usize,
}

/// Demos known to the site, read once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoCatalog {
    pub demos: Vec<DemoInfo>,
    /// `Object.keys(window.demoRegistry)`, the capture order of a full sweep.
    pub registry: Vec<String>,
}

impl DemoCatalog {
    pub fn get(&self, id: &str) -> Option<&DemoInfo> {
        self.demos.iter().find(|demo| demo.id == id)
    }

    /// Ids a full sweep visits. Falls back to metadata order when the
    /// registry is not exposed.
    pub fn sweep_ids(&self) -> Vec<String> {
        if self.registry.is_empty() {
            self.demos.iter().map(|demo| demo.id.clone()).collect()
        } else {
            self.registry.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureVariant {
    /// The `.demo-component` root element.
    Base,
    /// The first `<canvas>` inside the root.
    Canvas,
    Full,
}

impl CaptureVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureVariant::Base => "base",
            CaptureVariant::Canvas => "canvas",
            CaptureVariant::Full => "full",
        }
    }
}

/// A demo that could not be captured in one sweep cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFailure {
    pub demo: String,
    pub viewport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub files: Vec<PathBuf>,
    pub failures: Vec<CaptureFailure>,
    pub contexts_opened: usize,
}

/// `{slug}-{viewport}[-{scheme}]-{variant}.png`
pub fn screenshot_file_name(
    slug: &str,
    viewport: &str,
    scheme: Option<ColorScheme>,
    variant: CaptureVariant,
) -> String {
    match scheme {
        Some(scheme) => format!("{slug}-{viewport}-{}-{}.png", scheme.name(), variant.as_str()),
        None => format!("{slug}-{viewport}-{}.png", variant.as_str()),
    }
}

/// Human title of a demo: the metadata title, else the text of
/// `#footer-demo-title` on the loaded page.
pub async fn demo_title(page: &dyn Page, info: Option<&DemoInfo>) -> Option<String> {
    if let Some(title) = info
        .and_then(|demo| demo.title.as_deref())
        .map(str::trim)
        .filter(|title| !title.is_empty())
    {
        return Some(title.to_string());
    }
    page.evaluate(scripts::FOOTER_DEMO_TITLE)
        .await
        .ok()?
        .as_str()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

/// Keeps a path segment inside its parent directory.
fn sanitize_segment(segment: &str) -> Option<String> {
    let cleaned: String = segment
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Splits a demo id into its output directory (relative to the screenshot
/// root) and file slug.
///
/// `physics/electric-field` → (`physics`, `electric-field`). An id without a
/// slash uses its metadata category, or `uncategorized`.
pub fn demo_output_location(id: &str, info: Option<&DemoInfo>) -> (PathBuf, String) {
    let mut segments: Vec<String> = id.split('/').filter_map(sanitize_segment).collect();
    let slug = segments.pop().unwrap_or_else(|| "demo".to_string());

    let dir = if segments.is_empty() {
        let category = info
            .and_then(|demo| demo.category.as_deref())
            .map(slugify)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        PathBuf::from(category)
    } else {
        segments.iter().collect()
    };
    (dir, slug)
}

/// Captures every demo (or one) across the viewport × color scheme matrix.
#[derive(Debug)]
pub struct DemoScreenshotPlugin {
    options: DemoScreenshotOptions,
    catalog: Mutex<Option<Arc<DemoCatalog>>>,
    summary: Mutex<CaptureSummary>,
}

impl DemoScreenshotPlugin {
    pub fn new(options: DemoScreenshotOptions) -> Self {
        Self {
            options,
            catalog: Mutex::new(None),
            summary: Mutex::new(CaptureSummary::default()),
        }
    }

    pub fn options(&self) -> &DemoScreenshotOptions {
        &self.options
    }

    pub fn summary(&self) -> CaptureSummary {
        self.summary_mut().clone()
    }

    pub fn catalog(&self) -> Option<Arc<DemoCatalog>> {
        self.catalog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Files are recorded as they are written so a capture that fails
    /// midway still reports what it left on disk.
    fn record_file(&self, path: PathBuf) {
        self.summary_mut().files.push(path);
    }

    fn summary_mut(&self) -> MutexGuard<'_, CaptureSummary> {
        self.summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_catalog(&self, catalog: DemoCatalog) -> Arc<DemoCatalog> {
        let catalog = Arc::new(catalog);
        *self
            .catalog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&catalog));
        catalog
    }

    fn demo_url(&self, id: &str) -> Url {
        let mut url = self.options.base_url.clone();
        url.set_fragment(Some(id));
        url
    }

    fn poll_options(&self, timeout: Duration) -> PollOptions {
        PollOptions::new(timeout).with_interval(self.options.poll_interval)
    }

    async fn read_catalog(page: &dyn Page) -> Result<DemoCatalog> {
        let demos: Vec<DemoInfo> =
            serde_json::from_value(page.evaluate(scripts::DEMO_METADATA).await?)?;
        let registry: Vec<String> =
            serde_json::from_value(page.evaluate(scripts::DEMO_REGISTRY_KEYS).await?)?;
        Ok(DemoCatalog { demos, registry })
    }

    /// Loads the catalog through `page`, navigating it to the base URL first
    /// if needed. Times out after `discovery_timeout`.
    pub async fn discover_demos(&self, page: &dyn Page) -> Result<Arc<DemoCatalog>> {
        if let Some(catalog) = self.catalog() {
            return Ok(catalog);
        }

        let current = page
            .evaluate(scripts::CURRENT_URL)
            .await
            .ok()
            .and_then(|value| value.as_str().and_then(|url| normalize_url(url).ok()));
        let base = normalize_url(self.options.base_url.as_str())?;
        if current.as_ref() != Some(&base) {
            debug!(url = %base, "navigating to demo index for discovery");
            page.goto(
                base.as_str(),
                WaitUntil::DomContentLoaded,
                self.options.navigation_timeout,
            )
            .await?;
        }

        poll_until(
            "window.demoMetadata",
            self.poll_options(self.options.discovery_timeout),
            move || async move {
                let ready = page.evaluate(scripts::DEMO_METADATA_READY).await?;
                Ok(ready.as_bool().unwrap_or(false))
            },
        )
        .await?;

        let catalog = Self::read_catalog(page).await?;
        info!(
            demos = catalog.demos.len(),
            registered = catalog.registry.len(),
            "discovered demos"
        );
        Ok(self.store_catalog(catalog))
    }

    async fn sweep(
        &self,
        crawler: &Crawler,
        viewport: &ViewportConfig,
        scheme: ColorScheme,
    ) -> Result<()> {
        let context = crawler
            .browser()
            .new_context(ContextOptions {
                viewport: Some(viewport.clone()),
                color_scheme: Some(scheme),
            })
            .await?;
        self.summary_mut().contexts_opened += 1;

        let outcome = self.sweep_in_context(context.as_ref(), viewport, scheme).await;
        if let Err(err) = context.close().await {
            warn!(viewport = %viewport.name, %scheme, %err, "failed to close capture context");
        }
        outcome
    }

    async fn sweep_in_context(
        &self,
        context: &dyn BrowserContext,
        viewport: &ViewportConfig,
        scheme: ColorScheme,
    ) -> Result<()> {
        let page = context.new_page().await?;
        page.set_event_handler(Arc::new(|event| match event {
            PageEvent::PageError { message } => warn!(%message, "page error during capture"),
            other => debug!(event = ?other, "capture page event"),
        }));

        let outcome = self.sweep_page(page.as_ref(), viewport, scheme).await;
        if let Err(err) = page.close().await {
            warn!(viewport = %viewport.name, %scheme, %err, "failed to close capture page");
        }
        outcome
    }

    async fn sweep_page(
        &self,
        page: &dyn Page,
        viewport: &ViewportConfig,
        scheme: ColorScheme,
    ) -> Result<()> {
        let catalog = self.discover_demos(page).await?;
        let file_scheme = self.options.capture_color_schemes.then_some(scheme);

        if let Some(id) = &self.options.single_demo {
            self.capture_demo(page, &catalog, id, viewport, file_scheme, true)
                .await?;
            return Ok(());
        }

        let ids = catalog.sweep_ids();
        info!(viewport = %viewport.name, %scheme, demos = ids.len(), "capturing demos");
        for id in &ids {
            match self
                .capture_demo(page, &catalog, id, viewport, file_scheme, false)
                .await
            {
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        demo = %id,
                        viewport = %viewport.name,
                        %scheme,
                        %err,
                        "capture failed, skipping demo"
                    );
                    self.summary_mut().failures.push(CaptureFailure {
                        demo: id.clone(),
                        viewport: viewport.name.clone(),
                        scheme: file_scheme.map(|s| s.name().to_string()),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn capture_demo(
        &self,
        page: &dyn Page,
        catalog: &DemoCatalog,
        id: &str,
        viewport: &ViewportConfig,
        scheme: Option<ColorScheme>,
        verify_identity: bool,
    ) -> Result<usize> {
        let url = self.demo_url(id);
        page.goto(
            url.as_str(),
            WaitUntil::DomContentLoaded,
            self.options.navigation_timeout,
        )
        .await?;

        poll_until(
            &format!("demo {id} to become visible"),
            self.poll_options(self.options.visibility_timeout),
            move || async move {
                let visible = page.evaluate(scripts::DEMO_ROOT_VISIBLE).await?;
                Ok(visible.as_bool().unwrap_or(false))
            },
        )
        .await?;
        tokio::time::sleep(self.options.settle_delay).await;

        if verify_identity {
            let loaded = page.evaluate(scripts::LOADED_DEMO_ID).await?;
            let loaded = loaded.as_str().map(str::to_string);
            if loaded.as_deref() != Some(id) {
                return Err(CrawlError::DemoMismatch {
                    expected: id.to_string(),
                    actual: loaded,
                });
            }
            debug!(demo = %id, "demo identity confirmed");
        }
        let title = demo_title(page, catalog.get(id)).await;

        let (dir, slug) = demo_output_location(id, catalog.get(id));
        let dir = self.options.screenshot_dir.join(dir);
        tokio::fs::create_dir_all(&dir).await?;

        let mut written = 0usize;
        let base = dir.join(screenshot_file_name(
            &slug,
            &viewport.name,
            scheme,
            CaptureVariant::Base,
        ));
        page.screenshot(
            &ScreenshotTarget::Element(scripts::DEMO_ROOT_SELECTOR.to_string()),
            &base,
        )
        .await?;
        self.record_file(base);
        written += 1;

        let has_canvas = page
            .evaluate(scripts::DEMO_HAS_CANVAS)
            .await?
            .as_bool()
            .unwrap_or(false);
        if has_canvas {
            let canvas = dir.join(screenshot_file_name(
                &slug,
                &viewport.name,
                scheme,
                CaptureVariant::Canvas,
            ));
            page.screenshot(
                &ScreenshotTarget::Element(scripts::DEMO_CANVAS_SELECTOR.to_string()),
                &canvas,
            )
            .await?;
            self.record_file(canvas);
            written += 1;
        } else {
            debug!(demo = %id, "no canvas, skipping canvas capture");
        }

        let full = dir.join(screenshot_file_name(
            &slug,
            &viewport.name,
            scheme,
            CaptureVariant::Full,
        ));
        page.screenshot(&ScreenshotTarget::FullPage, &full).await?;
        self.record_file(full);
        written += 1;

        info!(
            demo = %id,
            title = title.as_deref().unwrap_or("-"),
            viewport = %viewport.name,
            scheme = scheme.map(ColorScheme::name).unwrap_or("-"),
            dir = %dir.display(),
            files = written,
            "captured"
        );
        Ok(written)
    }
}

#[async_trait]
impl Plugin for DemoScreenshotPlugin {
    fn name(&self) -> &str {
        "demo-screenshots"
    }

    async fn after_visit(
        &self,
        page: &dyn Page,
        url: &str,
        _depth: usize,
        _result: &CrawlResult,
    ) -> Result<()> {
        if self.catalog().is_some() {
            return Ok(());
        }
        let ready = page
            .evaluate(scripts::DEMO_METADATA_READY)
            .await
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if !ready {
            return Ok(());
        }
        match Self::read_catalog(page).await {
            Ok(catalog) => {
                debug!(url, demos = catalog.demos.len(), "cached demo catalog from crawled page");
                self.store_catalog(catalog);
            }
            Err(err) => debug!(url, %err, "could not read demo catalog"),
        }
        Ok(())
    }

    async fn after_crawl(&self, crawler: &Crawler, results: &CrawlResults) -> Result<()> {
        if results.errored() {
            info!("crawl aborted; capturing screenshots anyway");
        }
        for viewport in &self.options.viewports {
            for scheme in ColorScheme::sweep(self.options.capture_color_schemes) {
                self.sweep(crawler, viewport, scheme).await?;
            }
        }

        let summary = self.summary();
        info!(
            files = summary.files.len(),
            failures = summary.failures.len(),
            contexts = summary.contexts_opened,
            "screenshot sweep finished"
        );
        Ok(())
    }
}
