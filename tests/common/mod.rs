#![allow(dead_code)]

//! In-memory site and browser for driving the crawler without Chromium.

use async_trait::async_trait;
use democrawl_lib::browser::{
    scripts, Browser, BrowserContext, ContextOptions, EventHandler, Page, PageEvent,
    ScreenshotTarget, WaitUntil,
};
use democrawl_lib::{CrawlError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const ORIGIN: &str = "http://localhost:5000";

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn page_error(message: &str) -> PageEvent {
    PageEvent::PageError {
        message: message.to_string(),
    }
}

pub fn console(level: &str, text: &str) -> PageEvent {
    PageEvent::Console {
        level: level.to_string(),
        text: text.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SitePage {
    pub links: Vec<String>,
    pub on_load: Vec<PageEvent>,
    pub on_unload: Vec<PageEvent>,
    pub fail_navigation: Option<String>,
    pub idle_timeout: bool,
    /// Navigation never settles after the load events fire.
    pub hangs_after_load: bool,
    /// Publishes `window.demoMetadata` / `window.demoRegistry`.
    pub hosts_demos: bool,
}

impl SitePage {
    pub fn linking(links: &[&str]) -> Self {
        Self {
            links: links.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_load_event(mut self, event: PageEvent) -> Self {
        self.on_load.push(event);
        self
    }

    pub fn with_unload_event(mut self, event: PageEvent) -> Self {
        self.on_unload.push(event);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Demo {
    pub id: String,
    pub category: Option<String>,
    /// The demo the router actually renders for this id.
    pub renders: String,
    pub has_canvas: bool,
    pub throws_on_load: bool,
    pub fail_screenshot: bool,
    /// Only the canvas capture fails.
    pub fail_canvas: bool,
    /// Text of `#footer-demo-title`.
    pub footer_title: Option<String>,
}

impl Demo {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            category: None,
            renders: id.to_string(),
            has_canvas: true,
            throws_on_load: false,
            fail_screenshot: false,
            fail_canvas: false,
            footer_title: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeSite {
    pages: HashMap<String, SitePage>,
    demos: Vec<Demo>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, path: &str, page: SitePage) -> Self {
        self.pages.insert(url(path), page);
        self
    }

    pub fn demo(mut self, demo: Demo) -> Self {
        self.demos.push(demo);
        self
    }

    fn find_demo(&self, id: &str) -> Option<&Demo> {
        self.demos.iter().find(|d| d.id == id)
    }
}

#[derive(Debug, Default)]
pub struct BrowserLog {
    /// Every URL passed to `goto`, except the unload target.
    pub navigations: Vec<String>,
    pub contexts: Vec<ContextOptions>,
    pub contexts_closed: usize,
    pub pages_opened: usize,
    pub pages_closed: usize,
    pub screenshots: Vec<PathBuf>,
}

impl BrowserLog {
    pub fn visits_of(&self, target: &str) -> usize {
        self.navigations.iter().filter(|u| u.as_str() == target).count()
    }
}

#[derive(Clone)]
pub struct FakeBrowser {
    site: Arc<FakeSite>,
    log: Arc<Mutex<BrowserLog>>,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            log: Arc::new(Mutex::new(BrowserLog::default())),
        }
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, BrowserLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn BrowserContext>> {
        self.log.lock().unwrap().contexts.push(options);
        Ok(Box::new(FakeContext {
            site: Arc::clone(&self.site),
            log: Arc::clone(&self.log),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeContext {
    site: Arc<FakeSite>,
    log: Arc<Mutex<BrowserLog>>,
}

#[async_trait]
impl BrowserContext for FakeContext {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        self.log.lock().unwrap().pages_opened += 1;
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            log: Arc::clone(&self.log),
            state: Mutex::new(PageState::default()),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.log.lock().unwrap().contexts_closed += 1;
        Ok(())
    }
}

#[derive(Default)]
struct PageState {
    handler: Option<EventHandler>,
    current: Option<Url>,
}

struct FakePage {
    site: Arc<FakeSite>,
    log: Arc<Mutex<BrowserLog>>,
    state: Mutex<PageState>,
}

impl FakePage {
    fn emit(&self, events: &[PageEvent]) {
        let handler = self.state.lock().unwrap().handler.clone();
        if let Some(handler) = handler {
            for event in events {
                handler(event.clone());
            }
        }
    }

    fn current(&self) -> Option<Url> {
        self.state.lock().unwrap().current.clone()
    }

    fn current_page(&self) -> Option<&SitePage> {
        let mut current = self.current()?;
        current.set_fragment(None);
        self.site.pages.get(current.as_str())
    }

    /// The demo addressed by the current fragment.
    fn requested_demo(&self) -> Option<&Demo> {
        let current = self.current()?;
        self.site.find_demo(current.fragment()?)
    }

    fn rendered_demo(&self) -> Option<&Demo> {
        let requested = self.requested_demo()?;
        self.site.find_demo(&requested.renders)
    }

    fn hosts_demos(&self) -> bool {
        self.current_page().is_some_and(|p| p.hosts_demos) && !self.site.demos.is_empty()
    }
}

#[async_trait]
impl Page for FakePage {
    fn set_event_handler(&self, handler: EventHandler) {
        self.state.lock().unwrap().handler = Some(handler);
    }

    async fn goto(&self, target: &str, _wait_until: WaitUntil, _timeout: Duration) -> Result<()> {
        if target == "about:blank" {
            let unload = self
                .current_page()
                .map(|p| p.on_unload.clone())
                .unwrap_or_default();
            self.state.lock().unwrap().current = None;
            self.emit(&unload);
            return Ok(());
        }

        self.log.lock().unwrap().navigations.push(target.to_string());
        let parsed = Url::parse(target)?;
        let mut key = parsed.clone();
        key.set_fragment(None);
        let Some(page) = self.site.pages.get(key.as_str()) else {
            return Err(CrawlError::navigation(target, "net::ERR_HTTP_RESPONSE_CODE_FAILURE (404)"));
        };
        if let Some(message) = &page.fail_navigation {
            return Err(CrawlError::navigation(target, message.clone()));
        }

        self.state.lock().unwrap().current = Some(parsed);
        let mut events = page.on_load.clone();
        if self.requested_demo().is_some_and(|d| d.throws_on_load) {
            events.push(page_error("TypeError: demo setup failed"));
        }
        let hangs = page.hangs_after_load;
        self.emit(&events);
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()> {
        if self.current_page().is_some_and(|p| p.idle_timeout) {
            return Err(CrawlError::timeout(format!("{state:?}"), timeout));
        }
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let value = match expression {
            e if e == scripts::HARVEST_LINKS => {
                let base = self.current().map(String::from).unwrap_or_default();
                let hrefs = self
                    .current_page()
                    .map(|p| p.links.clone())
                    .unwrap_or_default();
                json!({ "base": base, "hrefs": hrefs })
            }
            e if e == scripts::CURRENT_URL => {
                json!(self.current().map(String::from).unwrap_or_else(|| "about:blank".to_string()))
            }
            e if e == scripts::DEMO_METADATA_READY => json!(self.hosts_demos()),
            e if e == scripts::DEMO_METADATA => {
                if !self.hosts_demos() {
                    return Ok(json!([]));
                }
                let entries: Vec<Value> = self
                    .site
                    .demos
                    .iter()
                    .enumerate()
                    .map(|(index, d)| {
                        json!({ "id": d.id, "title": d.id, "category": d.category, "index": index })
                    })
                    .collect();
                json!(entries)
            }
            e if e == scripts::DEMO_REGISTRY_KEYS => {
                if !self.hosts_demos() {
                    return Ok(json!([]));
                }
                json!(self.site.demos.iter().map(|d| d.id.clone()).collect::<Vec<_>>())
            }
            e if e == scripts::DEMO_ROOT_VISIBLE => json!(self.rendered_demo().is_some()),
            e if e == scripts::LOADED_DEMO_ID => {
                json!(self.rendered_demo().map(|d| d.id.clone()))
            }
            e if e == scripts::DEMO_HAS_CANVAS => {
                json!(self.rendered_demo().is_some_and(|d| d.has_canvas))
            }
            e if e == scripts::FOOTER_DEMO_TITLE => {
                json!(self.rendered_demo().and_then(|d| d.footer_title.clone()))
            }
            other => {
                return Err(CrawlError::browser(format!(
                    "fake page cannot evaluate {other}"
                )))
            }
        };
        Ok(value)
    }

    async fn screenshot(&self, target: &ScreenshotTarget, path: &Path) -> Result<()> {
        if self.rendered_demo().is_some_and(|d| d.fail_screenshot) {
            return Err(CrawlError::browser("Target closed"));
        }
        let canvas = matches!(target, ScreenshotTarget::Element(sel) if sel == scripts::DEMO_CANVAS_SELECTOR);
        if canvas && self.rendered_demo().is_some_and(|d| d.fail_canvas) {
            return Err(CrawlError::browser("element is not attached to the DOM"));
        }
        std::fs::write(path, b"\x89PNG")?;
        self.log.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.log.lock().unwrap().pages_closed += 1;
        Ok(())
    }
}

/// Files under `root`, as sorted `/`-separated relative paths.
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else if let Ok(rel) = path.strip_prefix(root) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort();
    files
}
