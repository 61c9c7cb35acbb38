//! Playwright-backed implementation of the browser traits.
//!
//! One Node.js helper process is spawned per [`PlaywrightBrowser`] and kept
//! alive for the whole run. Requests are correlated with replies by id;
//! page events are routed to the handler registered for their page.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::playwright::{
    ensure_node_available, ensure_playwright_available, map_playwright_error, map_request_error,
    map_spawn_error, BRIDGE_SCRIPT,
};
use super::protocol::{
    ContextCreated, EvaluateParams, GotoParams, HelperMessage, LoadStateParams, NewContextParams,
    PageCreated, Request, ScreenshotParams,
};
use super::{
    Browser, BrowserContext, ContextOptions, EventHandler, Page, ScreenshotTarget, WaitUntil,
};
use crate::{CrawlError, Result};

/// Default time allowed for the helper to start Chromium and report ready.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(45);

/// Extra time granted on top of a page-side timeout before the reply itself is
/// considered lost.
pub const DEFAULT_REQUEST_MARGIN: Duration = Duration::from_secs(5);

/// Default timeout for requests that carry no page-side timeout of their own.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration options for the Playwright helper.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Timeout for launching the helper and Chromium.
    pub launch_timeout: Duration,
    /// Timeout for requests without a page-side timeout (evaluate, screenshot, ...).
    pub request_timeout: Duration,
    /// Grace period added to page-side timeouts.
    pub request_margin: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            headless: true,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_margin: DEFAULT_REQUEST_MARGIN,
        }
    }
}

enum Reply {
    Ok(Value),
    Err {
        name: Option<String>,
        message: String,
    },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Request/reply correlation and event routing for one helper process.
struct Connection {
    /// Dropped on shutdown so the helper sees EOF on stdin.
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    handlers: Mutex<HashMap<String, EventHandler>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    request_timeout: Duration,
    request_margin: Duration,
}

impl Connection {
    fn new(writer: mpsc::UnboundedSender<String>, options: &BrowserOptions) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            pending: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            request_timeout: options.request_timeout,
            request_margin: options.request_margin,
        }
    }

    fn send(&self, id: u64, method: &str, params: Value) -> Result<()> {
        let line = serde_json::to_string(&Request { id, method, params })?;
        lock(&self.writer)
            .as_ref()
            .ok_or_else(|| CrawlError::browser("Playwright helper input is closed"))?
            .send(line)
            .map_err(|_| CrawlError::browser("Playwright helper input is closed"))
    }

    fn close_input(&self) {
        lock(&self.writer).take();
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        page_timeout: Option<Duration>,
    ) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CrawlError::browser(format!(
                "Playwright helper has exited; cannot run {method}"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        if let Err(err) = self.send(id, method, params) {
            lock(&self.pending).remove(&id);
            return Err(err);
        }

        let wait = page_timeout
            .map(|t| t + self.request_margin)
            .unwrap_or(self.request_timeout);

        match timeout(wait, rx).await {
            Ok(Ok(Reply::Ok(value))) => Ok(value),
            Ok(Ok(Reply::Err { name, message })) => Err(map_request_error(
                method,
                name.as_deref(),
                message,
                page_timeout,
            )),
            Ok(Err(_)) => Err(CrawlError::browser(format!(
                "Playwright helper exited before answering {method}"
            ))),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(CrawlError::timeout(
                    format!("Playwright helper reply to {method}"),
                    wait,
                ))
            }
        }
    }

    /// Fire-and-forget request; the reply is dropped by the reader.
    fn notify(&self, method: &str, params: Value) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.send(id, method, params) {
            debug!(method, %err, "dropping helper notification");
        }
    }

    fn dispatch(&self, message: HelperMessage) {
        match message {
            HelperMessage::Response { id, result } => self.resolve(id, Reply::Ok(result)),
            HelperMessage::Error { id, name, message } => {
                self.resolve(id, Reply::Err { name, message })
            }
            HelperMessage::Event { page_id, event } => {
                let handler = lock(&self.handlers).get(&page_id).cloned();
                match handler {
                    Some(handler) => handler(event),
                    None => debug!(page = %page_id, ?event, "event for page without handler"),
                }
            }
            HelperMessage::Fatal { message } => error!(%message, "Playwright helper failed"),
            HelperMessage::Ready => {}
        }
    }

    fn resolve(&self, id: u64, reply: Reply) {
        if let Some(tx) = lock(&self.pending).remove(&id) {
            let _ = tx.send(reply);
        }
    }

    /// Marks the connection dead and wakes every waiting caller.
    fn fail_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.pending).clear();
        lock(&self.handlers).clear();
    }

    fn set_handler(&self, page_id: &str, handler: EventHandler) {
        lock(&self.handlers).insert(page_id.to_string(), handler);
    }

    fn remove_handler(&self, page_id: &str) {
        lock(&self.handlers).remove(page_id);
    }
}

async fn read_stdout(
    stdout: ChildStdout,
    connection: Arc<Connection>,
    ready: oneshot::Sender<std::result::Result<(), String>>,
) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HelperMessage>(line) {
                    Ok(HelperMessage::Ready) => {
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Ok(()));
                        }
                    }
                    Ok(HelperMessage::Fatal { message }) => {
                        error!(%message, "Playwright helper failed");
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Err(message));
                        }
                    }
                    Ok(message) => connection.dispatch(message),
                    Err(err) => debug!(%err, line, "ignoring non-protocol helper output"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "failed reading Playwright helper output");
                break;
            }
        }
    }
    connection.fail_all();
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "democrawl_lib::browser::helper", "{}", line);
    }
}

/// A Chromium instance driven through the Playwright helper.
pub struct PlaywrightBrowser {
    connection: Arc<Connection>,
    child: tokio::sync::Mutex<Option<Child>>,
    options: BrowserOptions,
}

impl PlaywrightBrowser {
    /// Spawns the helper and waits until Chromium is up.
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        // Fail fast if Node is missing to avoid spawning the helper unnecessarily.
        ensure_node_available(&options.node_command).await?;
        ensure_playwright_available(&options.node_command).await?;

        let mut cmd = Command::new(&options.node_command);
        cmd.arg("-e")
            .arg(BRIDGE_SCRIPT)
            .arg(if options.headless { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &options.node_command))?;

        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = child.kill().await;
                return Err(CrawlError::browser("Playwright helper pipes are unavailable"));
            }
        };

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = writer_rx.recv().await {
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let connection = Arc::new(Connection::new(writer_tx, &options));
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(read_stdout(stdout, Arc::clone(&connection), ready_tx));
        tokio::spawn(forward_stderr(stderr));

        debug!(headless = options.headless, "waiting for Playwright helper");
        match timeout(options.launch_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(message))) => {
                let _ = child.kill().await;
                return Err(map_playwright_error("fatal", &message));
            }
            Ok(Err(_)) => {
                let status = child
                    .wait()
                    .await
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| e.to_string());
                return Err(CrawlError::browser(format!(
                    "Playwright helper exited during launch ({status}); run with --verbose for its output"
                )));
            }
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(CrawlError::timeout(
                    "Playwright helper launch",
                    options.launch_timeout,
                ));
            }
        }

        Ok(Self {
            connection,
            child: tokio::sync::Mutex::new(Some(child)),
            options,
        })
    }

    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }
}

#[async_trait]
impl Browser for PlaywrightBrowser {
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn BrowserContext>> {
        let params = serde_json::to_value(NewContextParams::from(&options))?;
        let value = self.connection.call("newContext", params, None).await?;
        let created: ContextCreated = serde_json::from_value(value)?;
        debug!(context = %created.context_id, ?options, "opened browser context");
        Ok(Box::new(PlaywrightContext {
            connection: Arc::clone(&self.connection),
            id: created.context_id,
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return Ok(());
        };

        if let Err(err) = self
            .connection
            .call("shutdown", Value::Null, Some(self.options.request_timeout))
            .await
        {
            debug!(%err, "helper shutdown request failed");
        }
        self.connection.close_input();
        self.connection.fail_all();

        match timeout(self.options.request_margin, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Playwright helper exited"),
            Ok(Err(err)) => return Err(CrawlError::Io(err)),
            Err(_) => {
                warn!(after = ?self.options.request_margin, "Playwright helper did not exit, killing it");
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }
        Ok(())
    }
}

struct PlaywrightContext {
    connection: Arc<Connection>,
    id: String,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserContext for PlaywrightContext {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        let value = self
            .connection
            .call("newPage", serde_json::json!({ "contextId": self.id }), None)
            .await?;
        let created: PageCreated = serde_json::from_value(value)?;
        Ok(Box::new(PlaywrightPage {
            connection: Arc::clone(&self.connection),
            id: created.page_id,
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connection
            .call("closeContext", serde_json::json!({ "contextId": self.id }), None)
            .await?;
        debug!(context = %self.id, "closed browser context");
        Ok(())
    }
}

impl Drop for PlaywrightContext {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.connection
                .notify("closeContext", serde_json::json!({ "contextId": self.id }));
        }
    }
}

struct PlaywrightPage {
    connection: Arc<Connection>,
    id: String,
    closed: AtomicBool,
}

#[async_trait]
impl Page for PlaywrightPage {
    fn set_event_handler(&self, handler: EventHandler) {
        self.connection.set_handler(&self.id, handler);
    }

    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
        let params = serde_json::to_value(GotoParams {
            page_id: &self.id,
            url,
            wait_until,
            timeout: timeout.as_millis() as u64,
        })?;
        self.connection
            .call("goto", params, Some(timeout))
            .await
            .map(|_| ())
            .map_err(|err| match err {
                CrawlError::Browser(message) => CrawlError::navigation(url, message),
                err @ CrawlError::Timeout { .. } => CrawlError::navigation(url, err.to_string()),
                other => other,
            })
    }

    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()> {
        let params = serde_json::to_value(LoadStateParams {
            page_id: &self.id,
            state,
            timeout: timeout.as_millis() as u64,
        })?;
        self.connection
            .call("waitForLoadState", params, Some(timeout))
            .await
            .map(|_| ())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let params = serde_json::to_value(EvaluateParams {
            page_id: &self.id,
            expression,
        })?;
        self.connection.call("evaluate", params, None).await
    }

    async fn screenshot(&self, target: &ScreenshotTarget, path: &Path) -> Result<()> {
        let params = serde_json::to_value(ScreenshotParams {
            page_id: &self.id,
            path: path.to_string_lossy().to_string(),
            selector: match target {
                ScreenshotTarget::FullPage => None,
                ScreenshotTarget::Element(selector) => Some(selector.as_str()),
            },
            full_page: matches!(target, ScreenshotTarget::FullPage),
        })?;
        self.connection
            .call("screenshot", params, None)
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let outcome = self
            .connection
            .call("closePage", serde_json::json!({ "pageId": self.id }), None)
            .await
            .map(|_| ());
        self.connection.remove_handler(&self.id);
        outcome
    }
}

impl Drop for PlaywrightPage {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.connection
                .notify("closePage", serde_json::json!({ "pageId": self.id }));
            self.connection.remove_handler(&self.id);
        }
    }
}
