//! Playwright helper script, error mapping, and availability checks for
//! Node.js and Playwright.

use crate::{CrawlError, Result};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Long-lived helper: launches Chromium once, then serves JSON-line requests
/// from stdin and streams responses and page events on stdout.
pub(crate) const BRIDGE_SCRIPT: &str = r#"
const headless = process.argv[1] !== '0';
const readline = require('readline');

const contexts = new Map();
const pages = new Map();
let seq = 0;

function send(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

function describe(err) {
  return err && err.message ? err.message : String(err);
}

function pageFor(params) {
  const page = pages.get(params.pageId);
  if (!page) throw new Error(`unknown page ${params.pageId}`);
  return page;
}

async function main() {
  const { chromium } = require('playwright');
  const browser = await chromium.launch({ headless });

  const handlers = {
    async newContext(params) {
      const options = {};
      if (params.viewport) options.viewport = params.viewport;
      if (params.deviceScaleFactor !== undefined) options.deviceScaleFactor = params.deviceScaleFactor;
      if (params.isMobile !== undefined) options.isMobile = params.isMobile;
      if (params.hasTouch !== undefined) options.hasTouch = params.hasTouch;
      if (params.colorScheme) options.colorScheme = params.colorScheme;
      const context = await browser.newContext(options);
      const contextId = `ctx-${++seq}`;
      contexts.set(contextId, context);
      return { contextId };
    },
    async closeContext(params) {
      const context = contexts.get(params.contextId);
      contexts.delete(params.contextId);
      if (context) await context.close();
      return null;
    },
    async newPage(params) {
      const context = contexts.get(params.contextId);
      if (!context) throw new Error(`unknown context ${params.contextId}`);
      const page = await context.newPage();
      const pageId = `page-${++seq}`;
      pages.set(pageId, page);
      page.on('pageerror', err => send({ type: 'event', pageId, event: { kind: 'pageError', message: describe(err) } }));
      page.on('console', msg => send({ type: 'event', pageId, event: { kind: 'console', level: msg.type(), text: msg.text() } }));
      page.on('requestfailed', req => {
        const failure = req.failure();
        send({ type: 'event', pageId, event: { kind: 'requestFailed', url: req.url(), failure: failure ? failure.errorText : null } });
      });
      return { pageId };
    },
    async closePage(params) {
      const page = pages.get(params.pageId);
      pages.delete(params.pageId);
      if (page) await page.close();
      return null;
    },
    async goto(params) {
      await pageFor(params).goto(params.url, { waitUntil: params.waitUntil, timeout: params.timeout });
      return null;
    },
    async waitForLoadState(params) {
      await pageFor(params).waitForLoadState(params.state, { timeout: params.timeout });
      return null;
    },
    async evaluate(params) {
      const value = await pageFor(params).evaluate(params.expression);
      return value === undefined ? null : value;
    },
    async screenshot(params) {
      const page = pageFor(params);
      if (params.selector) {
        const el = await page.$(params.selector);
        if (!el) throw new Error(`no element matches ${params.selector}`);
        await el.screenshot({ path: params.path });
      } else {
        await page.screenshot({ path: params.path, fullPage: params.fullPage });
      }
      return null;
    },
    async shutdown() {
      await browser.close();
      return null;
    }
  };

  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', async line => {
    let msg;
    try {
      msg = JSON.parse(line);
    } catch (err) {
      return;
    }
    const handler = handlers[msg.method];
    try {
      if (!handler) throw new Error(`unknown method ${msg.method}`);
      const result = await handler(msg.params || {});
      if (msg.method === 'shutdown') {
        process.stdout.write(JSON.stringify({ type: 'response', id: msg.id, result }) + '\n', () => process.exit(0));
        return;
      }
      send({ type: 'response', id: msg.id, result });
    } catch (err) {
      send({ type: 'error', id: msg.id, name: err && err.name ? err.name : null, message: describe(err) });
    }
  });
  rl.on('close', async () => {
    await browser.close().catch(() => {});
    process.exit(0);
  });

  send({ type: 'ready' });
}

main().catch(err => {
  send({ type: 'fatal', message: describe(err) });
  process.exit(1);
});
"#;

/// Timeout for checking node/playwright availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Script to check if Playwright is installed.
const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

const MISSING_PLAYWRIGHT: &str =
    "Playwright npm package is missing; install with `npm install playwright`.";

/// Maps a spawn error to an appropriate CrawlError.
pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> CrawlError {
    if err.kind() == io::ErrorKind::NotFound {
        CrawlError::browser(format!(
            "Unable to spawn Playwright helper; '{}' was not found on PATH",
            command
        ))
    } else {
        CrawlError::Io(err)
    }
}

/// Maps helper stderr output to an appropriate CrawlError.
pub(crate) fn map_playwright_error(status_text: impl Into<String>, stderr: &str) -> CrawlError {
    if stderr
        .to_ascii_lowercase()
        .contains("cannot find module 'playwright'")
    {
        return CrawlError::browser(MISSING_PLAYWRIGHT);
    }

    CrawlError::browser(format!(
        "Playwright helper exited with status {}: {}",
        status_text.into(),
        stderr.trim()
    ))
}

/// Maps an `error` reply for one request to a CrawlError.
///
/// Playwright's own `TimeoutError`s become [`CrawlError::Timeout`] so callers
/// can tell "not ready in time" apart from real failures.
pub(crate) fn map_request_error(
    method: &str,
    name: Option<&str>,
    message: String,
    timeout: Option<Duration>,
) -> CrawlError {
    if name == Some("TimeoutError") {
        return CrawlError::timeout(format!("{method}: {message}"), timeout.unwrap_or_default());
    }
    if message
        .to_ascii_lowercase()
        .contains("cannot find module 'playwright'")
    {
        return CrawlError::browser(MISSING_PLAYWRIGHT);
    }
    CrawlError::browser(format!("Playwright error ({}): {}", method, message))
}

/// Ensures Node.js is available on the system.
pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            CrawlError::browser(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(CrawlError::browser(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

/// Ensures Playwright npm package is installed.
pub(crate) async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            CrawlError::browser(format!(
                "Timed out checking Playwright availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_playwright_error(
            format!("{:?}", output.status),
            &stderr,
        ));
    }

    Ok(())
}
