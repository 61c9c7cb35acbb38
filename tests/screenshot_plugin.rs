mod common;

use common::{list_files, url, Demo, FakeBrowser, FakeSite, SitePage};
use democrawl_lib::browser::{Browser, BrowserContext, ContextOptions, Page, WaitUntil};
use democrawl_lib::plugins::{demo_title, DemoInfo};
use democrawl_lib::{
    ColorScheme, CrawlError, Crawler, CrawlerOptions, DemoScreenshotOptions,
    DemoScreenshotPlugin, ViewportConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEMO_INDEX: &str = "/demos/";

fn demo_site() -> FakeSite {
    let mut index = SitePage::default();
    index.hosts_demos = true;
    FakeSite::new().page(DEMO_INDEX, index)
}

fn options(dir: &Path) -> DemoScreenshotOptions {
    let mut options = DemoScreenshotOptions::new(dir, Url::parse(&url(DEMO_INDEX)).unwrap());
    options.settle_delay = Duration::ZERO;
    options.poll_interval = Duration::from_millis(5);
    options.visibility_timeout = Duration::from_millis(100);
    options.discovery_timeout = Duration::from_millis(100);
    options
}

async fn run(
    browser: &FakeBrowser,
    options: DemoScreenshotOptions,
) -> (democrawl_lib::Result<democrawl_lib::CrawlResults>, Arc<DemoScreenshotPlugin>) {
    let plugin = Arc::new(DemoScreenshotPlugin::new(options));
    let mut crawler = Crawler::new(
        Arc::new(browser.clone()),
        CrawlerOptions {
            max_depth: Some(0),
            single_page: true,
            ..CrawlerOptions::default()
        },
    )
    .unwrap();
    crawler.register_plugin(plugin.clone());
    let outcome = crawler.crawl(&url(DEMO_INDEX)).await;
    (outcome, plugin)
}

#[tokio::test]
async fn full_sweep_covers_every_viewport_scheme_and_demo() {
    let dir = tempfile::tempdir().unwrap();
    let mut noisy = Demo::new("physics/pendulum");
    noisy.throws_on_load = true;
    let browser = FakeBrowser::new(
        demo_site()
            .demo(Demo::new("basics/hello"))
            .demo(noisy)
            .demo(Demo::new("topology/torus")),
    );

    let (outcome, plugin) = run(&browser, options(dir.path())).await;
    assert!(!outcome.unwrap().errored());

    let files = list_files(dir.path());
    let bases: Vec<&String> = files.iter().filter(|f| f.ends_with("-base.png")).collect();
    assert_eq!(bases.len(), 3 * 2 * 2);
    for demo in ["basics/hello", "physics/pendulum", "topology/torus"] {
        for viewport in ["desktop", "mobile"] {
            for scheme in ["light", "dark"] {
                let name = format!("{demo}-{viewport}-{scheme}-base.png");
                assert!(files.contains(&name), "missing {name}");
            }
        }
    }

    let summary = plugin.summary();
    assert!(summary.failures.is_empty());
    assert_eq!(summary.contexts_opened, 4);
    assert_eq!(summary.files.len(), files.len());
}

#[tokio::test]
async fn default_sweep_opens_one_context_per_viewport_and_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(demo_site().demo(Demo::new("basics/hello")));
    let (outcome, _) = run(&browser, options(dir.path())).await;
    outcome.unwrap();

    let log = browser.log();
    let emulated: Vec<(String, Option<ColorScheme>)> = log
        .contexts
        .iter()
        .filter_map(|ctx| {
            ctx.viewport
                .as_ref()
                .map(|vp| (vp.name.clone(), ctx.color_scheme))
        })
        .collect();
    assert_eq!(
        emulated,
        vec![
            ("desktop".to_string(), Some(ColorScheme::Light)),
            ("desktop".to_string(), Some(ColorScheme::Dark)),
            ("mobile".to_string(), Some(ColorScheme::Light)),
            ("mobile".to_string(), Some(ColorScheme::Dark)),
        ]
    );
    assert_eq!(log.contexts_closed, log.contexts.len());
    assert_eq!(log.pages_closed, log.pages_opened);
}

#[tokio::test]
async fn failed_capture_is_recorded_and_the_sweep_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut broken = Demo::new("basics/broken");
    broken.fail_screenshot = true;
    let browser = FakeBrowser::new(
        demo_site()
            .demo(Demo::new("basics/first"))
            .demo(broken)
            .demo(Demo::new("basics/last")),
    );
    let mut opts = options(dir.path());
    opts.viewports = vec![ViewportConfig::desktop()];
    opts.capture_color_schemes = false;

    let (outcome, plugin) = run(&browser, opts).await;
    outcome.unwrap();

    let summary = plugin.summary();
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].demo, "basics/broken");
    assert_eq!(summary.failures[0].viewport, "desktop");
    assert_eq!(summary.failures[0].scheme, None);

    let files = list_files(dir.path());
    assert!(files.contains(&"basics/first-desktop-base.png".to_string()));
    assert!(files.contains(&"basics/last-desktop-full.png".to_string()));
    assert!(!files.iter().any(|f| f.starts_with("basics/broken")));
}

#[tokio::test]
async fn single_demo_writes_exactly_its_three_captures() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(
        demo_site()
            .demo(Demo::new("topology/neighborhood"))
            .demo(Demo::new("topology/torus")),
    );
    let mut opts = options(dir.path());
    opts.single_demo = Some("topology/neighborhood".to_string());
    opts.viewports = vec![ViewportConfig::mobile()];
    opts.capture_color_schemes = false;

    let (outcome, plugin) = run(&browser, opts).await;
    outcome.unwrap();

    assert_eq!(
        list_files(dir.path()),
        vec![
            "topology/neighborhood-mobile-base.png".to_string(),
            "topology/neighborhood-mobile-canvas.png".to_string(),
            "topology/neighborhood-mobile-full.png".to_string(),
        ]
    );
    assert_eq!(plugin.summary().contexts_opened, 1);
    assert_eq!(browser.log().visits_of(&url("/demos/#topology/torus")), 0);
}

#[tokio::test]
async fn demo_without_canvas_skips_the_canvas_capture() {
    let dir = tempfile::tempdir().unwrap();
    let mut plain = Demo::new("text/plain");
    plain.has_canvas = false;
    let browser = FakeBrowser::new(demo_site().demo(plain));
    let mut opts = options(dir.path());
    opts.viewports = vec![ViewportConfig::desktop()];
    opts.capture_color_schemes = false;

    let (outcome, _) = run(&browser, opts).await;
    outcome.unwrap();
    assert_eq!(
        list_files(dir.path()),
        vec![
            "text/plain-desktop-base.png".to_string(),
            "text/plain-desktop-full.png".to_string(),
        ]
    );
}

#[tokio::test]
async fn wrong_demo_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut misrouted = Demo::new("graphs/requested");
    misrouted.renders = "graphs/fallback".to_string();
    let browser = FakeBrowser::new(
        demo_site()
            .demo(misrouted)
            .demo(Demo::new("graphs/fallback")),
    );
    let mut opts = options(dir.path());
    opts.single_demo = Some("graphs/requested".to_string());
    opts.viewports = vec![ViewportConfig::desktop()];
    opts.capture_color_schemes = false;

    let (outcome, _) = run(&browser, opts).await;
    match outcome.unwrap_err() {
        CrawlError::DemoMismatch { expected, actual } => {
            assert_eq!(expected, "graphs/requested");
            assert_eq!(actual.as_deref(), Some("graphs/fallback"));
        }
        other => panic!("expected a demo mismatch, got {other:?}"),
    }
    assert!(list_files(dir.path()).is_empty());
    assert!(browser.log().screenshots.is_empty());
}

#[tokio::test]
async fn missing_demo_registry_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(FakeSite::new().page(DEMO_INDEX, SitePage::default()));
    let mut opts = options(dir.path());
    opts.viewports = vec![ViewportConfig::desktop()];
    opts.capture_color_schemes = false;

    let (outcome, plugin) = run(&browser, opts).await;
    let err = outcome.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(plugin.summary().files.is_empty());

    let log = browser.log();
    assert_eq!(log.contexts_closed, log.contexts.len());
    assert_eq!(log.pages_closed, log.pages_opened);
}

#[tokio::test]
async fn catalog_is_cached_from_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(demo_site().demo(Demo::new("basics/hello")));
    let mut opts = options(dir.path());
    opts.viewports = vec![ViewportConfig::desktop()];
    opts.capture_color_schemes = false;

    let (outcome, plugin) = run(&browser, opts).await;
    outcome.unwrap();

    let catalog = plugin.catalog().expect("catalog cached");
    assert_eq!(catalog.sweep_ids(), vec!["basics/hello".to_string()]);
    // capture reuses the catalog read during the crawl
    assert_eq!(browser.log().visits_of(&url(DEMO_INDEX)), 1);
}

#[tokio::test]
async fn partial_capture_keeps_written_files_in_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let mut flaky = Demo::new("fields/flux");
    flaky.fail_canvas = true;
    let browser = FakeBrowser::new(demo_site().demo(flaky).demo(Demo::new("fields/curl")));
    let mut opts = options(dir.path());
    opts.viewports = vec![ViewportConfig::desktop()];
    opts.capture_color_schemes = false;

    let (outcome, plugin) = run(&browser, opts).await;
    outcome.unwrap();

    let summary = plugin.summary();
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].demo, "fields/flux");

    let on_disk = list_files(dir.path());
    assert!(on_disk.contains(&"fields/flux-desktop-base.png".to_string()));
    let mut recorded: Vec<String> = summary
        .files
        .iter()
        .map(|path| {
            path.strip_prefix(dir.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    recorded.sort();
    assert_eq!(recorded, on_disk);
}

#[tokio::test]
async fn footer_title_fills_in_for_missing_metadata_title() {
    let mut titled = Demo::new("waves/standing");
    titled.footer_title = Some("  Standing Waves ".to_string());
    let browser = FakeBrowser::new(demo_site().demo(titled).demo(Demo::new("waves/plain")));
    let context = browser.new_context(ContextOptions::default()).await.unwrap();
    let page = context.new_page().await.unwrap();

    page.goto(
        &url("/demos/#waves/standing"),
        WaitUntil::DomContentLoaded,
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    let untitled = DemoInfo {
        id: "waves/standing".to_string(),
        title: None,
        category: None,
        index: 0,
    };
    assert_eq!(
        demo_title(page.as_ref(), Some(&untitled)).await.as_deref(),
        Some("Standing Waves")
    );
    assert_eq!(
        demo_title(page.as_ref(), None).await.as_deref(),
        Some("Standing Waves")
    );

    let named = DemoInfo {
        title: Some("From Metadata".to_string()),
        ..untitled
    };
    assert_eq!(
        demo_title(page.as_ref(), Some(&named)).await.as_deref(),
        Some("From Metadata")
    );

    page.goto(
        &url("/demos/#waves/plain"),
        WaitUntil::DomContentLoaded,
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    assert_eq!(demo_title(page.as_ref(), None).await, None);
}
