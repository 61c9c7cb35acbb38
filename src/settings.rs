use std::path::{Path, PathBuf};

use clap::parser::ValueSource;
use clap::ArgMatches;
use democrawl_lib::crawler::normalize_url;
use democrawl_lib::{
    BrowserOptions, Config, CrawlError, CrawlerOptions, DemoScreenshotOptions, ViewportSelection,
};
use tracing::info;

use crate::cli::Cli;

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct FlagSources {
    pub output: bool,
    pub concurrency: bool,
    pub viewport: bool,
}

impl FlagSources {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            output: from_command_line(matches, "output"),
            concurrency: from_command_line(matches, "concurrency"),
            viewport: from_command_line(matches, "viewport"),
        }
    }
}

/// Whether `id` was set on the command line rather than by its default.
fn from_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Resolved settings after merging CLI args and config file.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub start_url: String,
    pub crawler: CrawlerOptions,
    pub browser: BrowserOptions,
    pub screenshots: Option<DemoScreenshotOptions>,
}

/// Merge CLI arguments with config file, preferring CLI when flags are present.
pub fn resolve_settings(
    cli: &Cli,
    config: &Config,
    flags: &FlagSources,
) -> Result<ResolvedSettings, CrawlError> {
    let start = normalize_url(&cli.url)?;
    let screenshots_enabled = cli.screenshots_enabled();

    let mut ignore_patterns = config.ignore_patterns.clone();
    ignore_patterns.extend(cli.ignore.iter().cloned());

    let mut concurrency = if flags.concurrency {
        cli.concurrency
    } else {
        config.concurrency
    };
    if concurrency == 0 {
        return Err(CrawlError::Config(
            "--concurrency must be at least 1".to_string(),
        ));
    }
    if screenshots_enabled && concurrency != 1 {
        info!(requested = concurrency, "screenshot capture forces concurrency to 1");
        concurrency = 1;
    }

    let headless = !cli.show_browser && config.headless;
    let timeouts = &config.timeouts;

    let crawler = CrawlerOptions {
        max_depth: cli.max_depth.or(config.max_depth),
        headless,
        concurrency,
        single_page: cli.single_page || config.single_page,
        ignore_patterns,
        cache_extensions: config.cache_extensions.clone(),
        show_probe: cli.show_probe,
        verbose: cli.verbose > 0,
        quiet: cli.quiet,
        navigation_timeout: timeouts.navigation,
        network_idle_timeout: timeouts.network_idle,
    };

    let browser = BrowserOptions {
        node_command: config.node_command.clone(),
        headless,
        launch_timeout: timeouts.launch,
        ..BrowserOptions::default()
    };

    let screenshots = screenshots_enabled.then(|| {
        let dir: PathBuf = if flags.output {
            cli.output.clone()
        } else {
            config.screenshots.dir.clone()
        };
        let viewports: ViewportSelection = if flags.viewport {
            cli.viewport
        } else {
            config.screenshots.viewports
        };
        let mut options = DemoScreenshotOptions::new(dir, start.clone());
        options.single_demo = cli.demo.clone();
        options.viewports = viewports.presets();
        options.capture_color_schemes = config.screenshots.color_schemes && !cli.no_color_schemes;
        options.navigation_timeout = timeouts.navigation;
        options.visibility_timeout = timeouts.element_visible;
        options.discovery_timeout = timeouts.discovery;
        options.settle_delay = timeouts.settle;
        options
    });

    Ok(ResolvedSettings {
        start_url: start.to_string(),
        crawler,
        browser,
        screenshots,
    })
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/democrawl/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, CrawlError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        CrawlError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        CrawlError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Format effective settings as a single-line string.
pub fn format_effective_config(settings: &ResolvedSettings, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let crawler = &settings.crawler;
    let max_depth = crawler
        .max_depth
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unlimited".to_string());
    let mut line = format!(
        "Effective config [{source}]: url={}, max_depth={}, single_page={}, headless={}, concurrency={}, ignore_patterns={}, timeouts: nav={:?}, network-idle={:?}",
        settings.start_url,
        max_depth,
        crawler.single_page,
        crawler.headless,
        crawler.concurrency,
        crawler.ignore_patterns.len(),
        crawler.navigation_timeout,
        crawler.network_idle_timeout,
    );
    if let Some(shots) = &settings.screenshots {
        let viewports: Vec<&str> = shots.viewports.iter().map(|v| v.name.as_str()).collect();
        line.push_str(&format!(
            ", screenshots: dir={}, viewports={}, color_schemes={}, demo={}, settle={:?}",
            shots.screenshot_dir.display(),
            viewports.join("+"),
            shots.capture_color_schemes,
            shots.single_demo.as_deref().unwrap_or("all"),
            shots.settle_delay,
        ));
    }
    line
}
