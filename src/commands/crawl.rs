use std::process::ExitCode;
use std::sync::Arc;

use democrawl_lib::{
    Browser, CrawlError, CrawlOutput, CrawlReport, Crawler, DemoScreenshotPlugin,
    PlaywrightBrowser,
};
use tracing::{debug, error, info};

use crate::cli::Cli;
use crate::formatting::{exit_code_for_crawl, render_error, write_output};
use crate::settings::{format_effective_config, load_config, resolve_settings, FlagSources};

/// Run a crawl (and the screenshot sweep when requested).
pub async fn run_crawl(cli: Cli, flags: &FlagSources) -> ExitCode {
    let format = cli.format;
    let report = cli.report.clone();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, report),
    };
    let settings = match resolve_settings(&cli, &config, flags) {
        Ok(settings) => settings,
        Err(err) => return render_error(err, format, report),
    };
    debug!("{}", format_effective_config(&settings, cli.config.as_deref()));

    let browser = match PlaywrightBrowser::launch(settings.browser.clone()).await {
        Ok(browser) => Arc::new(browser),
        Err(err) => return render_error(err, format, report),
    };

    let outcome = crawl_with(browser.clone(), &settings).await;
    if let Err(err) = browser.close().await {
        debug!(%err, "browser did not shut down cleanly");
    }

    let output = match outcome {
        Ok(output) => output,
        Err(err) => return render_error(err, format, report),
    };
    let passed = output.passed;
    if let Err(err) = write_output(&CrawlReport::Crawl(output), format, report.clone()) {
        error!(%err, "failed to write report");
        return render_error(CrawlError::Unknown(err.to_string()), format, None);
    }
    exit_code_for_crawl(passed)
}

async fn crawl_with(
    browser: Arc<PlaywrightBrowser>,
    settings: &crate::settings::ResolvedSettings,
) -> Result<CrawlOutput, CrawlError> {
    let mut crawler = Crawler::new(browser, settings.crawler.clone())?;

    let screenshots = settings
        .screenshots
        .clone()
        .map(|options| Arc::new(DemoScreenshotPlugin::new(options)));
    if let Some(plugin) = &screenshots {
        crawler.register_plugin(plugin.clone());
    }

    let results = crawler.crawl(&settings.start_url).await?;
    if results.errored() {
        error!(pages = results.len(), "crawl failed");
    } else {
        info!(pages = results.len(), "crawl passed");
    }

    Ok(CrawlOutput::from_results(
        settings.start_url.clone(),
        &results,
        settings.crawler.cache_extensions.clone(),
        screenshots.map(|plugin| plugin.summary()),
    ))
}
