use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use std::ffi::OsString;
use democrawl_lib::ViewportSelection;
use std::path::PathBuf;

pub const DEFAULT_START_URL: &str = "http://localhost:5000/";

#[derive(Parser, Debug)]
#[command(name = "democrawl")]
#[command(
    version,
    about = "Crawl a demo site in a headless browser and fail on the first page error",
    long_about = "democrawl\n\nVisits every same-origin page reachable from --url and exits non-zero as soon as any page throws an uncaught exception, logs an un-ignored console error, or fails to load.\n\nWith --screenshots (or --demo) every registered demo is then captured across viewports and color schemes into --output."
)]
pub struct Cli {
    #[arg(short, long, default_value = DEFAULT_START_URL, help = "Start URL")]
    pub url: String,

    #[arg(
        short,
        long,
        value_name = "DIR",
        default_value = "screenshots",
        help = "Screenshot output directory"
    )]
    pub output: PathBuf,

    #[arg(long, help = "Run the browser with a visible window")]
    pub show_browser: bool,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    #[arg(short, long, conflicts_with = "verbose", help = "Only log errors")]
    pub quiet: bool,

    #[arg(
        short,
        long,
        default_value = "1",
        help = "Pages processed in parallel (forced to 1 when capturing screenshots)"
    )]
    pub concurrency: usize,

    #[arg(
        short,
        long,
        value_name = "ID",
        help = "Capture a single demo by registry key, e.g. physics/electric-field (implies --screenshots)"
    )]
    pub demo: Option<String>,

    #[arg(
        long,
        visible_alias = "vp",
        default_value = "both",
        help = "Viewports to capture: desktop, mobile or both (also -vp)"
    )]
    pub viewport: ViewportSelection,

    #[arg(long, help = "Capture demo screenshots after the crawl")]
    pub screenshots: bool,

    #[arg(long, help = "Capture a single light pass without scheme names in file names")]
    pub no_color_schemes: bool,

    #[arg(long, value_name = "N", help = "Deepest link level to visit (start URL is 0)")]
    pub max_depth: Option<usize>,

    #[arg(long, help = "Visit only the start URL")]
    pub single_page: bool,

    #[arg(
        long = "ignore",
        value_name = "REGEX",
        action = ArgAction::Append,
        help = "Console error pattern to ignore (repeatable)"
    )]
    pub ignore: Vec<String>,

    #[arg(long, help = "Log all console output from pages at info level")]
    pub show_probe: bool,

    #[arg(
        long,
        value_name = "PATH",
        help = "Config file (TOML); defaults to ~/.config/democrawl/config.toml; CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "pretty", help = "Report format")]
    pub format: OutputFormat,

    #[arg(long, value_name = "PATH", help = "Write the report to a file instead of stdout")]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn screenshots_enabled(&self) -> bool {
        self.screenshots || self.demo.is_some()
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

/// Rewrites the single-dash `-vp` spelling to `--viewport`; clap would
/// otherwise read it as `-v -p`.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some("-vp") => OsString::from("--viewport"),
            Some(s) if s.starts_with("-vp=") => OsString::from(format!("--viewport={}", &s[4..])),
            _ => arg,
        })
        .collect()
}

/// Parses `args`, keeping the matches so callers can tell which values came
/// from the command line.
pub fn try_parse_from<I, T>(args: I) -> Result<(Cli, ArgMatches), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let matches = Cli::command().try_get_matches_from(normalize_args(args))?;
    let cli = Cli::from_arg_matches(&matches)?;
    Ok((cli, matches))
}

pub fn parse() -> (Cli, ArgMatches) {
    try_parse_from(std::env::args_os()).unwrap_or_else(|err| err.exit())
}
