mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use commands::run_crawl;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let (args, matches) = cli::parse();
    setup_logging(args.verbose, args.quiet);
    let flags = settings::FlagSources::from_matches(&matches);
    run_crawl(args, &flags).await
}

/// Sets up the tracing subscriber; `RUST_LOG` wins over the flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("democrawl_lib=info,democrawl=info,warn"),
                1 => EnvFilter::new("democrawl_lib=debug,democrawl=debug,info"),
                2 => EnvFilter::new("democrawl_lib=trace,democrawl=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
