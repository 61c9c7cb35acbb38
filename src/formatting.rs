use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use democrawl_lib::{CrawlError, CrawlReport, ErrorOutput, OUTPUT_VERSION};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &CrawlReport,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the failing exit code.
pub fn render_error(err: CrawlError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let error_payload = err.to_payload();
    let payload = CrawlReport::Error(ErrorOutput {
        version: OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    ExitCode::from(1)
}

/// Write JSON output to file or stdout.
fn write_json_output(
    body: &CrawlReport,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &CrawlReport, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &CrawlReport, colorize: bool) -> String {
    match body {
        CrawlReport::Crawl(out) => {
            let mut buf = String::new();
            let status = if out.passed { "PASS" } else { "FAIL" };
            let status_colored = color(status, if out.passed { "32" } else { "31" }, colorize);
            writeln!(buf, "{} Crawl of {}", status_colored, out.start_url).ok();
            writeln!(buf, "Pages visited: {}", out.pages_visited).ok();

            if let Some(abort) = &out.abort {
                writeln!(
                    buf,
                    "Aborted at {}: [{:?}] {}",
                    abort.url, abort.error.kind, abort.error.message
                )
                .ok();
            }

            let failed_requests: usize = out.pages.iter().map(|p| p.failed_requests.len()).sum();
            let warnings: usize = out.pages.iter().map(|p| p.console_warnings).sum();
            if failed_requests > 0 || warnings > 0 {
                writeln!(
                    buf,
                    "Diagnostics: {} failed request(s), {} console warning(s)",
                    failed_requests, warnings
                )
                .ok();
            }

            if let Some(shots) = &out.screenshots {
                writeln!(
                    buf,
                    "Screenshots: {} file(s) in {} context(s)",
                    shots.files.len(),
                    shots.contexts_opened
                )
                .ok();
                if !shots.failures.is_empty() {
                    let header = color("Capture failures:", "33", colorize);
                    writeln!(buf, "{header}").ok();
                    for failure in &shots.failures {
                        let scheme = failure
                            .scheme
                            .as_deref()
                            .map(|s| format!("/{s}"))
                            .unwrap_or_default();
                        writeln!(
                            buf,
                            "- {} ({}{}): {}",
                            failure.demo, failure.viewport, scheme, failure.message
                        )
                        .ok();
                    }
                }
            }
            buf
        }
        CrawlReport::Error(out) => {
            let mut buf = String::new();
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
            buf
        }
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

/// Determine exit code for a finished crawl.
pub fn exit_code_for_crawl(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
