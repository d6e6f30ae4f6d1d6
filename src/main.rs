//! Sumi-Render main entry point
//!
//! A thin command-line front end that renders one URL through a WebDriver hub
//! and writes the captured DOM to stdout.

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use sumi_render::config::{load_properties, FetchConfig, Properties};
use sumi_render::fetch_with_cancel;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit code when no DOM was captured
const EXIT_NO_CAPTURE: i32 = 2;

/// Sumi-Render: fetch a page the way a browser renders it
///
/// The page is loaded in a remote browser, given time for its scripts to
/// run, and its rendered markup is printed to stdout. Status, final URL and
/// headers go to stderr.
#[derive(Parser, Debug)]
#[command(name = "sumi-render")]
#[command(version = "1.0.0")]
#[command(about = "Render a page through a WebDriver hub", long_about = None)]
struct Cli {
    /// URL to fetch
    #[arg(value_name = "URL")]
    url: String,

    /// Overall per-call timeout in milliseconds (0 or less: no deadline)
    #[arg(short, long, default_value_t = 10_000, allow_negative_numbers = true)]
    timeout: i64,

    /// Path to a TOML file of fetch options
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Set a single option, e.g. --set render.min.ms=500 (repeatable)
    #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli).context("Invalid fetch configuration")?;
    tracing::debug!("Resolved configuration: {:?}", config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling fetch");
            on_interrupt.cancel();
        }
    });

    let response = fetch_with_cancel(&cli.url, cli.timeout, &config, &cancel)
        .await
        .with_context(|| format!("Cannot fetch {}", cli.url))?;

    eprintln!("Status: {}", response.status_code());
    eprintln!("Outcome: {}", response.outcome());
    eprintln!("Final URL: {}", response.final_url());
    for (name, value) in response.headers() {
        eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }

    if !response.is_captured() {
        std::process::exit(EXIT_NO_CAPTURE);
    }

    write_body(&response.into_body()).context("Failed to write body to stdout")?;

    Ok(())
}

fn write_body(body: &[u8]) -> sumi_render::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(body)?;
    stdout.flush()?;
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_render=info,warn"),
            1 => EnvFilter::new("sumi_render=debug,info"),
            2 => EnvFilter::new("sumi_render=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Merges the config file with `--set` overrides and resolves the result
fn resolve_config(cli: &Cli) -> sumi_render::Result<FetchConfig> {
    let mut props = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_properties(path)?
        }
        None => Properties::new(),
    };

    for (key, value) in &cli.set {
        props.insert(key.clone(), value.clone());
    }

    Ok(FetchConfig::from_properties(&props)?)
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    Ok((key.to_string(), value.trim().to_string()))
}
