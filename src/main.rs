//! itermctl CLI entry point.

use clap::Parser;
use itermctl::cli::Cli;
use itermctl::dispatch::{self, Context};
use itermctl::error::Result;
use itermctl::iterm::ITermClient;
use itermctl::loader;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "itermctl=warn";

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Logs go to stderr so stdout stays clean for `--json`. `RUST_LOG` overrides
/// the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => loader::default_config_path()?,
    };
    let config = loader::load_or_default(&config_path)?;
    let client = ITermClient::new(Duration::from_secs(config.settings.timeout_secs));

    let ctx = Context::new(&client, &config, config_path, &cli);
    dispatch::dispatch(&ctx, cli.command)
}
