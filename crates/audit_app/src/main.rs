mod app;
mod cli;
mod persistence;
mod render;

use std::path::PathBuf;

use audit_logging::{audit_error, LogDestination, DEFAULT_LOG_FILE};
use clap::Parser;
use log::LevelFilter;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    let destination = if cli.verbose {
        LogDestination::Both(log_path)
    } else {
        LogDestination::File(log_path)
    };
    audit_logging::initialize(destination, level);

    if let Err(err) = run(cli) {
        audit_error!("command failed: {err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(app::run(cli))
}
