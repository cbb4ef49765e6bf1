//! Warden CLI Binary
//!
//! Command-line interface for the Warden governance runtime.

use anyhow::Context;
use clap::Parser;
use std::process;
use warden::logging::{init_logging, LoggingConfig};
use warden::tooling::cli::{Cli, CliContext};

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let config = CliContext::load_config(&cli.workspace, cli.config.as_deref())
        .with_context(|| format!("loading configuration for {}", cli.workspace.display()))?;

    // Subscriber first: descriptor loading reports skipped files through it
    let logging = logging_config(cli, &config.logging);
    init_logging(Some(&logging)).context("initializing logging")?;

    let context = CliContext::with_config(cli.workspace.clone(), config)
        .with_context(|| format!("initializing workspace {}", cli.workspace.display()))?;

    let output = context.execute(&cli.command)?;
    if !output.text.is_empty() {
        println!("{}", output.text);
    }
    if let Some(notice) = &output.notice {
        eprintln!("{}", notice);
    }
    Ok(output.exit_code)
}

/// Fold CLI logging flags over the configured logging section
fn logging_config(cli: &Cli, configured: &LoggingConfig) -> LoggingConfig {
    let mut logging = configured.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
        logging.output = "stderr".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if cli.log_file.is_some() {
        logging.file = cli.log_file.clone();
    }
    logging
}
