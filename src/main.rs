use std::process;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use pelican_whmcs::cli::{execute, Cli};
use pelican_whmcs::config::{expand_path, load_config};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; stdout carries the result only
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns whether the command succeeded
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    // Load .env file if specified
    if let Some(ref env_file) = cli.env_file {
        let path = expand_path(&env_file.to_string_lossy())?;
        dotenvy::from_path(&path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
    }

    let config_path = match cli.config {
        Some(ref path) => Some(expand_path(&path.to_string_lossy())?),
        None => None,
    };
    let config = load_config(config_path.as_deref()).context("Failed to load config")?;
    debug!(?config, "Loaded module config");

    let output = execute(&cli.command, &config).await?;
    println!("{}", output.text);
    Ok(output.success)
}
