//! Converge CLI - Main Entry Point
//!
//! Operator front end over the E2E harness: fetch resources, resolve
//! asynchronous operations and wait for eventually consistent state from a
//! shell.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use converge_e2e::{logging, ApiClient, HarnessConfig, PlatformClient};
use tracing::debug;

mod commands;
mod output;

use commands::{balance, get, notifications, resolve};
use output::OutputFormat;

/// Converge - E2E harness for the ML platform API
#[derive(Parser)]
#[command(name = "converge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file (missing file means defaults)
    #[arg(long, default_value = "converge.toml", global = true)]
    config: PathBuf,

    /// API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "CONVERGE_API_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Pause between polls, in seconds
    #[arg(long, global = true)]
    interval_secs: Option<u64>,

    /// Timeout for every wait, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Output format
    #[arg(long, default_value = "plain", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a resource, optionally extracting a JSON path
    Get(get::GetArgs),

    /// Poll a status URL until it redirects, then fetch the result
    Resolve(resolve::ResolveArgs),

    /// Show or wait for the credit balance
    Balance(balance::BalanceArgs),

    /// Wait for and list user notifications
    Notifications(notifications::NotificationsArgs),
}

impl Cli {
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        config.apply_env_overrides()?;

        if let Some(url) = &self.api_url {
            config.environment.api_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.auth.token = Some(token.clone());
        }
        if let Some(secs) = self.interval_secs {
            config.polling.interval_secs = secs;
        }
        if let Some(secs) = self.timeout_secs {
            config.polling.set_all_timeouts(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    logging::init(log_level);

    let config = cli.harness_config()?;
    debug!(api_url = %config.environment.api_url, "harness configured");

    let api = ApiClient::from_config(&config)?;
    let platform = PlatformClient::new(api.clone(), config.polling.clone());

    match cli.command {
        Commands::Get(args) => get::execute(args, &api, cli.format).await?,
        Commands::Resolve(args) => resolve::execute(args, &api, &config.polling, cli.format).await?,
        Commands::Balance(args) => balance::execute(args, &platform, cli.format).await?,
        Commands::Notifications(args) => notifications::execute(args, &platform, cli.format).await?,
    }

    Ok(())
}
