//! Resolve Command

use anyhow::Result;
use clap::Args;
use converge_e2e::config::{PollingConfig, WaitKind};
use converge_e2e::{ApiClient, RedirectResolver};

use crate::output::{print_observation, OutputFormat};

#[derive(Args)]
pub struct ResolveArgs {
    /// Status URL from a `202 Accepted` Location header
    pub status_url: String,
}

pub async fn execute(
    args: ResolveArgs,
    api: &ApiClient,
    polling: &PollingConfig,
    format: OutputFormat,
) -> Result<()> {
    let status_url = api.url(&args.status_url)?;
    let result = RedirectResolver::new(api, polling.policy(WaitKind::Default))
        .follow_status(&status_url)
        .await?;
    print_observation(&result, format);
    Ok(())
}
