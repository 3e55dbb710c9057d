//! Get Command

use anyhow::{bail, Result};
use clap::Args;
use converge_e2e::{ApiClient, JsonPath};

use crate::output::{print_observation, print_value, OutputFormat};

#[derive(Args)]
pub struct GetArgs {
    /// Path relative to the API base URL, or an absolute URL
    pub path: String,

    /// Extract this JSON path from the response (e.g. `data.[0].id`)
    #[arg(long)]
    pub json_path: Option<JsonPath>,

    /// Take the Nth (zero based) match instead of the first
    #[arg(long, requires = "json_path")]
    pub nth: Option<usize>,
}

pub async fn execute(args: GetArgs, api: &ApiClient, format: OutputFormat) -> Result<()> {
    let obs = api.get(&args.path).await?;

    let Some(path) = args.json_path else {
        print_observation(&obs, format);
        if !obs.status().is_success() {
            bail!("GET {} answered {}", obs.url(), obs.status());
        }
        return Ok(());
    };

    obs.expect_status(200)?;
    let value = match args.nth {
        Some(n) => obs.json_path_nth(&path, n)?,
        None => obs.json_path_value(&path)?,
    };
    print_value(value, format);
    Ok(())
}
