//! Balance Command

use anyhow::Result;
use clap::Args;
use converge_e2e::{OnTimeout, PlatformClient, PollOutcome};
use serde_json::json;

use crate::output::{print_success, print_value, print_warning, OutputFormat};

#[derive(Args)]
pub struct BalanceArgs {
    /// Wait until the balance equals this value
    #[arg(long, conflicts_with_all = ["min", "max"])]
    pub equals: Option<f64>,

    /// Wait until the balance is at least this value (needs --max)
    #[arg(long, requires = "max")]
    pub min: Option<f64>,

    /// Wait until the balance is below this value (needs --min)
    #[arg(long, requires = "min")]
    pub max: Option<f64>,

    /// Print the last balance on timeout instead of failing
    #[arg(long)]
    pub tolerate_timeout: bool,
}

pub async fn execute(args: BalanceArgs, platform: &PlatformClient, format: OutputFormat) -> Result<()> {
    let on_timeout = if args.tolerate_timeout {
        OnTimeout::ReturnLast
    } else {
        OnTimeout::Raise
    };

    let outcome = match (args.equals, args.min, args.max) {
        (Some(expected), _, _) => platform.wait_for_balance(expected, on_timeout).await?,
        (None, Some(min), Some(max)) => {
            platform.wait_for_balance_range(min, max, on_timeout).await?
        }
        _ => {
            let balance = platform.credit_balance().await?;
            print_value(&json!(balance), format);
            return Ok(());
        }
    };

    match format {
        OutputFormat::Json => print_value(
            &json!({
                "balance": outcome.value(),
                "satisfied": outcome.is_satisfied(),
                "attempts": outcome.attempts(),
                "elapsed_ms": outcome.elapsed().as_millis() as u64,
            }),
            format,
        ),
        OutputFormat::Plain => match &outcome {
            PollOutcome::Satisfied { value, attempts, .. } => {
                print_success(&format!("balance {value} after {attempts} poll(s)"))
            }
            PollOutcome::TimedOut { last, attempts, .. } => {
                print_warning(&format!("timed out after {attempts} poll(s); last balance {last}"))
            }
        },
    }
    Ok(())
}
