//! Notifications Command

use anyhow::Result;
use clap::Args;
use converge_e2e::{JsonPath, PlatformClient};
use serde_json::Value;

use crate::output::{print_list, print_success, print_value, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct NotificationsArgs {
    /// Wait for a notification with this eventType and print it
    #[arg(long)]
    pub event_type: Option<String>,

    /// Wait until at least this many notifications exist
    #[arg(long)]
    pub at_least: Option<usize>,
}

/// One notification row
pub struct NotificationDisplay {
    pub id: String,
    pub event_type: String,
    pub created_at: String,
    pub read: String,
}

impl From<&Value> for NotificationDisplay {
    fn from(value: &Value) -> Self {
        let field = |name: &str| match value.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        };

        Self {
            id: field("id"),
            event_type: field("eventType"),
            created_at: field("createdAt"),
            read: field("isRead"),
        }
    }
}

impl TableDisplay for NotificationDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Event", "Created", "Read"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.event_type.clone(),
            self.created_at.clone(),
            self.read.clone(),
        ]
    }
}

pub async fn execute(args: NotificationsArgs, platform: &PlatformClient, format: OutputFormat) -> Result<()> {
    if let Some(min_count) = args.at_least {
        let count = platform.wait_for_notification_count(min_count).await?;
        if format == OutputFormat::Plain {
            print_success(&format!("{count} notification(s) present"));
        }
    }

    if let Some(event_type) = args.event_type {
        let notification = platform.wait_for_notification_event(&event_type).await?;
        print_value(&notification, format);
        return Ok(());
    }

    let listing = platform.notifications().await?;
    let all = JsonPath::parse("data")?.wildcard();
    let raw: Vec<Value> = listing.json_path_values(&all)?.into_iter().cloned().collect();
    let rows: Vec<NotificationDisplay> = raw.iter().map(NotificationDisplay::from).collect();
    print_list(&rows, &raw, format);
    Ok(())
}
