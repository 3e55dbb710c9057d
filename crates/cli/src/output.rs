//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use converge_e2e::Observation;
use serde_json::{json, Value};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text and tables
    #[default]
    Plain,
    /// JSON format
    Json,
}

/// Rows for table output
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Strings print bare in plain mode; everything else as pretty JSON
pub fn print_value(value: &Value, format: OutputFormat) {
    match (format, value) {
        (OutputFormat::Plain, Value::String(s)) => println!("{s}"),
        _ => println!("{}", pretty(value)),
    }
}

/// Status line plus body. JSON mode wraps both in one document.
pub fn print_observation(obs: &Observation, format: OutputFormat) {
    let body = obs.json().ok().cloned();
    match format {
        OutputFormat::Json => {
            let doc = json!({
                "url": obs.url(),
                "status": obs.status_code(),
                "body": body.unwrap_or_else(|| Value::String(obs.text().into_owned())),
            });
            println!("{}", pretty(&doc));
        }
        OutputFormat::Plain => {
            let status = obs.status();
            let line = format!("{} {}", status.as_u16(), obs.url());
            if status.is_success() {
                println!("{}", line.green());
            } else {
                println!("{}", line.yellow());
            }
            match body {
                Some(value) => println!("{}", pretty(&value)),
                None => println!("{}", obs.text()),
            }
        }
    }
}

pub fn print_list<T: TableDisplay>(items: &[T], raw: &[Value], format: OutputFormat) {
    if format == OutputFormat::Json {
        println!("{}", pretty(&Value::Array(raw.to_vec())));
        return;
    }

    if items.is_empty() {
        println!("No items found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }

    println!("{table}");
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow(), message);
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
