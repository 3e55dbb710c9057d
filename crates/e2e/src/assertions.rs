//! Error-collecting assertions
//!
//! Each `check_*` helper compares an observed value against an expectation
//! and, on mismatch, appends exactly one message to an [`ErrorCollection`]
//! instead of failing. A test issues a group of checks and then calls
//! [`ErrorCollection::into_result`] (or [`ErrorCollection::assert_empty`])
//! once, so every mismatch in the group is reported together.
//!
//! Helpers that have to read JSON return `E2eResult<()>`: a missing path or
//! an unparseable body is a structural failure and propagates immediately
//! rather than being collected.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{warn, Span};

use crate::error::{E2eError, E2eResult};
use crate::jsonpath::JsonPath;
use crate::response::Observation;

/// Ordered, append-only list of assertion failures
#[derive(Debug)]
pub struct ErrorCollection {
    entries: Vec<String>,
    span: Span,
}

impl ErrorCollection {
    pub fn new() -> Self {
        Self::with_span(Span::current())
    }

    /// Collection whose failure events are recorded inside `span`
    pub fn with_span(span: Span) -> Self {
        Self {
            entries: Vec::new(),
            span,
        }
    }

    /// Append one failure, prefixed with `context` when it is non-empty
    pub fn record(&mut self, context: &str, message: impl fmt::Display) {
        let entry = if context.is_empty() {
            message.to_string()
        } else {
            format!("[{context}] {message}")
        };
        self.span.in_scope(|| warn!(failure = %entry, "assertion mismatch"));
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// All failures, one per line, in the order they were recorded
    pub fn report(&self) -> String {
        self.entries.join("\n")
    }

    pub fn into_result(self) -> E2eResult<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        Err(E2eError::AssertionsFailed {
            count: self.entries.len(),
            report: self.report(),
        })
    }

    /// Panic with every collected failure if any were recorded
    #[track_caller]
    pub fn assert_empty(&self) {
        if !self.entries.is_empty() {
            panic!(
                "{} assertion(s) failed:\n{}",
                self.entries.len(),
                self.report()
            );
        }
    }
}

impl Default for ErrorCollection {
    fn default() -> Self {
        Self::new()
    }
}

pub fn check_text_contains(actual: &str, expected: &str, errors: &mut ErrorCollection, context: &str) {
    if !actual.contains(expected) {
        errors.record(
            context,
            format!("expected text to contain {expected:?}, actual: {actual:?}"),
        );
    }
}

pub fn check_text_not_contains(
    actual: &str,
    unexpected: &str,
    errors: &mut ErrorCollection,
    context: &str,
) {
    if actual.contains(unexpected) {
        errors.record(
            context,
            format!("expected text not to contain {unexpected:?}, actual: {actual:?}"),
        );
    }
}

pub fn check_status_code(
    response: &Observation,
    expected: u16,
    errors: &mut ErrorCollection,
    context: &str,
) {
    let actual = response.status_code();
    if actual != expected {
        errors.record(
            context,
            format!(
                "expected status {expected}, actual: {actual} from {} {} (body: {})",
                response.method(),
                response.url(),
                response.body_excerpt()
            ),
        );
    }
}

/// Whole-body JSON equality; numbers compare by value (`1` equals `1.0`)
pub fn check_json_body(
    response: &Observation,
    expected: &Value,
    errors: &mut ErrorCollection,
    context: &str,
) -> E2eResult<()> {
    let actual = response.json()?;
    if !values_equal(actual, expected) {
        errors.record(
            context,
            format!("expected JSON body {expected}, actual: {actual}"),
        );
    }
    Ok(())
}

pub fn check_json_path_value(
    response: &Observation,
    path: &JsonPath,
    expected: &Value,
    errors: &mut ErrorCollection,
    context: &str,
) -> E2eResult<()> {
    let actual = response.json_path_value(path)?;
    if !values_equal(actual, expected) {
        errors.record(
            context,
            format!("expected `{path}` to be {expected}, actual: {actual}"),
        );
    }
    Ok(())
}

/// Type-strict boolean match: only a JSON `true`/`false` can satisfy it,
/// so `1`, `"true"` or `null` are mismatches
pub fn check_json_path_bool(
    response: &Observation,
    path: &JsonPath,
    expected: bool,
    errors: &mut ErrorCollection,
    context: &str,
) -> E2eResult<()> {
    let actual = response.json_path_value(path)?;
    check_bool_value(actual, expected, &path.to_string(), errors, context);
    Ok(())
}

/// Strict boolean comparison on an already extracted value
pub fn check_bool_value(
    actual: &Value,
    expected: bool,
    what: &str,
    errors: &mut ErrorCollection,
    context: &str,
) {
    if actual != &Value::Bool(expected) {
        errors.record(
            context,
            format!("expected `{what}` to be boolean {expected}, actual: {actual}"),
        );
    }
}

/// Accepts RFC 3339 timestamps, naive ISO date-times and plain dates
pub fn check_iso_date(value: &str, errors: &mut ErrorCollection, context: &str) {
    if parse_iso_date(value).is_none() {
        errors.record(
            context,
            format!("expected an ISO 8601 date, actual: {value:?}"),
        );
    }
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Granularity at which a timestamp is expected to match "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    Day,
    Hour,
    Minute,
}

impl TimePrecision {
    fn format(&self) -> &'static str {
        match self {
            TimePrecision::Day => "%Y-%m-%d",
            TimePrecision::Hour => "%Y-%m-%dT%H",
            TimePrecision::Minute => "%Y-%m-%dT%H:%M",
        }
    }

    fn unit(&self) -> ChronoDuration {
        match self {
            TimePrecision::Day => ChronoDuration::days(1),
            TimePrecision::Hour => ChronoDuration::hours(1),
            TimePrecision::Minute => ChronoDuration::minutes(1),
        }
    }
}

/// Check that `text` mentions the current UTC time at `precision`
pub fn check_current_utc_time_present(
    text: &str,
    precision: TimePrecision,
    errors: &mut ErrorCollection,
    context: &str,
) {
    check_utc_time_present_at(text, Utc::now(), precision, errors, context);
}

/// Same as [`check_current_utc_time_present`] with an explicit clock.
/// The preceding unit is accepted too, since the server may have stamped
/// the value just before a minute/hour/day boundary was crossed.
pub fn check_utc_time_present_at(
    text: &str,
    now: DateTime<Utc>,
    precision: TimePrecision,
    errors: &mut ErrorCollection,
    context: &str,
) {
    let current = now.format(precision.format()).to_string();
    let previous = (now - precision.unit()).format(precision.format()).to_string();
    if !text.contains(&current) && !text.contains(&previous) {
        errors.record(
            context,
            format!("expected current UTC time {current:?} in text, actual: {text:?}"),
        );
    }
}

/// The recurring "access limited" error body: a status marker, an error
/// code and a human message all present in the response text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLimited {
    pub status_code: u16,
    pub error_code: String,
    pub message: String,
}

impl AccessLimited {
    pub fn new(status_code: u16, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

pub fn check_access_limited(
    response_text: &str,
    expected: &AccessLimited,
    errors: &mut ErrorCollection,
    context: &str,
) {
    let status = expected.status_code.to_string();
    let missing: Vec<&str> = [
        status.as_str(),
        expected.error_code.as_str(),
        expected.message.as_str(),
    ]
    .into_iter()
    .filter(|marker| !response_text.contains(marker))
    .collect();

    if !missing.is_empty() {
        errors.record(
            context,
            format!(
                "expected access-limited response with {missing:?}, actual: {response_text:?}"
            ),
        );
    }
}

/// Structural JSON equality where numbers compare numerically: integers
/// exactly, and through `f64` only when either side is a float
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                return match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                };
            }
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x == y,
                // at least one side is beyond i64, so both must be the same u64
                _ => x.as_u64().is_some() && x.as_u64() == y.as_u64(),
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).map(|y| values_equal(x, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}
