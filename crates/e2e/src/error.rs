//! Error types for the polling and assertion harness

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Malformed JSON response from {url}: {source}")]
    MalformedResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Header `{name}` missing from response of {url}")]
    MissingHeader { name: String, url: String },

    #[error("Header `{name}` in response of {url} is not valid text")]
    InvalidHeader { name: String, url: String },

    #[error("Path `{path}` not found in document: {document}")]
    PathNotFound {
        path: String,
        document: serde_json::Value,
    },

    #[error("Invalid JSON path `{path}`: {reason}")]
    PathSyntax { path: String, reason: String },

    #[error("Value at `{path}` is not {expected}: {actual}")]
    UnexpectedType {
        path: String,
        expected: &'static str,
        actual: serde_json::Value,
    },

    #[error("Unexpected {what}: expected {expected}, got {actual}")]
    UnexpectedValue {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Timed out after {elapsed:?} waiting for {expected}; last observed: {last_observed}")]
    PollTimeout {
        expected: String,
        last_observed: String,
        elapsed: Duration,
    },

    #[error("{method} {url} returned {actual}, expected {expected}. Body: {body}")]
    UnexpectedStatus {
        method: String,
        url: String,
        expected: u16,
        actual: u16,
        body: String,
    },

    #[error("{count} assertion(s) failed:\n{report}")]
    AssertionsFailed { count: usize, report: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether this error is a poll deadline expiring rather than a structural failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::PollTimeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
