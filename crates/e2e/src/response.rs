//! Read-only view over one HTTP exchange

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::{E2eError, E2eResult};
use crate::jsonpath::JsonPath;

/// Longest body excerpt carried into error messages and debug output
const BODY_EXCERPT_CHARS: usize = 512;

/// The result of one HTTP call. Immutable once created; the JSON body is
/// parsed on first use and cached.
pub struct Observation {
    method: Method,
    url: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    json: OnceCell<Value>,
}

impl Observation {
    pub fn new(
        method: Method,
        url: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            status,
            headers,
            body: body.into(),
            json: OnceCell::new(),
        }
    }

    /// Drain a reqwest response into an observation
    pub async fn from_response(method: Method, response: reqwest::Response) -> E2eResult<Self> {
        let url = response.url().to_string();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self::new(method, url, status, headers, body))
    }

    /// Builder-style header insertion, mostly for scripted transports
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Decoded body; invalid UTF-8 is replaced rather than rejected
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn content(&self) -> &[u8] {
        &self.body
    }

    pub fn json(&self) -> E2eResult<&Value> {
        self.json.get_or_try_init(|| {
            serde_json::from_slice(&self.body).map_err(|source| E2eError::MalformedResponse {
                url: self.url.clone(),
                source,
            })
        })
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> E2eResult<&str> {
        let value = self.headers.get(name).ok_or_else(|| E2eError::MissingHeader {
            name: name.to_string(),
            url: self.url.clone(),
        })?;
        value.to_str().map_err(|_| E2eError::InvalidHeader {
            name: name.to_string(),
            url: self.url.clone(),
        })
    }

    pub fn json_path_value(&self, path: &JsonPath) -> E2eResult<&Value> {
        path.first(self.json()?)
    }

    pub fn json_path_nth(&self, path: &JsonPath, n: usize) -> E2eResult<&Value> {
        path.nth(self.json()?, n)
    }

    pub fn json_path_values(&self, path: &JsonPath) -> E2eResult<Vec<&Value>> {
        Ok(path.matches(self.json()?))
    }

    pub fn json_path_f64(&self, path: &JsonPath) -> E2eResult<f64> {
        let value = self.json_path_value(path)?;
        value.as_f64().ok_or_else(|| E2eError::UnexpectedType {
            path: path.to_string(),
            expected: "a number",
            actual: value.clone(),
        })
    }

    pub fn json_path_bool(&self, path: &JsonPath) -> E2eResult<bool> {
        let value = self.json_path_value(path)?;
        value.as_bool().ok_or_else(|| E2eError::UnexpectedType {
            path: path.to_string(),
            expected: "a boolean",
            actual: value.clone(),
        })
    }

    pub fn json_path_str(&self, path: &JsonPath) -> E2eResult<&str> {
        let value = self.json_path_value(path)?;
        value.as_str().ok_or_else(|| E2eError::UnexpectedType {
            path: path.to_string(),
            expected: "a string",
            actual: value.clone(),
        })
    }

    /// Fail fast unless the status is exactly `expected`
    pub fn expect_status(&self, expected: u16) -> E2eResult<&Self> {
        if self.status_code() == expected {
            return Ok(self);
        }
        Err(E2eError::UnexpectedStatus {
            method: self.method.to_string(),
            url: self.url.clone(),
            expected,
            actual: self.status_code(),
            body: self.body_excerpt(),
        })
    }

    /// Leading part of the body, for messages
    pub fn body_excerpt(&self) -> String {
        let text = self.text();
        if text.chars().count() <= BODY_EXCERPT_CHARS {
            return text.into_owned();
        }
        let mut excerpt: String = text.chars().take(BODY_EXCERPT_CHARS).collect();
        excerpt.push_str("...");
        excerpt
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("status", &self.status.as_u16())
            .field("body", &self.body_excerpt())
            .finish()
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}: {}",
            self.method,
            self.url,
            self.status.as_u16(),
            self.body_excerpt()
        )
    }
}
