//! API client: a shared transport plus a base URL and default headers

use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;

use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::response::Observation;
use crate::transport::{Body, HttpTransport, Request, Transport};

/// Cheap to clone; clones share the same transport and connection pool
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    default_headers: Vec<(String, String)>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> E2eResult<Self> {
        Ok(Self {
            transport,
            base_url: parse_base(base_url)?,
            default_headers: Vec::new(),
        })
    }

    /// reqwest transport against the configured API host, authenticated
    /// with the configured token if there is one
    pub fn from_config(config: &HarnessConfig) -> E2eResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config.http)?);
        let client = Self::new(transport, &config.environment.api_url)?;
        Ok(match &config.auth.token {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    pub fn with_token(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL; absolute URLs pass through
    pub fn url(&self, path: &str) -> E2eResult<String> {
        resolve_url(&self.base_url, path)
    }

    pub async fn send(&self, mut request: Request) -> E2eResult<Observation> {
        request.url = self.url(&request.url)?;
        let mut headers = self.default_headers.clone();
        headers.append(&mut request.headers);
        request.headers = headers;
        self.transport.send(request).await
    }

    pub async fn get(&self, path: &str) -> E2eResult<Observation> {
        self.send(Request::get(path)).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> E2eResult<Observation> {
        let request = query
            .iter()
            .fold(Request::get(path), |req, (k, v)| req.query(*k, *v));
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> E2eResult<Observation> {
        self.send(Request::post(path).json(body)).await
    }

    pub async fn patch_json(&self, path: &str, body: Value) -> E2eResult<Observation> {
        self.send(Request::patch(path).json(body)).await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> E2eResult<Observation> {
        self.send(Request::put(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> E2eResult<Observation> {
        self.send(Request::delete(path)).await
    }

    pub async fn upload(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> E2eResult<Observation> {
        let body = Body::File {
            field: field.to_string(),
            file_name: file_name.to_string(),
            content,
        };
        self.send(Request::post(path).body(body)).await
    }
}

fn parse_base(raw: &str) -> E2eResult<Url> {
    // Without a trailing slash, `join` would replace the last path segment
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| E2eError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Join `reference` onto `base` the way a browser resolves a link
pub fn resolve_url(base: &Url, reference: &str) -> E2eResult<String> {
    base.join(reference)
        .map(String::from)
        .map_err(|e| E2eError::InvalidUrl {
            url: reference.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(
            Arc::new(HttpTransport::new(&Default::default()).unwrap()),
            "https://app.example.com/api/v2",
        )
        .unwrap()
    }

    #[test]
    fn resolves_relative_and_absolute_paths() {
        let c = client();
        assert_eq!(c.url("projects/").unwrap(), "https://app.example.com/api/v2/projects/");
        assert_eq!(c.url("/status/1").unwrap(), "https://app.example.com/status/1");
        assert_eq!(
            c.url("https://other.example.com/x").unwrap(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        let err = ApiClient::new(
            Arc::new(HttpTransport::new(&Default::default()).unwrap()),
            "not a url",
        )
        .err()
        .unwrap();
        assert!(matches!(err, E2eError::InvalidUrl { .. }));
    }
}
