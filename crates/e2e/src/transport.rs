//! HTTP transport seam
//!
//! Everything the harness observes goes through [`Transport::send`]. The
//! production implementation is [`HttpTransport`] (reqwest); tests plug in
//! scripted transports instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{E2eError, E2eResult};
use crate::response::Observation;

/// Request payload
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
    Form(Vec<(String, String)>),
    /// Single-file multipart upload
    File {
        field: String,
        file_name: String,
        content: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    pub follow_redirects: bool,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(self, body: Value) -> Self {
        self.body(Body::Json(body))
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Observe 3xx responses instead of following them
    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> E2eResult<Observation>;
}

/// reqwest-backed transport. Two pooled clients share one configuration and
/// differ only in redirect policy, since reqwest fixes that per client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    following: reqwest::Client,
    manual: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> E2eResult<Self> {
        Ok(Self {
            following: build_client(config, reqwest::redirect::Policy::limited(10))?,
            manual: build_client(config, reqwest::redirect::Policy::none())?,
        })
    }
}

fn build_client(
    config: &HttpConfig,
    redirect: reqwest::redirect::Policy,
) -> E2eResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .redirect(redirect)
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(secs) = config.request_timeout_secs {
        if secs > 0 {
            builder = builder.timeout(Duration::from_secs(secs));
        }
    }

    if config.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}

pub(crate) fn build_headers(input: &[(String, String)]) -> E2eResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| E2eError::InvalidRequest(format!("invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| E2eError::InvalidRequest(format!("invalid value for header `{key}`: {e}")))?;
        headers.append(name, value);
    }

    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> E2eResult<Observation> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.manual
        };

        let method = request.method.clone();
        let mut builder = client
            .request(method.clone(), &request.url)
            .headers(build_headers(&request.headers)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            None => builder,
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Text(text)) => builder.body(text),
            Some(Body::Bytes(bytes)) => builder.body(bytes),
            Some(Body::Form(pairs)) => builder.form(&pairs),
            Some(Body::File {
                field,
                file_name,
                content,
            }) => builder.multipart(Form::new().part(field, Part::bytes(content).file_name(file_name))),
        };

        let response = builder.send().await?;
        let observation = Observation::from_response(method, response).await?;

        debug!(
            method = %observation.method(),
            url = %observation.url(),
            status = observation.status_code(),
            "http exchange"
        );

        Ok(observation)
    }
}
