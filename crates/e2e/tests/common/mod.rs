//! Shared test support: a transport that replays scripted replies per route

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use converge_e2e::config::PollingConfig;
use converge_e2e::{ApiClient, E2eResult, Observation, Request, Transport};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

pub const BASE_URL: &str = "http://scripted.test/api/v2/";

#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::status(status)
            .header("Content-Type", "application/json")
            .body(body.to_string())
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn location(self, value: &str) -> Self {
        self.header("Location", value)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// One request as the transport saw it
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub follow_redirects: bool,
    pub headers: Vec<(String, String)>,
}

/// Replies are consumed in order per (method, path); the last reply of a
/// route repeats forever. Unknown routes answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, replies: Vec<Reply>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), replies.into());
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.seen()
            .iter()
            .filter(|s| s.method == method && s.path == path)
            .count()
    }

    fn next_reply(&self, method: &Method, path: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(method.clone(), path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Reply::status(404).body(format!("no script for {method} {path}")),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> E2eResult<Observation> {
        let url = Url::parse(&request.url).expect("client resolves absolute URLs");
        let path = url.path().to_string();

        self.seen.lock().unwrap().push(Seen {
            method: request.method.clone(),
            path: path.clone(),
            follow_redirects: request.follow_redirects,
            headers: request.headers.clone(),
        });

        let reply = self.next_reply(&request.method, &path);
        let mut headers = HeaderMap::new();
        for (name, value) in &reply.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        Ok(Observation::new(
            request.method,
            request.url,
            StatusCode::from_u16(reply.status).unwrap(),
            headers,
            reply.body,
        ))
    }
}

pub fn client(transport: &Arc<ScriptedTransport>) -> ApiClient {
    ApiClient::new(transport.clone(), BASE_URL).unwrap()
}

/// Short timeouts; tests run under a paused clock anyway
pub fn fast_polling() -> PollingConfig {
    PollingConfig {
        interval_secs: 1,
        default_timeout_secs: 10,
        project_timeout_secs: 10,
        model_job_timeout_secs: 10,
        deployment_timeout_secs: 10,
        balance_timeout_secs: 10,
        notification_timeout_secs: 10,
        metering_timeout_secs: 10,
        report_timeout_secs: 10,
    }
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
