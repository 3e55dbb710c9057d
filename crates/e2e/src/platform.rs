//! Platform waits
//!
//! Domain-level helpers over [`ApiClient`]. Each wait is a configuration of
//! the generic poller: an observation, a [`Condition`] and a timeout taken
//! from [`PollingConfig`].

use serde_json::{json, Value};
use tracing::{info, warn, Span};

use crate::client::ApiClient;
use crate::condition::Condition;
use crate::config::{PollingConfig, WaitKind};
use crate::error::{E2eError, E2eResult};
use crate::jsonpath::JsonPath;
use crate::poll::{OnTimeout, PollOutcome, Poller};
use crate::redirect::RedirectResolver;
use crate::response::Observation;
use crate::transport::{Body, Request};

/// API paths, relative to the configured API base URL
pub mod endpoints {
    pub const CREDIT_BALANCE: &str = "credits/balance/";
    pub const CREDIT_USAGE_SUMMARY: &str = "credits/usageSummary/";
    pub const METERING_ACTIVITY: &str = "metering/activity/";
    pub const NOTIFICATIONS: &str = "userNotifications/";
    pub const PROJECTS: &str = "projects/";
    pub const DATASET_UPLOAD: &str = "datasets/fromFile/";

    pub fn project_status(project_id: &str) -> String {
        format!("projects/{project_id}/status/")
    }

    pub fn model_jobs(project_id: &str) -> String {
        format!("projects/{project_id}/modelJobs/")
    }

    pub fn models(project_id: &str) -> String {
        format!("projects/{project_id}/models/")
    }

    pub fn ai_reports(project_id: &str) -> String {
        format!("projects/{project_id}/aiReports/")
    }

    pub fn deployment(deployment_id: &str) -> String {
        format!("deployments/{deployment_id}/")
    }

    pub fn deployment_status(deployment_id: &str) -> String {
        format!("deployments/{deployment_id}/status/")
    }

    pub fn deployment_predictions(deployment_id: &str) -> String {
        format!("deployments/{deployment_id}/predictions/")
    }
}

/// JSON paths into the platform's resources
pub mod paths {
    pub const BALANCE: &str = "balance";
    pub const AUTOPILOT_DONE: &str = "autopilotDone";
    pub const NOTIFICATIONS: &str = "data";
    pub const EVENT_TYPE: &str = "eventType";
    pub const DEPLOYMENT_STATUS: &str = "status";
}

/// How a deployment was judged inactive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inactivity {
    /// A prediction request was refused with 403
    Confirmed,
    /// No 403 arrived before the deadline; the deployment is presumed
    /// inactive anyway
    Assumed,
}

#[derive(Clone)]
pub struct PlatformClient {
    api: ApiClient,
    polling: PollingConfig,
    span: Span,
}

impl PlatformClient {
    pub fn new(api: ApiClient, polling: PollingConfig) -> Self {
        Self {
            api,
            polling,
            span: Span::current(),
        }
    }

    /// Route poll logging into `span` (usually a test context's span)
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn poller(&self, kind: WaitKind) -> Poller {
        Poller::with_span(self.polling.policy(kind), self.span.clone())
    }

    fn resolver(&self, kind: WaitKind) -> RedirectResolver<'_> {
        RedirectResolver::with_poller(&self.api, self.poller(kind))
    }

    // Reads

    /// GET that must answer 200; anything else aborts the caller
    async fn get_ok(&self, url: &str) -> E2eResult<Observation> {
        let obs = self.api.get(url).await?;
        obs.expect_status(200)?;
        Ok(obs)
    }

    /// The value at `path` in a 200 response from `url`
    async fn json_at(&self, url: &str, path: &JsonPath) -> E2eResult<Value> {
        let obs = self.get_ok(url).await?;
        obs.json_path_value(path).cloned()
    }

    pub async fn credit_balance(&self) -> E2eResult<f64> {
        let obs = self.get_ok(endpoints::CREDIT_BALANCE).await?;
        obs.json_path_f64(&JsonPath::parse(paths::BALANCE)?)
    }

    pub async fn notifications(&self) -> E2eResult<Observation> {
        self.get_ok(endpoints::NOTIFICATIONS).await
    }

    /// The `k`th (zero based) notification whose `eventType` is `event_type`
    pub async fn notification_of_type(&self, event_type: &str, k: usize) -> E2eResult<Value> {
        let obs = self.notifications().await?;
        let path = JsonPath::parse(paths::NOTIFICATIONS)?.filter(paths::EVENT_TYPE, event_type);
        obs.json_path_nth(&path, k).cloned()
    }

    // Asynchronous operations (202 -> 303)

    pub async fn create_project(&self, body: Value) -> E2eResult<Observation> {
        self.resolver(WaitKind::Project)
            .start(Request::post(endpoints::PROJECTS).json(body))
            .await
    }

    pub async fn train_model(&self, project_id: &str, body: Value) -> E2eResult<Observation> {
        self.resolver(WaitKind::ModelJob)
            .start(Request::post(endpoints::models(project_id)).json(body))
            .await
    }

    pub async fn upload_dataset(&self, file_name: &str, content: Vec<u8>) -> E2eResult<Observation> {
        let body = Body::File {
            field: "file".to_string(),
            file_name: file_name.to_string(),
            content,
        };
        self.resolver(WaitKind::Project)
            .start(Request::post(endpoints::DATASET_UPLOAD).body(body))
            .await
    }

    pub async fn change_deployment_status(&self, deployment_id: &str, status: &str) -> E2eResult<Observation> {
        self.resolver(WaitKind::Deployment)
            .start(Request::patch(endpoints::deployment_status(deployment_id)).json(json!({ "status": status })))
            .await
    }

    /// Activate and check once that the resolved deployment reports `active`.
    /// Reaching 303 is taken to mean the status is already consistent, so
    /// this check is not retried.
    pub async fn activate_deployment(&self, deployment_id: &str) -> E2eResult<Observation> {
        let deployment = self.change_deployment_status(deployment_id, "active").await?;
        let status = deployment.json_path_str(&JsonPath::parse(paths::DEPLOYMENT_STATUS)?)?;
        if status != "active" {
            return Err(E2eError::UnexpectedValue {
                what: format!("status of deployment {deployment_id}"),
                expected: "active".to_string(),
                actual: status.to_string(),
            });
        }
        Ok(deployment)
    }

    pub async fn generate_report(&self, project_id: &str) -> E2eResult<Observation> {
        self.resolver(WaitKind::Report)
            .start(Request::post(endpoints::ai_reports(project_id)).json(json!({})))
            .await
    }

    /// Raw bytes of a generated report file
    pub async fn download_report(&self, url: &str) -> E2eResult<Vec<u8>> {
        let obs = self.api.get(url).await?;
        obs.expect_status(200)?;
        Ok(obs.content().to_vec())
    }

    // Waits

    pub async fn wait_for_balance(&self, expected: f64, on_timeout: OnTimeout) -> E2eResult<PollOutcome<f64>> {
        self.wait_for_balance_matching(Condition::equal_to(expected), on_timeout)
            .await
    }

    pub async fn wait_for_balance_range(
        &self,
        min_balance: f64,
        max_balance: f64,
        on_timeout: OnTimeout,
    ) -> E2eResult<PollOutcome<f64>> {
        self.wait_for_balance_matching(Condition::in_range(min_balance, max_balance), on_timeout)
            .await
    }

    async fn wait_for_balance_matching(
        &self,
        condition: Condition<f64>,
        on_timeout: OnTimeout,
    ) -> E2eResult<PollOutcome<f64>> {
        let poller = self.poller(WaitKind::Balance);
        let poller = poller.with_policy(poller.policy().with_on_timeout(on_timeout));
        poller.until(&condition, || self.credit_balance()).await
    }

    pub async fn wait_for_autopilot_done(&self, project_id: &str) -> E2eResult<()> {
        let path = JsonPath::parse(paths::AUTOPILOT_DONE)?;
        let url = endpoints::project_status(project_id);
        let condition = Condition::json_equals(Value::Bool(true)).described_as(format!("`{path}` == true"));
        self.poller(WaitKind::ModelJob)
            .until(&condition, || self.json_at(&url, &path))
            .await?;
        Ok(())
    }

    /// Wait until `model_name` no longer appears in the project's job queue
    pub async fn wait_for_model_job_cleared(&self, project_id: &str, model_name: &str) -> E2eResult<Observation> {
        let url = endpoints::model_jobs(project_id);
        self.poller(WaitKind::ModelJob)
            .until(&Condition::body_lacks(model_name), || self.get_ok(&url))
            .await
            .map(PollOutcome::into_value)
    }

    pub async fn wait_for_metering_keyword(&self, keyword: &str) -> E2eResult<Observation> {
        self.poller(WaitKind::Metering)
            .until(&Condition::body_contains(keyword), || {
                self.get_ok(endpoints::METERING_ACTIVITY)
            })
            .await
            .map(PollOutcome::into_value)
    }

    pub async fn wait_for_usage_keyword(&self, keyword: &str) -> E2eResult<Observation> {
        self.poller(WaitKind::Metering)
            .until(&Condition::body_contains(keyword), || {
                self.get_ok(endpoints::CREDIT_USAGE_SUMMARY)
            })
            .await
            .map(PollOutcome::into_value)
    }

    /// Wait until at least `min_count` notifications are listed; returns the count
    pub async fn wait_for_notification_count(&self, min_count: usize) -> E2eResult<usize> {
        let path = &JsonPath::parse(paths::NOTIFICATIONS)?;
        self.poller(WaitKind::Notification)
            .until(&Condition::at_least(min_count), || async move {
                let obs = self.notifications().await?;
                let listing = obs.json_path_value(path)?;
                let count = listing
                    .as_array()
                    .ok_or_else(|| E2eError::UnexpectedType {
                        path: path.to_string(),
                        expected: "an array",
                        actual: listing.clone(),
                    })?
                    .len();
                Ok(count)
            })
            .await
            .map(PollOutcome::into_value)
    }

    /// Wait for a notification of `event_type`; returns the first one
    pub async fn wait_for_notification_event(&self, event_type: &str) -> E2eResult<Value> {
        let listing = &JsonPath::parse(paths::NOTIFICATIONS)?;
        let matching = &listing.clone().filter(paths::EVENT_TYPE, event_type);
        let condition = Condition::<Option<Value>>::new(
            format!("a notification with eventType {event_type:?}"),
            Option::is_some,
        );
        let found = self
            .poller(WaitKind::Notification)
            .until(&condition, || async move {
                let obs = self.notifications().await?;
                // the listing itself must exist; only the matching entry may be absent
                obs.json_path_value(listing)?;
                let first = obs.json_path_values(matching)?.first().map(|v| (*v).clone());
                Ok(first)
            })
            .await?
            .into_value();
        found.ok_or_else(|| E2eError::PathNotFound {
            path: matching.to_string(),
            document: Value::Null,
        })
    }

    pub async fn wait_for_deployment_active(&self, deployment_id: &str) -> E2eResult<()> {
        let path = JsonPath::parse(paths::DEPLOYMENT_STATUS)?;
        let url = endpoints::deployment(deployment_id);
        let condition = Condition::json_equals(json!("active")).described_as(format!("`{path}` == \"active\""));
        self.poller(WaitKind::Deployment)
            .until(&condition, || self.json_at(&url, &path))
            .await?;
        Ok(())
    }

    /// Probe predictions until they are refused with 403.
    ///
    /// A timeout is accepted as "probably inactive": the outcome says which
    /// of the two happened, and callers that need certainty must check for
    /// `Inactivity::Confirmed` themselves.
    pub async fn wait_for_deployment_inactive(
        &self,
        deployment_id: &str,
        probe_body: Value,
    ) -> E2eResult<Inactivity> {
        let url = endpoints::deployment_predictions(deployment_id);
        let poller = self.poller(WaitKind::Deployment);
        let poller = poller.with_policy(poller.policy().returning_last());

        let outcome = poller
            .until(&Condition::status_is(403), || {
                self.api.send(Request::post(url.clone()).json(probe_body.clone()))
            })
            .await?;

        let inactivity = if outcome.is_satisfied() {
            Inactivity::Confirmed
        } else {
            Inactivity::Assumed
        };
        self.span.in_scope(|| match inactivity {
            Inactivity::Confirmed => info!(deployment_id, "deployment refused predictions"),
            Inactivity::Assumed => warn!(
                deployment_id,
                last_status = outcome.value().status_code(),
                "no 403 before the deadline; assuming deployment is inactive"
            ),
        });
        Ok(inactivity)
    }
}
