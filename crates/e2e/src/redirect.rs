//! Redirect-chain resolver for the 202 → poll → 303 → GET pattern
//!
//! 1. The triggering request must answer `202 Accepted` with a `Location`
//!    pointing at a status resource. Anything else fails at once.
//! 2. The status resource is polled with redirects disabled until it
//!    answers `303 See Other`.
//! 3. The 303's `Location` is fetched once and returned.
//!
//! A timeout in step 2 always raises, whatever the policy says, and names
//! the status URL being polled.

use reqwest::header::LOCATION;
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use crate::client::{resolve_url, ApiClient};
use crate::condition::Condition;
use crate::error::{E2eError, E2eResult};
use crate::poll::{PollPolicy, Poller};
use crate::response::Observation;
use crate::transport::Request;

pub struct RedirectResolver<'a> {
    client: &'a ApiClient,
    poller: Poller,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(client: &'a ApiClient, policy: PollPolicy) -> Self {
        Self::with_poller(client, Poller::new(policy))
    }

    /// Use an existing poller, e.g. one bound to a test's logging span
    pub fn with_poller(client: &'a ApiClient, poller: Poller) -> Self {
        let policy = poller.policy().raising();
        Self {
            client,
            poller: poller.with_policy(policy),
        }
    }

    /// Send the triggering request and resolve the chain it starts
    pub async fn start(&self, request: Request) -> E2eResult<Observation> {
        let accepted = self.client.send(request).await?;
        self.resolve(&accepted).await
    }

    /// Resolve a chain from an already received `202 Accepted`
    pub async fn resolve(&self, accepted: &Observation) -> E2eResult<Observation> {
        accepted.expect_status(StatusCode::ACCEPTED.as_u16())?;
        let status_url = join_location(accepted.url(), accepted.header(LOCATION.as_str())?)?;
        debug!(status_url = %status_url, "async operation accepted");
        self.follow_status(&status_url).await
    }

    /// Poll `status_url` until it redirects, then fetch the target
    pub async fn follow_status(&self, status_url: &str) -> E2eResult<Observation> {
        let see_other = StatusCode::SEE_OTHER.as_u16();
        let condition = Condition::<Observation>::new(
            format!("{status_url} to answer {see_other} See Other"),
            move |obs: &Observation| obs.status_code() == see_other,
        );

        let ready = self
            .poller
            .until(&condition, || {
                self.client
                    .send(Request::get(status_url.to_string()).no_redirects())
            })
            .await?
            .into_value();

        let target = join_location(ready.url(), ready.header(LOCATION.as_str())?)?;
        info!(status_url = %status_url, target = %target, "async operation finished");
        self.client.send(Request::get(target)).await
    }
}

fn join_location(from: &str, location: &str) -> E2eResult<String> {
    let base = Url::parse(from).map_err(|e| E2eError::InvalidUrl {
        url: from.to_string(),
        reason: e.to_string(),
    })?;
    resolve_url(&base, location)
}
