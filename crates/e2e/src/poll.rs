//! Bounded polling engine
//!
//! One loop shape serves every wait in the harness:
//!
//! ```text
//! STARTED ──► POLLING ──► SATISFIED
//!               │  ▲
//!               ▼  │ sleep(interval)
//!             not met ──(now > deadline)──► TIMED_OUT
//! ```
//!
//! The deadline is fixed when the session starts. Every iteration performs
//! exactly one observation, evaluates the condition, and only then sleeps;
//! after each sleep the deadline is checked before observing again. The loop
//! therefore ends within `timeout + interval` (plus the time spent inside
//! the observations themselves) whatever the condition does.
//!
//! Errors returned by the observation abort the session at once. Only
//! "condition not yet true" is retried.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn, Instrument, Span};

use crate::condition::Condition;
use crate::error::{E2eError, E2eResult};

/// Default pause between observations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default overall wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// What a session does when the deadline passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnTimeout {
    /// Fail with `E2eError::PollTimeout`
    #[default]
    Raise,
    /// Hand the last observation back as `PollOutcome::TimedOut`
    ReturnLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub on_timeout: OnTimeout,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            on_timeout: OnTimeout::Raise,
        }
    }
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            on_timeout: OnTimeout::Raise,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_on_timeout(mut self, on_timeout: OnTimeout) -> Self {
        self.on_timeout = on_timeout;
        self
    }

    /// Same policy, but a timeout returns the last value instead of failing
    pub fn returning_last(self) -> Self {
        self.with_on_timeout(OnTimeout::ReturnLast)
    }

    pub fn raising(self) -> Self {
        self.with_on_timeout(OnTimeout::Raise)
    }
}

#[derive(Debug)]
pub enum PollOutcome<T> {
    Satisfied {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        last: T,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<T> PollOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { attempts, .. } | PollOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollOutcome::Satisfied { elapsed, .. } | PollOutcome::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }

    pub fn value(&self) -> &T {
        match self {
            PollOutcome::Satisfied { value, .. } => value,
            PollOutcome::TimedOut { last, .. } => last,
        }
    }

    /// The satisfying value, or the stale one after a tolerated timeout
    pub fn into_value(self) -> T {
        match self {
            PollOutcome::Satisfied { value, .. } => value,
            PollOutcome::TimedOut { last, .. } => last,
        }
    }
}

/// A polling session factory bound to a policy and a logging span
#[derive(Debug, Clone)]
pub struct Poller {
    policy: PollPolicy,
    span: Span,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self::with_span(policy, Span::current())
    }

    pub fn with_span(policy: PollPolicy, span: Span) -> Self {
        Self { policy, span }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Same span, different policy
    pub fn with_policy(&self, policy: PollPolicy) -> Poller {
        Self::with_span(policy, self.span.clone())
    }

    /// Observe repeatedly until `condition` holds or the deadline passes
    pub async fn until<T, F, Fut>(
        &self,
        condition: &Condition<T>,
        mut observe: F,
    ) -> E2eResult<PollOutcome<T>>
    where
        T: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        let policy = self.policy;
        let expected = condition.description().to_string();

        async move {
            let started = Instant::now();
            // a timeout too large to represent never expires
            let deadline = started.checked_add(policy.timeout);
            let mut attempts: u32 = 0;

            debug!(
                expected = %expected,
                timeout_ms = policy.timeout.as_millis() as u64,
                interval_ms = policy.interval.as_millis() as u64,
                "poll started"
            );

            loop {
                attempts += 1;
                let value = observe().await?;

                if condition.is_met(&value) {
                    let elapsed = started.elapsed();
                    info!(
                        expected = %expected,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "poll condition satisfied"
                    );
                    return Ok(PollOutcome::Satisfied {
                        value,
                        attempts,
                        elapsed,
                    });
                }

                debug!(attempt = attempts, observed = ?value, "condition not met yet");
                sleep(policy.interval).await;

                if deadline.is_some_and(|deadline| Instant::now() > deadline) {
                    let elapsed = started.elapsed();
                    return match policy.on_timeout {
                        OnTimeout::Raise => {
                            warn!(
                                expected = %expected,
                                attempts,
                                elapsed_ms = elapsed.as_millis() as u64,
                                "poll timed out"
                            );
                            Err(E2eError::PollTimeout {
                                expected,
                                last_observed: format!("{value:?}"),
                                elapsed,
                            })
                        }
                        OnTimeout::ReturnLast => {
                            info!(
                                expected = %expected,
                                attempts,
                                elapsed_ms = elapsed.as_millis() as u64,
                                "poll timed out, returning last observation"
                            );
                            Ok(PollOutcome::TimedOut {
                                last: value,
                                attempts,
                                elapsed,
                            })
                        }
                    };
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}

/// Run one polling session with `policy`
pub async fn poll<T, F, Fut>(
    policy: PollPolicy,
    condition: &Condition<T>,
    observe: F,
) -> E2eResult<PollOutcome<T>>
where
    T: Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<T>>,
{
    Poller::new(policy).until(condition, observe).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(timeout_secs: u64, interval_secs: u64) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_observation_satisfies_without_sleeping() {
        let mut calls = 0;
        let started = Instant::now();
        let outcome = poll(policy(60, 5), &Condition::is_true(), || {
            calls += 1;
            async { Ok(true) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn always_false_raises_within_timeout_plus_interval() {
        let started = Instant::now();
        let err = poll(policy(30, 4), &Condition::is_true(), || async { Ok(false) })
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(elapsed <= Duration::from_secs(34), "took {elapsed:?}");
        assert!(elapsed > Duration::from_secs(30));
        match err {
            E2eError::PollTimeout { expected, last_observed, .. } => {
                assert_eq!(expected, "flag is true");
                assert_eq!(last_observed, "false");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn observation_errors_abort_immediately() {
        let mut calls = 0;
        let err = poll(policy(30, 1), &Condition::is_true(), || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt == 2 {
                    Err(E2eError::InvalidRequest("connection reset".into()))
                } else {
                    Ok(false)
                }
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::InvalidRequest(_)));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_does_not_panic() {
        let mut calls = 0;
        let outcome = poll(
            PollPolicy::new(Duration::MAX, Duration::from_secs(1)),
            &Condition::is_true(),
            || {
                calls += 1;
                let ready = calls == 3;
                async move { Ok(ready) }
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.attempts(), 3);
    }

    #[test]
    fn policy_builders() {
        let p = PollPolicy::default()
            .with_timeout(Duration::from_secs(10))
            .with_interval(Duration::from_millis(500))
            .returning_last();
        assert_eq!(p.on_timeout, OnTimeout::ReturnLast);
        assert_eq!(p.raising().on_timeout, OnTimeout::Raise);
        assert_eq!(p.interval, Duration::from_millis(500));
    }
}
