//! Logging setup and per-test logging context
//!
//! There is no module-level logger. A [`TestContext`] owns a named span and
//! hands it to the pollers and error collections it creates, so everything
//! one test logs is grouped under that test's span, even when tests run in
//! parallel.

use tracing::{info_span, Span};
use tracing_subscriber::EnvFilter;

use crate::assertions::ErrorCollection;
use crate::poll::{PollPolicy, Poller};

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over
/// `default_directive`. Returns false if a subscriber was already set.
pub fn init(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Like [`init`], but writes through libtest's capture
pub fn init_for_tests() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("converge_e2e=debug")),
        )
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// Logging handle for one test
#[derive(Debug, Clone)]
pub struct TestContext {
    name: String,
    span: Span,
}

impl TestContext {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = info_span!("test", name = %name);
        Self { name, span }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn poller(&self, policy: PollPolicy) -> Poller {
        Poller::with_span(policy, self.span.clone())
    }

    pub fn errors(&self) -> ErrorCollection {
        ErrorCollection::with_span(self.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::check_text_contains;

    #[test]
    fn repeated_init_is_harmless() {
        init_for_tests();
        assert!(!init_for_tests());
    }

    #[test]
    fn context_builds_components() {
        let ctx = TestContext::new("balance_is_debited");
        assert_eq!(ctx.name(), "balance_is_debited");

        let mut errors = ctx.errors();
        check_text_contains("credits: 10", "credits: 9", &mut errors, "balance");
        assert_eq!(errors.len(), 1);

        let poller = ctx.poller(PollPolicy::default());
        assert_eq!(poller.policy(), &PollPolicy::default());
    }
}
