//! Converge E2E harness
//!
//! Synchronisation and assertion primitives for end-to-end tests against an
//! eventually consistent ML platform API:
//! - Observations over single HTTP exchanges, with typed JSON-path access
//! - Error-collecting assertions that report every mismatch at once
//! - One bounded polling engine behind every "wait until" in the suite
//! - Resolution of the 202 → 303 asynchronous-operation pattern
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  test body                                                    │
//! │    ├── PlatformClient::wait_for_*()     domain waits          │
//! │    │     ├── Poller::until(condition, observe)                │
//! │    │     └── RedirectResolver::start(request)                 │
//! │    └── check_*(actual, expected, &mut errors, context)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ApiClient ── Transport (HttpTransport | scripted)            │
//! │     └── Observation ── JsonPath                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod assertions;
pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod jsonpath;
pub mod logging;
pub mod platform;
pub mod poll;
pub mod redirect;
pub mod response;
pub mod transport;

pub use assertions::ErrorCollection;
pub use client::ApiClient;
pub use condition::Condition;
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use jsonpath::JsonPath;
pub use logging::TestContext;
pub use platform::PlatformClient;
pub use poll::{poll, OnTimeout, PollOutcome, PollPolicy, Poller};
pub use redirect::RedirectResolver;
pub use response::Observation;
pub use transport::{Body, HttpTransport, Request, Transport};
