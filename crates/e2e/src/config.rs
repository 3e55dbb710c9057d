//! Harness configuration
//!
//! Loaded from TOML (every section optional), then overridden from the
//! environment. A missing file means defaults.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::poll::PollPolicy;

pub const ENV_API_URL: &str = "CONVERGE_API_URL";
pub const ENV_PORTAL_URL: &str = "CONVERGE_PORTAL_URL";
pub const ENV_API_TOKEN: &str = "CONVERGE_API_TOKEN";
pub const ENV_POLL_INTERVAL_SECS: &str = "CONVERGE_POLL_INTERVAL_SECS";

/// Longest wait any single poll may be configured for (one week)
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Target hosts
    pub environment: EnvironmentConfig,

    pub auth: AuthConfig,

    /// Transport settings
    pub http: HttpConfig,

    /// Poll intervals and per-operation timeouts
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Base of the public API; relative request paths resolve against it
    pub api_url: String,

    /// Account-management portal
    pub portal_url: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            api_url: "https://app.staging.example.com/api/v2/".to_string(),
            portal_url: "https://portal.staging.example.com/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token sent with every API request
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout; `None` or 0 leaves requests unbounded
    pub request_timeout_secs: Option<u64>,

    pub connect_timeout_secs: u64,

    pub user_agent: String,

    /// Skip TLS verification (self-signed staging hosts)
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: Some(120),
            connect_timeout_secs: 10,
            user_agent: format!("converge-e2e/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: false,
        }
    }
}

/// The waits the harness knows timeouts for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Project,
    ModelJob,
    Deployment,
    Balance,
    Notification,
    Metering,
    Report,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub default_timeout_secs: u64,
    pub project_timeout_secs: u64,
    pub model_job_timeout_secs: u64,
    pub deployment_timeout_secs: u64,
    pub balance_timeout_secs: u64,
    pub notification_timeout_secs: u64,
    pub metering_timeout_secs: u64,
    pub report_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            default_timeout_secs: 300,
            project_timeout_secs: 600,
            model_job_timeout_secs: 2400,
            deployment_timeout_secs: 900,
            balance_timeout_secs: 300,
            notification_timeout_secs: 300,
            metering_timeout_secs: 600,
            report_timeout_secs: 900,
        }
    }
}

impl PollingConfig {
    pub fn timeout_secs(&self, kind: WaitKind) -> u64 {
        match kind {
            WaitKind::Project => self.project_timeout_secs,
            WaitKind::ModelJob => self.model_job_timeout_secs,
            WaitKind::Deployment => self.deployment_timeout_secs,
            WaitKind::Balance => self.balance_timeout_secs,
            WaitKind::Notification => self.notification_timeout_secs,
            WaitKind::Metering => self.metering_timeout_secs,
            WaitKind::Report => self.report_timeout_secs,
            WaitKind::Default => self.default_timeout_secs,
        }
    }

    /// Raising policy for `kind`
    pub fn policy(&self, kind: WaitKind) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.timeout_secs(kind)),
            Duration::from_secs(self.interval_secs),
        )
    }

    /// Use one timeout for every kind of wait
    pub fn set_all_timeouts(&mut self, secs: u64) {
        self.default_timeout_secs = secs;
        self.project_timeout_secs = secs;
        self.model_job_timeout_secs = secs;
        self.deployment_timeout_secs = secs;
        self.balance_timeout_secs = secs;
        self.notification_timeout_secs = secs;
        self.metering_timeout_secs = secs;
        self.report_timeout_secs = secs;
    }

    fn all_timeouts(&self) -> [(&'static str, u64); 8] {
        [
            ("default_timeout_secs", self.default_timeout_secs),
            ("project_timeout_secs", self.project_timeout_secs),
            ("model_job_timeout_secs", self.model_job_timeout_secs),
            ("deployment_timeout_secs", self.deployment_timeout_secs),
            ("balance_timeout_secs", self.balance_timeout_secs),
            ("notification_timeout_secs", self.notification_timeout_secs),
            ("metering_timeout_secs", self.metering_timeout_secs),
            ("report_timeout_secs", self.report_timeout_secs),
        ]
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            debug!("Loaded harness config from {}", path.display());
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `load`, then environment overrides, then validation
    pub fn resolve(path: &Path) -> E2eResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> E2eResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source; blank values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.environment.api_url = url;
        }
        if let Some(url) = get(ENV_PORTAL_URL) {
            self.environment.portal_url = url;
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            self.auth.token = Some(token);
        }
        if let Some(raw) = get(ENV_POLL_INTERVAL_SECS) {
            self.polling.interval_secs = raw.trim().parse().map_err(|_| {
                E2eError::InvalidConfig(format!("{ENV_POLL_INTERVAL_SECS} must be an integer, got `{raw}`"))
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> E2eResult<()> {
        for (name, url) in [
            ("environment.api_url", &self.environment.api_url),
            ("environment.portal_url", &self.environment.portal_url),
        ] {
            Url::parse(url)
                .map_err(|e| E2eError::InvalidConfig(format!("{name} `{url}` is not a URL: {e}")))?;
        }

        if self.polling.interval_secs == 0 {
            return Err(E2eError::InvalidConfig(
                "polling.interval_secs must be greater than zero".to_string(),
            ));
        }

        for (name, timeout) in self.polling.all_timeouts() {
            if timeout > MAX_TIMEOUT_SECS {
                return Err(E2eError::InvalidConfig(format!(
                    "polling.{name} ({timeout}s) exceeds the maximum of {MAX_TIMEOUT_SECS}s"
                )));
            }
            if timeout <= self.polling.interval_secs {
                return Err(E2eError::InvalidConfig(format!(
                    "polling.{name} ({timeout}s) must exceed polling.interval_secs ({}s)",
                    self.polling.interval_secs
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        HarnessConfig::default().validate().unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.polling.interval_secs, 2);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converge.toml");
        std::fs::write(
            &path,
            r#"
[environment]
api_url = "https://app.eu.example.com/api/v2/"

[polling]
interval_secs = 5
model_job_timeout_secs = 3600
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.environment.api_url, "https://app.eu.example.com/api/v2/");
        assert_eq!(config.environment.portal_url, EnvironmentConfig::default().portal_url);
        assert_eq!(config.polling.policy(WaitKind::ModelJob).timeout, Duration::from_secs(3600));
        assert_eq!(config.polling.policy(WaitKind::Balance).interval, Duration::from_secs(5));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://127.0.0.1:8080/api/v2/"),
            (ENV_API_TOKEN, "secret"),
            (ENV_PORTAL_URL, "  "),
        ]);
        let mut config = HarnessConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.environment.api_url, "http://127.0.0.1:8080/api/v2/");
        assert_eq!(config.auth.token.as_deref(), Some("secret"));
        assert_eq!(config.environment.portal_url, EnvironmentConfig::default().portal_url);
    }

    #[test]
    fn bad_interval_override_is_rejected() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_POLL_INTERVAL_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, E2eError::InvalidConfig(_)));
    }

    #[test]
    fn interval_must_be_shorter_than_timeouts() {
        let mut config = HarnessConfig::default();
        config.polling.interval_secs = 600;
        assert!(config.validate().is_err());

        config.polling.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn uniform_timeout_applies_to_every_wait() {
        let mut polling = PollingConfig::default();
        polling.set_all_timeouts(45);
        for kind in [WaitKind::Project, WaitKind::ModelJob, WaitKind::Report, WaitKind::Default] {
            assert_eq!(polling.policy(kind).timeout, Duration::from_secs(45));
        }
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let mut config = HarnessConfig::default();
        config.polling.set_all_timeouts(u64::MAX);
        assert!(matches!(config.validate().unwrap_err(), E2eError::InvalidConfig(_)));

        config.polling.set_all_timeouts(MAX_TIMEOUT_SECS);
        config.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            HarnessConfig::from_toml_str("[polling\ninterval_secs = 1").unwrap_err(),
            E2eError::Toml(_)
        ));
    }
}
