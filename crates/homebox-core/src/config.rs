// ── Runtime sync configuration ──
//
// These types describe *how* to reach a Homebox server and how often to
// poll it. They carry credential data and tuning, but never touch disk.
// The CLI (or any host) constructs a `CoordinatorConfig` and hands it in.

use std::time::Duration;

use homebox_api::RetryPolicy;
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Username/password for the Homebox account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Polling schedule and snapshot policy for one coordinator.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Interval between scheduled full refreshes.
    pub poll_interval: Duration,
    /// Lower clamp for `poll_interval`.
    pub min_poll_interval: Duration,
    /// Upper clamp for `poll_interval`.
    pub max_poll_interval: Duration,
    /// Longest parent chain a location may have before it is excluded.
    pub max_location_depth: usize,
    /// How long shutdown waits for an in-flight fetch.
    pub shutdown_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60 * 60),
            min_poll_interval: Duration::from_secs(30),
            max_poll_interval: Duration::from_secs(24 * 60 * 60),
            max_location_depth: 32,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ScheduleConfig {
    /// `poll_interval` clamped into `[min_poll_interval, max_poll_interval]`.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval
            .clamp(self.min_poll_interval, self.max_poll_interval.max(self.min_poll_interval))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_poll_interval.is_zero() {
            return Err(config_error("min_poll_interval must be greater than zero"));
        }
        if self.min_poll_interval > self.max_poll_interval {
            return Err(config_error(
                "min_poll_interval must not exceed max_poll_interval",
            ));
        }
        if self.max_location_depth == 0 {
            return Err(config_error("max_location_depth must be at least 1"));
        }
        Ok(())
    }
}

/// Configuration for syncing a single Homebox server.
///
/// Built by the CLI or a host, passed to `Coordinator` -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Server root (e.g., `http://homebox.local:7745`).
    pub url: Url,
    pub credentials: Credentials,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Only sync items carrying this label.
    pub asset_label: Option<String>,
    /// Refresh the token this long before it expires.
    pub credential_safety_margin: Duration,
    /// Assumed token lifetime when the server omits an expiry.
    pub token_lifetime: Duration,
    /// Per-call retry policy for API requests.
    pub retry: RetryPolicy,
    pub schedule: ScheduleConfig,
}

impl CoordinatorConfig {
    /// Config with default tuning for the given server and account.
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            asset_label: None,
            credential_safety_margin: Duration::from_secs(5 * 60),
            token_lifetime: Duration::from_secs(60 * 60),
            retry: RetryPolicy::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.url.scheme(), "http" | "https") {
            return Err(config_error(format!(
                "unsupported URL scheme '{}'",
                self.url.scheme()
            )));
        }
        if self.credentials.username.trim().is_empty() {
            return Err(config_error("username must not be empty"));
        }
        if self.token_lifetime <= self.credential_safety_margin {
            return Err(config_error(
                "token_lifetime must be longer than credential_safety_margin",
            ));
        }
        self.schedule.validate()
    }
}

fn config_error(message: impl Into<String>) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}
