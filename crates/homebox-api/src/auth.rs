// Homebox authentication
//
// Token-based session: `POST /api/v1/users/login` issues a bearer token
// with an expiry, `GET /api/v1/users/refresh` extends it. The credential
// lives in an `ArcSwapOption` so readers never block; login and refresh
// are serialized behind a single flight guard so concurrent callers share
// one exchange.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::models::TokenResponse;

// ── Credential ───────────────────────────────────────────────────────

/// An issued access token with its expiry.
///
/// Token material is wrapped in `SecretString`; the `Debug` output is
/// redacted and nothing outside this crate can read it back.
#[derive(Debug, Clone)]
pub struct Credential {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
    refresh_token: Option<SecretString>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            expires_at,
            refresh_token: refresh_token.map(SecretString::from),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// True once `now` is inside the safety margin before expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: TimeDelta) -> bool {
        self.expires_at
            .checked_sub_signed(margin)
            .is_none_or(|deadline| now >= deadline)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// `Authorization` header value. Homebox returns tokens already
    /// prefixed with `Bearer `; bare tokens get the prefix added.
    pub(crate) fn authorization_header(&self) -> String {
        bearer(self.access_token.expose_secret())
    }

    /// Header value used for the refresh exchange.
    fn refresh_header(&self) -> String {
        match &self.refresh_token {
            Some(token) => bearer(token.expose_secret()),
            None => self.authorization_header(),
        }
    }
}

fn bearer(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_owned()
    } else {
        format!("Bearer {token}")
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Username/password pair used for login.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Token lifetime handling.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Refresh this long before the token actually expires.
    pub safety_margin: Duration,
    /// Assumed lifetime when the server omits an expiry.
    pub token_lifetime: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_secs(5 * 60),
            token_lifetime: Duration::from_secs(60 * 60),
        }
    }
}

/// Session state, observable through [`AuthClient::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

// ── Client ───────────────────────────────────────────────────────────

/// Owns the session credential for one Homebox server.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    login: LoginCredentials,
    config: AuthConfig,
    credential: ArcSwapOption<Credential>,
    state: watch::Sender<AuthState>,
    flight: Mutex<()>,
}

impl AuthClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        login: LoginCredentials,
        config: AuthConfig,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            http,
            base_url,
            login,
            config,
            credential: ArcSwapOption::empty(),
            state,
            flight: Mutex::new(()),
        }
    }

    /// Subscribe to session state transitions.
    pub fn state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Install a previously issued credential (e.g. one persisted by the host).
    pub fn restore(&self, credential: Credential) {
        self.credential.store(Some(Arc::new(credential)));
        self.state.send_replace(AuthState::Authenticated);
    }

    /// Drop the credential so the next call logs in again.
    ///
    /// Used after the server rejects a token we believed valid.
    pub fn invalidate(&self) {
        if self.credential.swap(None).is_some() {
            debug!("credential invalidated");
        }
        self.state.send_replace(AuthState::Unauthenticated);
    }

    /// Log in with username/password, replacing any current credential.
    pub async fn authenticate(&self) -> Result<Arc<Credential>, Error> {
        let _flight = self.flight.lock().await;
        self.login_locked().await
    }

    /// Return a credential that is valid for at least the safety margin.
    ///
    /// Logs in when no credential exists and refreshes when the current
    /// one is inside the margin. Concurrent callers wait on the same
    /// exchange and receive the same credential.
    pub async fn get_valid_credential(&self) -> Result<Arc<Credential>, Error> {
        let margin = self.margin();

        if let Some(current) = self.credential.load_full() {
            if !current.needs_refresh(Utc::now(), margin) {
                return Ok(current);
            }
        }

        let _flight = self.flight.lock().await;

        // Whoever held the guard before us may already have done the work.
        let current = self.credential.load_full();
        match current {
            Some(cred) if !cred.needs_refresh(Utc::now(), margin) => Ok(cred),
            Some(cred) if cred.is_expired(Utc::now()) && !cred.has_refresh_token() => {
                debug!("credential expired without refresh token, logging in");
                self.login_locked().await
            }
            Some(cred) => self.refresh_locked(&cred).await,
            None => self.login_locked().await,
        }
    }

    /// End the session. The server-side logout is best-effort.
    pub async fn logout(&self) {
        let _flight = self.flight.lock().await;
        let Some(cred) = self.credential.swap(None) else {
            return;
        };
        self.state.send_replace(AuthState::Unauthenticated);

        let Ok(url) = self.endpoint("users/logout") else {
            return;
        };
        match self
            .http
            .post(url)
            .header(AUTHORIZATION, cred.authorization_header())
            .send()
            .await
        {
            Ok(resp) => debug!(status = %resp.status(), "logout complete"),
            Err(e) => debug!(error = %e, "logout request failed, session dropped locally"),
        }
    }

    // ── Exchanges (caller holds the flight guard) ────────────────────

    async fn login_locked(&self) -> Result<Arc<Credential>, Error> {
        let url = self.endpoint("users/login")?;
        self.state.send_replace(AuthState::Authenticating);
        debug!(username = %self.login.username, "logging in at {}", url);

        let body = json!({
            "username": self.login.username,
            "password": self.login.password.expose_secret(),
            "stayLoggedIn": true,
        });

        let result = async {
            let resp = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| transient("login request failed", &e))?;
            self.read_token(resp, "login", None).await
        }
        .await;

        match result {
            Ok(cred) => {
                let cred = Arc::new(cred);
                self.credential.store(Some(Arc::clone(&cred)));
                self.state.send_replace(AuthState::Authenticated);
                info!(expires_at = %cred.expires_at, "authenticated with Homebox");
                Ok(cred)
            }
            Err(e) => {
                self.credential.store(None);
                self.state.send_replace(AuthState::Unauthenticated);
                warn!(error = %e, "login failed");
                Err(e)
            }
        }
    }

    async fn refresh_locked(&self, prior: &Arc<Credential>) -> Result<Arc<Credential>, Error> {
        let url = self.endpoint("users/refresh")?;
        self.state.send_replace(AuthState::Refreshing);
        debug!(expires_at = %prior.expires_at, "refreshing credential");

        let result = async {
            let resp = self
                .http
                .get(url)
                .header(AUTHORIZATION, prior.refresh_header())
                .send()
                .await
                .map_err(|e| transient("refresh request failed", &e))?;
            self.read_token(resp, "refresh", prior.refresh_token.as_ref())
                .await
        }
        .await;

        match result {
            Ok(cred) => {
                let cred = Arc::new(cred);
                self.credential.store(Some(Arc::clone(&cred)));
                self.state.send_replace(AuthState::Authenticated);
                debug!(expires_at = %cred.expires_at, "credential refreshed");
                Ok(cred)
            }
            Err(e) if e.is_auth() => {
                self.credential.store(None);
                self.state.send_replace(AuthState::Unauthenticated);
                warn!(error = %e, "refresh rejected, session cleared");
                Err(e)
            }
            Err(e) => {
                // Prior credential stays in place for the next attempt.
                self.state.send_replace(AuthState::Authenticated);
                warn!(error = %e, "refresh failed transiently");
                Err(e)
            }
        }
    }

    async fn read_token(
        &self,
        resp: reqwest::Response,
        phase: &str,
        prior_refresh: Option<&SecretString>,
    ) -> Result<Credential, Error> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, phase, &body));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| transient(&format!("{phase} response unreadable"), &e))?;
        let parsed: TokenResponse = serde_json::from_str(&body).unwrap_or_default();
        let parsed = parsed.flatten();

        let Some(token) = parsed.token.filter(|t| !t.trim().is_empty()) else {
            return Err(Error::Authentication {
                message: format!("{phase} response did not contain a token"),
            });
        };

        let now = Utc::now();
        let lifetime = TimeDelta::from_std(self.config.token_lifetime).unwrap_or(TimeDelta::zero());
        let expires_at = parse_expiry(parsed.expires_at.as_deref(), now, lifetime);
        let refresh_token = parsed
            .refresh_token
            .or_else(|| prior_refresh.map(|t| t.expose_secret().to_owned()));

        Ok(Credential::new(token, expires_at, refresh_token))
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/v1/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        );
        Ok(Url::parse(&full)?)
    }

    fn margin(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.safety_margin).unwrap_or(TimeDelta::zero())
    }
}

fn transient(context: &str, err: &reqwest::Error) -> Error {
    Error::TransientAuth {
        message: format!("{context}: {err}"),
    }
}

fn classify_status(status: StatusCode, phase: &str, body: &str) -> Error {
    let message = format!("{phase} failed (HTTP {status}): {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::TransientAuth { message }
    } else {
        Error::Authentication { message }
    }
}

/// Parse a server expiry. Falls back to `now + lifetime` when the value is
/// missing, unparseable, or already in the past.
fn parse_expiry(raw: Option<&str>, now: DateTime<Utc>, lifetime: TimeDelta) -> DateTime<Utc> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    })
    .filter(|expiry| *expiry > now)
    .unwrap_or(now + lifetime)
}
