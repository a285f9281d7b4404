// Homebox API HTTP client
//
// Wraps `reqwest::Client` with URL construction under `/api/v1`, bearer
// credential injection, status classification, and retry. Endpoint
// methods (items, locations, notifiers) live in their own files as
// inherent impls so this module stays focused on transport mechanics.

use std::sync::Arc;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{AuthClient, AuthConfig, LoginCredentials};
use crate::error::Error;
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Raw HTTP client for the Homebox REST API.
///
/// Every request obtains a valid credential from the shared
/// [`AuthClient`]. A 401 on a data call invalidates the credential and the
/// request is replayed once with a fresh login before the error surfaces.
pub struct HomeboxClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<AuthClient>,
    retry: RetryPolicy,
    asset_label: Option<String>,
    page_size: u32,
}

impl HomeboxClient {
    /// Create a client with its own connection pool and auth session.
    pub fn new(
        base_url: Url,
        login: LoginCredentials,
        auth_config: AuthConfig,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let auth = Arc::new(AuthClient::new(
            http.clone(),
            base_url.clone(),
            login,
            auth_config,
        ));
        Ok(Self::with_client(http, base_url, auth))
    }

    /// Create a client around an existing pool and auth session.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: Arc<AuthClient>) -> Self {
        Self {
            http,
            base_url,
            auth,
            retry: RetryPolicy::default(),
            asset_label: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Restrict `list_assets` to items carrying this label.
    pub fn with_asset_label(mut self, label: Option<String>) -> Self {
        self.asset_label = label.filter(|l| !l.is_empty());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The auth session backing this client.
    pub fn auth(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn asset_label(&self) -> Option<&str> {
        self.asset_label.as_deref()
    }

    pub(crate) fn page_size(&self) -> u32 {
        self.page_size
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/v1/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/v1/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        self.send(Method::GET, path, query, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, Error> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub(crate) async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, Error> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    /// Send one authorized request.
    ///
    /// A 401 drops the cached credential so the next call logs in afresh,
    /// and surfaces as `Error::Authentication`. The request is not replayed;
    /// re-authenticating and retrying is the caller's decision.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let result = self.send_once(method, path, query, body).await;
        if result.as_ref().is_err_and(Error::is_auth) {
            debug!(path, "request rejected with 401, dropping credential");
            self.auth.invalidate();
        }
        result
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let credential = self.auth.get_valid_credential().await?;
        let url = self.api_url(path)?;
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, credential.authorization_header());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        handle_response(resp).await
    }
}

/// Classify the status and decode a success body.
async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let resource = resp.url().path().to_owned();

    if status.is_success() {
        let body = resp.text().await.map_err(Error::Transport)?;
        let text = if body.trim().is_empty() { "null" } else { body.as_str() };
        return serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        });
    }

    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    let body = resp.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::UNAUTHORIZED => Error::Authentication {
            message: format!("request to {resource} rejected (HTTP 401)"),
        },
        StatusCode::NOT_FOUND => Error::NotFound { resource },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        s if s.is_server_error() => Error::Server {
            status: s.as_u16(),
            message: error_message(&body),
        },
        s => Error::Api {
            status: s.as_u16(),
            message: error_message(&body),
        },
    })
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|k| v.get(k).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn client(base: &str) -> HomeboxClient {
        let login = LoginCredentials {
            username: "admin@example.com".into(),
            password: SecretString::from("pw".to_owned()),
        };
        let base = Url::parse(base).unwrap_or_else(|e| panic!("bad test url: {e}"));
        let http = reqwest::Client::new();
        let auth = Arc::new(AuthClient::new(
            http.clone(),
            base.clone(),
            login,
            AuthConfig::default(),
        ));
        HomeboxClient::with_client(http, base, auth)
    }

    #[test]
    fn api_url_joins_under_v1() {
        let c = client("http://homebox.local:7745/");
        let url = c.api_url("items/abc").map(|u| u.to_string());
        assert_eq!(url.ok().as_deref(), Some("http://homebox.local:7745/api/v1/items/abc"));
    }

    #[test]
    fn api_url_keeps_base_path() {
        let c = client("https://example.com/homebox");
        let url = c.api_url("/locations").map(|u| u.to_string());
        assert_eq!(url.ok().as_deref(), Some("https://example.com/homebox/api/v1/locations"));
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"error":"bad label"}"#), "bad label");
        assert_eq!(error_message("plain text\n"), "plain text");
    }
}
