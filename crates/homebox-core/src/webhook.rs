// ── Webhook receiver ──
//
// The host owns the HTTP server; it hands each POST to `receive()` with
// the webhook id from the request path and replies with
// `WebhookOutcome::http_status()`. A recognised notification becomes a
// push refresh on the coordinator.

use homebox_api::DEFAULT_WEBHOOK_EVENTS;
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::AssetId;
use crate::source::{HomeboxSource, InventorySource};

/// Path segment under which webhooks are served.
pub const WEBHOOK_PATH: &str = "api/webhook";

/// What a notification says happened to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum WebhookKind {
    Created,
    Updated,
    Deleted,
}

/// Why a delivery was dropped without triggering a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    MalformedJson,
    MissingAssetId,
    UnrecognizedType(String),
}

/// Result of handling one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A refresh was requested.
    Accepted { kind: WebhookKind, asset_id: AssetId },
    Ignored(IgnoreReason),
    /// The path id does not match this receiver.
    UnknownWebhook,
}

impl WebhookOutcome {
    /// Status code the host should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Ignored(IgnoreReason::MalformedJson) => 400,
            Self::Accepted { .. } | Self::Ignored(_) => 200,
            Self::UnknownWebhook => 404,
        }
    }
}

/// Turns webhook deliveries into coordinator push refreshes.
pub struct WebhookReceiver<S: InventorySource = HomeboxSource> {
    webhook_id: String,
    coordinator: Coordinator<S>,
}

impl<S: InventorySource> WebhookReceiver<S> {
    pub fn new(webhook_id: impl Into<String>, coordinator: Coordinator<S>) -> Self {
        Self {
            webhook_id: webhook_id.into(),
            coordinator,
        }
    }

    pub fn webhook_id(&self) -> &str {
        &self.webhook_id
    }

    /// Handle one delivery. Never fails: bad input is logged and ignored.
    pub fn receive(&self, webhook_id: &str, body: &[u8]) -> WebhookOutcome {
        if !ids_match(&self.webhook_id, webhook_id) {
            debug!("webhook delivery for an unknown id");
            return WebhookOutcome::UnknownWebhook;
        }

        let outcome = parse_delivery(body);
        match &outcome {
            WebhookOutcome::Accepted { kind, asset_id } => {
                info!(%kind, %asset_id, "webhook received, requesting refresh");
                self.coordinator.notify_push();
            }
            WebhookOutcome::Ignored(reason) => {
                warn!(?reason, "webhook delivery ignored");
            }
            WebhookOutcome::UnknownWebhook => {}
        }
        outcome
    }
}

fn parse_delivery(body: &[u8]) -> WebhookOutcome {
    let Ok(payload) = serde_json::from_slice::<Value>(body) else {
        return WebhookOutcome::Ignored(IgnoreReason::MalformedJson);
    };

    let event_type = payload
        .get("type")
        .or_else(|| payload.get("event"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let Some(kind) = parse_kind(event_type) else {
        return WebhookOutcome::Ignored(IgnoreReason::UnrecognizedType(event_type.to_owned()));
    };

    let asset_id = payload
        .get("data")
        .and_then(|d| d.get("id"))
        .or_else(|| payload.get("id"))
        .or_else(|| payload.get("itemId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());
    match asset_id {
        Some(id) => WebhookOutcome::Accepted {
            kind,
            asset_id: AssetId::from(id),
        },
        None => WebhookOutcome::Ignored(IgnoreReason::MissingAssetId),
    }
}

/// `item.updated`, `asset.deleted`, ...
fn parse_kind(event_type: &str) -> Option<WebhookKind> {
    let (entity, action) = event_type.split_once('.')?;
    if !matches!(entity, "item" | "asset") {
        return None;
    }
    match action {
        "created" => Some(WebhookKind::Created),
        "updated" => Some(WebhookKind::Updated),
        "deleted" => Some(WebhookKind::Deleted),
        _ => None,
    }
}

/// Constant-time id comparison.
fn ids_match(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

// ── Registration ─────────────────────────────────────────────────────

/// Whether registration created a notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookRegistration {
    Created,
    AlreadyRegistered,
}

/// A fresh random webhook id (32 hex characters).
pub fn generate_webhook_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The URL Homebox should POST to for `webhook_id`.
pub fn webhook_url(external_url: &Url, webhook_id: &str) -> String {
    format!(
        "{}/{WEBHOOK_PATH}/{webhook_id}",
        external_url.as_str().trim_end_matches('/')
    )
}

/// Register the webhook with Homebox unless a notifier with the same URL
/// already exists.
pub async fn register_webhook(
    source: &HomeboxSource,
    external_url: &Url,
    webhook_id: &str,
) -> Result<WebhookRegistration, CoreError> {
    let url = webhook_url(external_url, webhook_id);
    let client = source.client();

    let existing = client.list_webhooks().await?;
    if existing.iter().any(|n| n.url == url) {
        debug!(%url, "webhook already registered");
        return Ok(WebhookRegistration::AlreadyRegistered);
    }

    client.register_webhook(&url, &DEFAULT_WEBHOOK_EVENTS).await?;
    info!(%url, "webhook registered with Homebox");
    Ok(WebhookRegistration::Created)
}
