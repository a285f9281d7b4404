// Notifier (webhook) endpoints

use serde_json::{Value, json};
use tracing::debug;

use crate::client::HomeboxClient;
use crate::error::Error;
use crate::models::{ListPage, NotifierResponse};

/// Item events a registered webhook subscribes to.
pub const DEFAULT_WEBHOOK_EVENTS: [&str; 3] = ["item.created", "item.updated", "item.deleted"];

const NOTIFIER_NAME: &str = "homebox-sync";

impl HomeboxClient {
    /// Register `url` as an active notifier for `events`.
    ///
    /// `POST /api/v1/notifiers`
    pub async fn register_webhook(&self, url: &str, events: &[&str]) -> Result<NotifierResponse, Error> {
        debug!(url, ?events, "registering webhook");
        let body = json!({
            "name": NOTIFIER_NAME,
            "url": url,
            "events": events,
            "is_active": true,
        });
        self.post("notifiers", &body).await
    }

    /// List registered notifiers.
    ///
    /// `GET /api/v1/notifiers`
    pub async fn list_webhooks(&self) -> Result<Vec<NotifierResponse>, Error> {
        let body: Value = self
            .retry()
            .run("list_webhooks", || self.get("notifiers", &[]))
            .await?;
        Ok(ListPage::<NotifierResponse>::from_value(&body)?.items)
    }
}
