// ── Inventory sources ──
//
// The coordinator talks to Homebox through `InventorySource` so the fetch
// orchestration can run against any backend. `HomeboxSource` is the real
// one: the API request layer plus its auth session.

use std::future::Future;
use std::sync::Arc;

use homebox_api::{AuthConfig, HomeboxClient, LoginCredentials, TlsMode, TransportConfig};
use tracing::debug;

use crate::config::{CoordinatorConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{Asset, AssetId, Location, LocationId};

/// Backend the coordinator fetches from.
///
/// Implementations classify failures through [`CoreError`]; the
/// coordinator decides what each class means for the snapshot.
pub trait InventorySource: Send + Sync + 'static {
    fn fetch_locations(&self) -> impl Future<Output = Result<Vec<Location>, CoreError>> + Send;

    fn fetch_assets(&self) -> impl Future<Output = Result<Vec<Asset>, CoreError>> + Send;

    /// Fetch one asset. A deleted asset is `CoreError::NotFound`.
    fn fetch_asset(&self, id: &AssetId) -> impl Future<Output = Result<Asset, CoreError>> + Send;

    fn move_asset(
        &self,
        id: &AssetId,
        location: &LocationId,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Discard the current session and log in again.
    fn reauthenticate(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Release the session. Called once on coordinator shutdown.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

// ── HomeboxSource ────────────────────────────────────────────────────

/// [`InventorySource`] backed by the Homebox REST API.
pub struct HomeboxSource {
    client: Arc<HomeboxClient>,
}

impl HomeboxSource {
    /// Build the HTTP client and auth session from configuration.
    pub fn new(config: &CoordinatorConfig) -> Result<Self, CoreError> {
        let transport = build_transport(config);
        let login = LoginCredentials {
            username: config.credentials.username.clone(),
            password: config.credentials.password.clone(),
        };
        let auth = AuthConfig {
            safety_margin: config.credential_safety_margin,
            token_lifetime: config.token_lifetime,
        };
        let client = HomeboxClient::new(config.url.clone(), login, auth, &transport)?
            .with_retry_policy(config.retry.clone())
            .with_asset_label(config.asset_label.clone());
        Ok(Self::from_client(Arc::new(client)))
    }

    pub fn from_client(client: Arc<HomeboxClient>) -> Self {
        Self { client }
    }

    /// The underlying API client, for calls outside the sync loop.
    pub fn client(&self) -> &Arc<HomeboxClient> {
        &self.client
    }
}

impl InventorySource for HomeboxSource {
    async fn fetch_locations(&self) -> Result<Vec<Location>, CoreError> {
        let locations = self.client.list_locations().await?;
        Ok(locations.into_iter().map(Location::from).collect())
    }

    async fn fetch_assets(&self) -> Result<Vec<Asset>, CoreError> {
        let items = self.client.list_assets().await?;
        Ok(items.into_iter().map(Asset::from).collect())
    }

    async fn fetch_asset(&self, id: &AssetId) -> Result<Asset, CoreError> {
        match self.client.get_asset(id.as_str()).await {
            Ok(item) => Ok(Asset::from(item)),
            Err(e) if e.is_not_found() => Err(CoreError::NotFound {
                entity_type: "Asset".into(),
                identifier: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn move_asset(&self, id: &AssetId, location: &LocationId) -> Result<(), CoreError> {
        self.client.move_asset(id.as_str(), location.as_str()).await?;
        Ok(())
    }

    async fn reauthenticate(&self) -> Result<(), CoreError> {
        debug!("forcing re-authentication");
        self.client.auth().invalidate();
        self.client.auth().authenticate().await?;
        Ok(())
    }

    async fn close(&self) {
        self.client.auth().logout().await;
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Build a [`TransportConfig`] from the coordinator configuration.
fn build_transport(config: &CoordinatorConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
