// Location endpoints

use serde_json::{Value, json};
use tracing::debug;

use crate::client::HomeboxClient;
use crate::error::Error;
use crate::models::{ListPage, LocationResponse};

impl HomeboxClient {
    /// List all locations.
    ///
    /// `GET /api/v1/locations`
    pub async fn list_locations(&self) -> Result<Vec<LocationResponse>, Error> {
        let body: Value = self
            .retry()
            .run("list_locations", || self.get("locations", &[]))
            .await?;
        let page = ListPage::<LocationResponse>::from_value(&body)?;
        debug!(count = page.items.len(), "fetched locations");
        Ok(page.items)
    }

    /// Create a top-level location.
    ///
    /// `POST /api/v1/locations` with `{"name": ...}`. Not retried: a
    /// replayed create after a lost response would duplicate the location.
    pub async fn create_location(&self, name: &str) -> Result<LocationResponse, Error> {
        debug!(name, "creating location");
        self.post("locations", &json!({ "name": name })).await
    }
}
