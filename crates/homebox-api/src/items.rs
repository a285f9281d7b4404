// Item ("asset") endpoints
//
// Listing follows Homebox pagination; single-item reads surface 404 as
// `Error::NotFound` so callers can treat it as a confirmed deletion.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::HomeboxClient;
use crate::error::Error;
use crate::models::{ItemResponse, ListPage};

/// Hard stop for servers that keep reporting a larger `total`.
const MAX_PAGES: u32 = 1_000;

impl HomeboxClient {
    /// List every item, following pagination.
    ///
    /// `GET /api/v1/items?page=N&pageSize=M[&labels=L]`. Stops once the
    /// reported `total` is reached, a short page arrives, or the server
    /// returns an unpaged list.
    pub async fn list_assets(&self) -> Result<Vec<ItemResponse>, Error> {
        let page_size = self.page_size();
        let page_size_usize = usize::try_from(page_size).unwrap_or(usize::MAX);
        let mut assets = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut query = vec![("page", page.to_string()), ("pageSize", page_size.to_string())];
            if let Some(label) = self.asset_label() {
                query.push(("labels", label.to_owned()));
            }

            let body: Value = self
                .retry()
                .run("list_assets", || self.get("items", &query))
                .await?;
            let ListPage { items, total } = ListPage::<ItemResponse>::from_value(&body)?;
            let received = items.len();
            assets.extend(items);
            debug!(page, received, ?total, "fetched item page");

            let done = match total {
                Some(total) => assets.len() >= total || received < page_size_usize,
                None => true,
            };
            if done || received == 0 {
                return Ok(assets);
            }
        }

        warn!(max_pages = MAX_PAGES, "item pagination did not terminate, truncating");
        Ok(assets)
    }

    /// Get a single item.
    ///
    /// `GET /api/v1/items/{id}`
    pub async fn get_asset(&self, id: &str) -> Result<ItemResponse, Error> {
        let path = format!("items/{id}");
        debug!(id, "fetching item");
        self.retry().run("get_asset", || self.get(&path, &[])).await
    }

    /// Move an item to another location.
    ///
    /// `PATCH /api/v1/items/{id}` with `{"location_id": ...}`. Servers that
    /// reject the flat field get a second attempt with `{"location": {"id": ...}}`.
    pub async fn move_asset(&self, id: &str, location_id: &str) -> Result<(), Error> {
        let path = format!("items/{id}");
        debug!(id, location_id, "moving item");

        let flat = json!({ "location_id": location_id });
        let first: Result<Value, Error> = self
            .retry()
            .run("move_asset", || self.patch(&path, &flat))
            .await;

        match first {
            Ok(_) => Ok(()),
            Err(Error::Api { status, .. }) => {
                debug!(id, status, "flat location field rejected, retrying with nested form");
                let nested = json!({ "location": { "id": location_id } });
                let _: Value = self
                    .retry()
                    .run("move_asset", || self.patch(&path, &nested))
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
