// ── Wire → domain conversion ──
//
// Resolves the field-name drift handled by the wire types into clean
// domain values: nested vs flat location ids, timestamp formats, and the
// Homebox default quantity of 1.

use chrono::{DateTime, NaiveDateTime, Utc};
use homebox_api::{ItemResponse, LocationResponse};

use crate::model::{Asset, AssetId, Location, LocationId};

impl From<ItemResponse> for Asset {
    fn from(item: ItemResponse) -> Self {
        let location_id = item.effective_location_id().map(LocationId::from);
        let last_modified = item.updated_at.as_deref().and_then(parse_timestamp);
        Self {
            id: AssetId::from(item.id),
            name: item.name,
            location_id,
            quantity: item.quantity.unwrap_or(1),
            last_modified,
            raw_attributes: item.extra,
        }
    }
}

impl From<LocationResponse> for Location {
    fn from(location: LocationResponse) -> Self {
        let parent_id = location.effective_parent_id().map(LocationId::from);
        Self {
            id: LocationId::from(location.id),
            name: location.name,
            parent_id,
        }
    }
}

/// RFC 3339, or a naive timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
