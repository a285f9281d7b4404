// ── Assets and locations ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{AssetId, LocationId};

/// An inventory item tracked by Homebox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub location_id: Option<LocationId>,
    pub quantity: i64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Server fields not modelled above, kept for presentation.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub raw_attributes: Map<String, Value>,
}

/// A storage location. Locations form a tree through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub parent_id: Option<LocationId>,
}

impl Location {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
