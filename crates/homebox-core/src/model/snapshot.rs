// ── Snapshot ──
//
// Immutable point-in-time view of the inventory. The coordinator publishes
// a new `Snapshot` for every change, including status-only changes; the
// maps are `Arc`-shared so a status change never copies them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::ids::{AssetId, LocationId};
use super::inventory::{Asset, Location};

/// Outcome of the latest fetch attempt behind a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FetchStatus {
    /// Data came from the latest attempt.
    Ok,
    /// The latest attempt failed transiently; data is from an earlier fetch.
    Stale,
    /// Credentials were rejected; data is from an earlier fetch.
    Error,
}

/// An asset seen in two consecutive snapshots with different locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationChange {
    pub asset_id: AssetId,
    pub old_location_id: Option<LocationId>,
    pub new_location_id: Option<LocationId>,
}

/// A location excluded from (or repaired in) a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIntegrityError {
    /// Parent chain loops back on itself. Every member is excluded.
    #[error("location cycle: {}", join_ids(members))]
    Cycle { members: Vec<LocationId> },

    /// Parent chain longer than the configured bound. Excluded.
    #[error("location {location_id} exceeds maximum depth {max_depth}")]
    TooDeep {
        location_id: LocationId,
        max_depth: usize,
    },

    /// An ancestor was excluded, so this location cannot reach a root. Excluded.
    #[error("location {location_id} has excluded ancestor {ancestor_id}")]
    ExcludedAncestor {
        location_id: LocationId,
        ancestor_id: LocationId,
    },

    /// Parent id does not exist. The location is kept as a root.
    #[error("location {location_id} references unknown parent {parent_id}")]
    DanglingParent {
        location_id: LocationId,
        parent_id: LocationId,
    },
}

fn join_ids(ids: &[LocationId]) -> String {
    ids.iter()
        .map(LocationId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Immutable view of assets and locations at `fetched_at`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    assets: Arc<HashMap<AssetId, Asset>>,
    locations: Arc<HashMap<LocationId, Location>>,
    fetched_at: DateTime<Utc>,
    fetch_status: FetchStatus,
    integrity_issues: Arc<Vec<DataIntegrityError>>,
}

impl Snapshot {
    /// A fresh (`Ok`) snapshot.
    pub fn new(
        assets: HashMap<AssetId, Asset>,
        locations: HashMap<LocationId, Location>,
        fetched_at: DateTime<Utc>,
        integrity_issues: Vec<DataIntegrityError>,
    ) -> Self {
        Self {
            assets: Arc::new(assets),
            locations: Arc::new(locations),
            fetched_at,
            fetch_status: FetchStatus::Ok,
            integrity_issues: Arc::new(integrity_issues),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn assets(&self) -> &HashMap<AssetId, Asset> {
        &self.assets
    }

    pub fn locations(&self) -> &HashMap<LocationId, Location> {
        &self.locations
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.get(id)
    }

    /// Time of the last successful full fetch. Never moves backwards.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.fetch_status
    }

    pub fn integrity_issues(&self) -> &[DataIntegrityError] {
        &self.integrity_issues
    }

    /// Assets sorted by name, then id.
    pub fn assets_sorted(&self) -> Vec<&Asset> {
        let mut assets: Vec<&Asset> = self.assets.values().collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        assets
    }

    /// Assets currently stored at `location`.
    pub fn assets_at(&self, location: &str) -> Vec<&Asset> {
        self.assets_sorted()
            .into_iter()
            .filter(|a| a.location_id.as_ref().is_some_and(|l| l.as_str() == location))
            .collect()
    }

    /// Human-readable path from the root, e.g. `Garage / Shelf 2`.
    ///
    /// Walks at most `locations.len()` parents; published snapshots only
    /// contain acyclic locations.
    pub fn location_path(&self, id: &str) -> Option<String> {
        let mut names = Vec::new();
        let mut cursor = self.locations.get(id);
        while let Some(location) = cursor {
            if names.len() > self.locations.len() {
                break;
            }
            names.push(location.name.as_str());
            cursor = location
                .parent_id
                .as_ref()
                .and_then(|p| self.locations.get(p.as_str()));
        }
        if names.is_empty() {
            return None;
        }
        names.reverse();
        Some(names.join(" / "))
    }

    // ── Derived snapshots ────────────────────────────────────────────

    /// Same data with a different status. Maps are shared, not copied.
    pub fn with_status(&self, fetch_status: FetchStatus) -> Self {
        Self {
            fetch_status,
            ..self.clone()
        }
    }

    /// Same data with one asset inserted or replaced.
    pub fn with_asset(&self, asset: Asset) -> Self {
        let mut assets = HashMap::clone(&self.assets);
        assets.insert(asset.id.clone(), asset);
        Self {
            assets: Arc::new(assets),
            ..self.clone()
        }
    }

    /// Same data without `id`.
    pub fn without_asset(&self, id: &AssetId) -> Self {
        let mut assets = HashMap::clone(&self.assets);
        assets.remove(id);
        Self {
            assets: Arc::new(assets),
            ..self.clone()
        }
    }

    /// True when both snapshots share the same underlying maps.
    pub fn shares_data_with(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.assets, &other.assets) && Arc::ptr_eq(&self.locations, &other.locations)
    }
}
