// ── Full refresh assembly ──
//
// Turns one fetch of locations and assets into a new `Snapshot`. Pure and
// synchronous: the coordinator awaits the network, then calls this.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::location_tree::validate_locations;
use crate::model::{Asset, AssetId, Location, Snapshot};

/// Build a fresh snapshot, replacing `previous` wholesale.
///
/// `fetched_at` is `max(now, previous.fetched_at)` so it never moves
/// backwards even if the wall clock does.
pub fn build_snapshot(
    locations: Vec<Location>,
    assets: Vec<Asset>,
    previous: Option<&Snapshot>,
    now: DateTime<Utc>,
    max_location_depth: usize,
) -> Snapshot {
    let validated = validate_locations(locations, max_location_depth);

    let mut by_id: HashMap<AssetId, Asset> = HashMap::with_capacity(assets.len());
    for asset in assets {
        if let Some(previous) = by_id.insert(asset.id.clone(), asset) {
            warn!(asset_id = %previous.id, "duplicate asset id, keeping the later record");
        }
    }

    let unplaced = by_id
        .values()
        .filter(|a| {
            a.location_id
                .as_ref()
                .is_some_and(|l| !validated.locations.contains_key(l))
        })
        .count();
    if unplaced > 0 {
        debug!(unplaced, "assets reference locations missing from the snapshot");
    }

    let fetched_at = previous.map_or(now, |p| p.fetched_at().max(now));
    Snapshot::new(by_id, validated.locations, fetched_at, validated.issues)
}
