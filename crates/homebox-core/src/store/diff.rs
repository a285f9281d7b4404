// ── Snapshot diffing ──

use crate::model::{LocationChange, Snapshot};

/// Location changes between two snapshots.
///
/// Only assets present in both snapshots are compared; additions and
/// removals are not location changes. Sorted by asset id.
pub fn location_changes(old: &Snapshot, new: &Snapshot) -> Vec<LocationChange> {
    let mut changes: Vec<LocationChange> = new
        .assets()
        .values()
        .filter_map(|asset| {
            let before = old.asset(asset.id.as_str())?;
            (before.location_id != asset.location_id).then(|| LocationChange {
                asset_id: asset.id.clone(),
                old_location_id: before.location_id.clone(),
                new_location_id: asset.location_id.clone(),
            })
        })
        .collect();
    changes.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
    changes
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Asset, AssetId, LocationId};

    fn asset(id: &str, location: Option<&str>) -> Asset {
        Asset {
            id: id.into(),
            name: id.to_uppercase(),
            location_id: location.map(LocationId::from),
            quantity: 1,
            last_modified: None,
            raw_attributes: serde_json::Map::new(),
        }
    }

    fn snapshot(assets: Vec<Asset>) -> Snapshot {
        let assets: HashMap<AssetId, Asset> =
            assets.into_iter().map(|a| (a.id.clone(), a)).collect();
        Snapshot::new(assets, HashMap::new(), Utc::now(), Vec::new())
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let a = snapshot(vec![asset("x", Some("l1")), asset("y", None)]);
        let b = snapshot(vec![asset("x", Some("l1")), asset("y", None)]);
        assert!(location_changes(&a, &b).is_empty());
    }

    #[test]
    fn moved_asset_yields_one_change() {
        let old = snapshot(vec![asset("x", Some("l1")), asset("y", Some("l1"))]);
        let new = snapshot(vec![asset("x", Some("l2")), asset("y", Some("l1"))]);
        assert_eq!(
            location_changes(&old, &new),
            vec![LocationChange {
                asset_id: "x".into(),
                old_location_id: Some("l1".into()),
                new_location_id: Some("l2".into()),
            }]
        );
    }

    #[test]
    fn additions_and_removals_are_not_moves() {
        let old = snapshot(vec![asset("x", Some("l1")), asset("gone", Some("l1"))]);
        let new = snapshot(vec![asset("x", Some("l1")), asset("fresh", Some("l2"))]);
        assert!(location_changes(&old, &new).is_empty());
    }

    #[test]
    fn clearing_a_location_is_a_change() {
        let old = snapshot(vec![asset("x", Some("l1"))]);
        let new = snapshot(vec![asset("x", None)]);
        let changes = location_changes(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new_location_id, None);
    }
}
