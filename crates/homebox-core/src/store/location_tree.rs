// ── Location tree validation ──
//
// Every published location must reach a root within `max_depth` levels.
// Cycles, over-deep chains, and their descendants are excluded and
// reported; a parent id that does not exist is dropped and the location
// kept as a root. One pass, memoized, so each location is walked once.

use std::collections::HashMap;

use tracing::warn;

use crate::model::{DataIntegrityError, Location, LocationId};

/// Locations that passed validation plus everything that did not.
#[derive(Debug, Default)]
pub struct ValidatedLocations {
    pub locations: HashMap<LocationId, Location>,
    pub issues: Vec<DataIntegrityError>,
}

#[derive(Clone)]
enum Resolution {
    /// Chain length from the root, the root itself being 1.
    Depth(usize),
    Excluded,
}

/// Validate the parent graph of `raw` against `max_depth`.
pub fn validate_locations(raw: Vec<Location>, max_depth: usize) -> ValidatedLocations {
    let mut issues = Vec::new();
    let mut by_id: HashMap<LocationId, Location> = HashMap::with_capacity(raw.len());
    for location in raw {
        if let Some(previous) = by_id.insert(location.id.clone(), location) {
            warn!(location_id = %previous.id, "duplicate location id, keeping the later record");
        }
    }

    // Dangling parents: keep the location as a root.
    let dangling: Vec<(LocationId, LocationId)> = by_id
        .values()
        .filter_map(|l| {
            let parent = l.parent_id.as_ref()?;
            (!by_id.contains_key(parent)).then(|| (l.id.clone(), parent.clone()))
        })
        .collect();
    for (location_id, parent_id) in dangling {
        if let Some(location) = by_id.get_mut(&location_id) {
            location.parent_id = None;
        }
        issues.push(DataIntegrityError::DanglingParent {
            location_id,
            parent_id,
        });
    }

    let mut ids: Vec<LocationId> = by_id.keys().cloned().collect();
    ids.sort();

    let mut resolved: HashMap<LocationId, Resolution> = HashMap::with_capacity(ids.len());
    for start in ids {
        if resolved.contains_key(&start) {
            continue;
        }
        resolve_chain(&start, &by_id, max_depth, &mut resolved, &mut issues);
    }

    for issue in &issues {
        warn!(%issue, "location data integrity issue");
    }

    let locations = by_id
        .into_iter()
        .filter(|(id, _)| matches!(resolved.get(id), Some(Resolution::Depth(_))))
        .collect();

    ValidatedLocations { locations, issues }
}

/// Walk up from `start` until a root, a resolved location, or a repeat,
/// then resolve every location on the walked path.
fn resolve_chain(
    start: &LocationId,
    by_id: &HashMap<LocationId, Location>,
    max_depth: usize,
    resolved: &mut HashMap<LocationId, Resolution>,
    issues: &mut Vec<DataIntegrityError>,
) {
    let mut path: Vec<LocationId> = Vec::new();
    let mut on_path: HashMap<LocationId, usize> = HashMap::new();
    let mut cursor = Some(start.clone());

    // Depth of the location above the top of `path` (0 above a root), and
    // the id to blame when that location is excluded.
    let (mut above, mut blame) = loop {
        let Some(id) = cursor else {
            break (Some(0), None);
        };
        if let Some(resolution) = resolved.get(&id) {
            break match resolution {
                Resolution::Depth(depth) => (Some(*depth), None),
                Resolution::Excluded => (None, Some(id)),
            };
        }
        if let Some(&index) = on_path.get(&id) {
            let members = path.split_off(index);
            for member in &members {
                resolved.insert(member.clone(), Resolution::Excluded);
            }
            issues.push(DataIntegrityError::Cycle { members });
            break (None, Some(id));
        }
        on_path.insert(id.clone(), path.len());
        cursor = by_id.get(&id).and_then(|l| l.parent_id.clone());
        path.push(id);
    };

    for id in path.into_iter().rev() {
        let resolution = match above {
            Some(depth) if depth < max_depth => {
                above = Some(depth + 1);
                Resolution::Depth(depth + 1)
            }
            Some(_) => {
                issues.push(DataIntegrityError::TooDeep {
                    location_id: id.clone(),
                    max_depth,
                });
                above = None;
                blame = Some(id.clone());
                Resolution::Excluded
            }
            None => {
                if let Some(ancestor_id) = &blame {
                    issues.push(DataIntegrityError::ExcludedAncestor {
                        location_id: id.clone(),
                        ancestor_id: ancestor_id.clone(),
                    });
                }
                Resolution::Excluded
            }
        };
        resolved.insert(id, resolution);
    }
}
