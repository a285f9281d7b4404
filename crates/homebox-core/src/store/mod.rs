// ── Snapshot store ──
//
// Atomic snapshot publication plus the pure steps that build one:
// location tree validation, snapshot assembly, and diffing.

mod diff;
mod location_tree;
mod refresh;
mod snapshot_store;

pub use diff::location_changes;
pub use location_tree::{ValidatedLocations, validate_locations};
pub use refresh::build_snapshot;
pub use snapshot_store::SnapshotStore;
