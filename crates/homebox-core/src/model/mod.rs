// ── Domain model ──
//
// Canonical representation of Homebox inventory data. Wire-format quirks
// are resolved in `convert`; everything here is already normalized.

pub mod ids;
pub mod inventory;
pub mod snapshot;

// ── Re-exports ──────────────────────────────────────────────────────

pub use ids::{AssetId, LocationId};
pub use inventory::{Asset, Location};
pub use snapshot::{DataIntegrityError, FetchStatus, LocationChange, Snapshot};
