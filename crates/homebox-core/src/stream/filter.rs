// ── Filter predicates for event subscriptions ──

use crate::coordinator::CoordinatorEvent;
use crate::model::AssetId;

/// Which coordinator events a subscription receives.
pub enum EventFilter {
    All,
    SnapshotUpdates,
    LocationChanges,
    StatusChanges,
    /// Events concerning one asset (moves and targeted refreshes).
    Asset(AssetId),
    Custom(Box<dyn Fn(&CoordinatorEvent) -> bool + Send + Sync>),
}

impl EventFilter {
    pub fn matches(&self, event: &CoordinatorEvent) -> bool {
        match self {
            Self::All => true,
            Self::SnapshotUpdates => matches!(event, CoordinatorEvent::SnapshotUpdated(_)),
            Self::LocationChanges => matches!(event, CoordinatorEvent::LocationChanged(_)),
            Self::StatusChanges => matches!(event, CoordinatorEvent::StatusChanged { .. }),
            Self::Asset(id) => match event {
                CoordinatorEvent::LocationChanged(change) => change.asset_id == *id,
                CoordinatorEvent::AssetRefreshed { asset_id, .. } => asset_id == id,
                _ => false,
            },
            Self::Custom(f) => f(event),
        }
    }
}
