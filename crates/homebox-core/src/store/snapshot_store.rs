// ── Current snapshot holder ──
//
// Readers load the current snapshot wait-free through `ArcSwapOption`;
// subscribers are woken through a `watch` channel carrying the same `Arc`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;

use crate::model::Snapshot;
use crate::stream::SnapshotStream;

/// Holds the latest published [`Snapshot`].
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
    tx: watch::Sender<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            current: ArcSwapOption::empty(),
            tx,
        }
    }

    /// The latest snapshot, if any fetch has succeeded.
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Replace the current snapshot and wake subscribers.
    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        self.current.store(Some(Arc::clone(&snapshot)));
        self.tx.send_replace(Some(snapshot));
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.tx.subscribe())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
