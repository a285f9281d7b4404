// homebox-core: Snapshot store and update coordination between homebox-api and hosts.

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
pub mod stream;
pub mod webhook;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoordinatorConfig, Credentials, ScheduleConfig, TlsVerification};
pub use coordinator::{Coordinator, CoordinatorEvent, CoordinatorState, Problem, RefreshReason};
pub use error::CoreError;
pub use source::{HomeboxSource, InventorySource};
pub use store::SnapshotStore;
pub use stream::{EventFilter, EventSubscription, SnapshotStream};
pub use webhook::{
    IgnoreReason, WebhookKind, WebhookOutcome, WebhookReceiver, WebhookRegistration,
    generate_webhook_id, register_webhook, webhook_url,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Asset, AssetId, DataIntegrityError, FetchStatus, Location, LocationChange, LocationId,
    Snapshot,
};
