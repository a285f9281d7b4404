#![allow(clippy::unwrap_used)]
// Integration tests for the update coordinator against an in-memory source.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use homebox_core::{
    Asset, AssetId, Coordinator, CoordinatorEvent, CoordinatorState, CoreError,
    DataIntegrityError, EventFilter, FetchStatus, InventorySource, Location, LocationChange,
    LocationId, Problem, ScheduleConfig,
};

// ── Fake source ─────────────────────────────────────────────────────

#[derive(Default)]
struct Inventory {
    locations: Vec<Location>,
    assets: Vec<Asset>,
    failures: VecDeque<CoreError>,
    reauth_failure: Option<CoreError>,
}

#[derive(Default)]
struct FakeSource {
    inventory: Mutex<Inventory>,
    fetches: AtomicUsize,
    reauths: AtomicUsize,
    moves: AtomicUsize,
    closed: AtomicBool,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl FakeSource {
    fn new(locations: Vec<Location>, assets: Vec<Asset>) -> Self {
        Self {
            inventory: Mutex::new(Inventory {
                locations,
                assets,
                ..Inventory::default()
            }),
            ..Self::default()
        }
    }

    fn fail_next(&self, err: CoreError) {
        self.inventory.lock().unwrap().failures.push_back(err);
    }

    fn fail_reauth(&self, err: CoreError) {
        self.inventory.lock().unwrap().reauth_failure = Some(err);
    }

    fn relocate(&self, asset_id: &str, location_id: &str) {
        let mut inventory = self.inventory.lock().unwrap();
        let asset = inventory
            .assets
            .iter_mut()
            .find(|a| a.id.as_str() == asset_id)
            .unwrap();
        asset.location_id = Some(location_id.into());
    }

    fn remove(&self, asset_id: &str) {
        self.inventory
            .lock()
            .unwrap()
            .assets
            .retain(|a| a.id.as_str() != asset_id);
    }

    /// Park the next full fetch until `release` is notified.
    fn hold_fetches(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn reauths(&self) -> usize {
        self.reauths.load(Ordering::SeqCst)
    }
}

impl InventorySource for FakeSource {
    async fn fetch_locations(&self) -> Result<Vec<Location>, CoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let mut inventory = self.inventory.lock().unwrap();
        if let Some(err) = inventory.failures.pop_front() {
            return Err(err);
        }
        Ok(inventory.locations.clone())
    }

    async fn fetch_assets(&self) -> Result<Vec<Asset>, CoreError> {
        Ok(self.inventory.lock().unwrap().assets.clone())
    }

    async fn fetch_asset(&self, id: &AssetId) -> Result<Asset, CoreError> {
        self.inventory
            .lock()
            .unwrap()
            .assets
            .iter()
            .find(|a| a.id == *id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn move_asset(&self, id: &AssetId, location: &LocationId) -> Result<(), CoreError> {
        let mut inventory = self.inventory.lock().unwrap();
        let asset = inventory
            .assets
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| not_found(id))?;
        asset.location_id = Some(location.clone());
        self.moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reauthenticate(&self) -> Result<(), CoreError> {
        self.reauths.fetch_add(1, Ordering::SeqCst);
        match self.inventory.lock().unwrap().reauth_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn not_found(id: &AssetId) -> CoreError {
    CoreError::NotFound {
        entity_type: "Asset".into(),
        identifier: id.to_string(),
    }
}

fn transient() -> CoreError {
    CoreError::Transient {
        message: "connection reset".into(),
    }
}

fn rejected() -> CoreError {
    CoreError::AuthenticationFailed {
        message: "invalid credentials".into(),
    }
}

fn loc(id: &str, name: &str, parent: Option<&str>) -> Location {
    Location {
        id: id.into(),
        name: name.into(),
        parent_id: parent.map(LocationId::from),
    }
}

fn asset(id: &str, location: &str) -> Asset {
    Asset {
        id: id.into(),
        name: format!("Asset {id}"),
        location_id: Some(location.into()),
        quantity: 1,
        last_modified: None,
        raw_attributes: serde_json::Map::new(),
    }
}

fn house() -> Vec<Location> {
    vec![
        loc("house", "House", None),
        loc("garage", "Garage", Some("house")),
        loc("shelf", "Shelf 2", Some("garage")),
    ]
}

fn three_assets() -> Vec<Asset> {
    vec![asset("a1", "shelf"), asset("a2", "garage"), asset("a3", "house")]
}

fn schedule(poll_secs: u64) -> ScheduleConfig {
    ScheduleConfig {
        poll_interval: Duration::from_secs(poll_secs),
        ..ScheduleConfig::default()
    }
}

async fn started() -> Coordinator<FakeSource> {
    let coordinator =
        Coordinator::with_source(FakeSource::new(house(), three_assets()), schedule(3600));
    coordinator.start().await.unwrap();
    coordinator
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_publishes_initial_snapshot() {
    let coordinator =
        Coordinator::with_source(FakeSource::new(house(), three_assets()), schedule(3600));
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert!(coordinator.snapshot().is_none());

    let snapshot = coordinator.start().await.unwrap();
    assert_eq!(snapshot.assets().len(), 3);
    assert_eq!(snapshot.locations().len(), 3);
    assert_eq!(snapshot.fetch_status(), FetchStatus::Ok);
    assert_eq!(
        snapshot.location_path("shelf").as_deref(),
        Some("House / Garage / Shelf 2")
    );
    assert_eq!(coordinator.state(), CoordinatorState::Ready);
    assert_eq!(coordinator.fetch_status(), Some(FetchStatus::Ok));
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected() {
    let coordinator = started().await;
    assert!(matches!(
        coordinator.start().await,
        Err(CoreError::AlreadyStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn requests_before_start_are_rejected() {
    let coordinator =
        Coordinator::with_source(FakeSource::new(house(), three_assets()), schedule(3600));
    assert!(matches!(
        coordinator.refresh_now().await,
        Err(CoreError::NotStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_start_stays_idle_and_can_retry() {
    let coordinator =
        Coordinator::with_source(FakeSource::new(house(), three_assets()), schedule(3600));
    coordinator.source().fail_next(transient());

    let err = coordinator.start().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert!(coordinator.snapshot().is_none());

    let snapshot = coordinator.start().await.unwrap();
    assert_eq!(snapshot.assets().len(), 3);
    assert_eq!(coordinator.state(), CoordinatorState::Ready);
}

// ── Refresh semantics ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fetched_at_never_decreases() {
    let coordinator = started().await;
    let mut last = coordinator.snapshot().unwrap().fetched_at();
    for _ in 0..3 {
        let snapshot = coordinator.refresh_now().await.unwrap();
        assert!(snapshot.fetched_at() >= last);
        last = snapshot.fetched_at();
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failure_keeps_data_and_marks_stale() {
    let coordinator = started().await;
    let good = coordinator.snapshot().unwrap();
    let mut status = coordinator.subscribe_filtered(EventFilter::StatusChanges);

    coordinator.source().fail_next(transient());
    let err = coordinator.refresh_now().await.unwrap_err();
    assert!(err.is_transient());

    let stale = coordinator.snapshot().unwrap();
    assert_eq!(stale.fetch_status(), FetchStatus::Stale);
    assert!(stale.shares_data_with(&good));
    assert_eq!(stale.fetched_at(), good.fetched_at());
    assert_eq!(coordinator.state(), CoordinatorState::Ready);
    assert!(coordinator.problem().is_none());

    match status.try_recv() {
        Some(CoordinatorEvent::StatusChanged { status, message }) => {
            assert_eq!(status, FetchStatus::Stale);
            assert!(message.is_some());
        }
        other => panic!("expected StatusChanged, got {other:?}"),
    }

    let recovered = coordinator.refresh_now().await.unwrap();
    assert_eq!(recovered.fetch_status(), FetchStatus::Ok);
    assert!(matches!(
        status.try_recv(),
        Some(CoordinatorEvent::StatusChanged {
            status: FetchStatus::Ok,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn identical_fetch_emits_no_location_changes() {
    let coordinator = started().await;
    let mut events = coordinator.subscribe();

    coordinator.refresh_now().await.unwrap();

    assert!(matches!(
        events.try_recv(),
        Some(CoordinatorEvent::SnapshotUpdated(_))
    ));
    assert!(events.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn moved_asset_emits_exactly_one_change() {
    let coordinator = started().await;
    let mut changes = coordinator.subscribe_filtered(EventFilter::LocationChanges);

    coordinator.source().relocate("a1", "house");
    coordinator.refresh_now().await.unwrap();

    match changes.try_recv() {
        Some(CoordinatorEvent::LocationChanged(change)) => assert_eq!(
            change,
            LocationChange {
                asset_id: "a1".into(),
                old_location_id: Some("shelf".into()),
                new_location_id: Some("house".into()),
            }
        ),
        other => panic!("expected LocationChanged, got {other:?}"),
    }
    assert!(changes.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn removed_asset_disappears_without_location_event() {
    let coordinator = started().await;
    let mut events = coordinator.subscribe();

    coordinator.source().remove("a3");
    let snapshot = coordinator.refresh_now().await.unwrap();

    assert_eq!(snapshot.assets().len(), 2);
    assert!(snapshot.asset("a3").is_none());
    assert!(matches!(
        events.try_recv(),
        Some(CoordinatorEvent::SnapshotUpdated(_))
    ));
    assert!(events.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn location_cycle_is_excluded_and_reported() {
    let locations = vec![
        loc("a", "A", Some("c")),
        loc("b", "B", Some("a")),
        loc("c", "C", Some("b")),
        loc("house", "House", None),
        loc("garage", "Garage", Some("house")),
    ];
    let coordinator = Coordinator::with_source(
        FakeSource::new(locations, vec![asset("a1", "garage")]),
        schedule(3600),
    );

    let snapshot = coordinator.start().await.unwrap();

    let mut kept: Vec<&str> = snapshot.locations().keys().map(LocationId::as_str).collect();
    kept.sort_unstable();
    assert_eq!(kept, vec!["garage", "house"]);
    assert!(
        snapshot
            .integrity_issues()
            .iter()
            .any(|i| matches!(i, DataIntegrityError::Cycle { members } if members.len() == 3))
    );
    assert_eq!(snapshot.fetch_status(), FetchStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn snapshot_stream_sees_each_publication() {
    let coordinator = started().await;
    let mut stream = coordinator.snapshots();
    let first = Arc::clone(stream.current().unwrap());

    coordinator.request_refresh();
    let next = stream.changed().await.unwrap();

    assert!(!Arc::ptr_eq(&first, &next));
    assert!(next.fetched_at() >= first.fetched_at());
}

#[tokio::test(start_paused = true)]
async fn snapshot_stream_latest_does_not_advance_current() {
    let coordinator = started().await;
    let stream = coordinator.snapshots();
    let first = Arc::clone(stream.current().unwrap());

    let refreshed = coordinator.refresh_now().await.unwrap();

    assert!(Arc::ptr_eq(stream.current().unwrap(), &first));
    assert!(Arc::ptr_eq(&stream.latest().unwrap(), &refreshed));
}

#[tokio::test(start_paused = true)]
async fn snapshot_stream_adapter_yields_current_then_updates() {
    use futures_util::StreamExt;

    let coordinator = started().await;
    let mut stream = coordinator.snapshots().into_stream();

    let first = stream.next().await.unwrap();
    assert_eq!(first.assets().len(), 3);

    coordinator.source().relocate("a3", "garage");
    coordinator.request_refresh();
    let next = stream.next().await.unwrap();
    assert_eq!(
        next.asset("a3").unwrap().location_id.as_ref().map(LocationId::as_str),
        Some("garage")
    );
}

// ── Coalescing and scheduling ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn pushes_during_fetch_collapse_into_one_follow_up() {
    let coordinator = started().await;
    assert_eq!(coordinator.source().fetches(), 1);

    coordinator.source().hold_fetches(true);
    coordinator.request_refresh();
    coordinator.source().entered.notified().await;

    for _ in 0..3 {
        coordinator.notify_push();
    }
    coordinator.source().hold_fetches(false);
    coordinator.source().release.notify_one();

    coordinator.refresh_now().await.unwrap();
    assert_eq!(coordinator.source().fetches(), 3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(coordinator.source().fetches(), 3);
}

#[tokio::test(start_paused = true)]
async fn push_during_timer_fetch_runs_one_follow_up() {
    let coordinator = Coordinator::with_source(
        FakeSource::new(house(), three_assets()),
        schedule(60),
    );
    coordinator.start().await.unwrap();
    let before = coordinator.source().fetches();

    // The paused clock auto-advances to the poll deadline.
    coordinator.source().hold_fetches(true);
    coordinator.source().entered.notified().await;
    assert_eq!(coordinator.source().fetches(), before + 1);

    coordinator.notify_push();
    coordinator.source().hold_fetches(false);
    coordinator.source().release.notify_one();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(coordinator.source().fetches(), before + 2);

    // The follow-up restarted the timer; nothing else is due yet.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(coordinator.source().fetches(), before + 2);
}

#[tokio::test(start_paused = true)]
async fn timer_triggers_periodic_refresh() {
    let coordinator = Coordinator::with_source(
        FakeSource::new(house(), three_assets()),
        schedule(60),
    );
    coordinator.start().await.unwrap();
    assert_eq!(coordinator.source().fetches(), 1);

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(coordinator.source().fetches(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(coordinator.source().fetches(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(coordinator.source().fetches(), 3);
}

#[tokio::test(start_paused = true)]
async fn poll_interval_is_clamped_to_minimum() {
    let coordinator = Coordinator::with_source(
        FakeSource::new(house(), three_assets()),
        schedule(1),
    );
    coordinator.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(coordinator.source().fetches(), 1);

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(coordinator.source().fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn push_resets_the_poll_timer() {
    let coordinator = Coordinator::with_source(
        FakeSource::new(house(), three_assets()),
        schedule(60),
    );
    coordinator.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(40)).await;
    coordinator.notify_push();

    // Push at t=40 moves the next poll to t=100.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(coordinator.source().fetches(), 2);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(coordinator.source().fetches(), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(coordinator.source().fetches(), 3);
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn auth_failure_reauthenticates_once_and_retries() {
    let coordinator = started().await;
    coordinator.source().fail_next(rejected());

    let snapshot = coordinator.refresh_now().await.unwrap();

    assert_eq!(snapshot.fetch_status(), FetchStatus::Ok);
    assert_eq!(coordinator.source().reauths(), 1);
    assert_eq!(coordinator.source().fetches(), 3);
    assert!(coordinator.problem().is_none());
}

#[tokio::test(start_paused = true)]
async fn persistent_auth_failure_raises_problem() {
    let coordinator = started().await;
    coordinator.source().fail_next(rejected());
    coordinator.source().fail_next(rejected());

    let err = coordinator.refresh_now().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(coordinator.source().reauths(), 1);

    let snapshot = coordinator.snapshot().unwrap();
    assert_eq!(snapshot.fetch_status(), FetchStatus::Error);
    assert_eq!(snapshot.assets().len(), 3);
    assert!(matches!(
        coordinator.problem(),
        Some(Problem::ReauthRequired { .. })
    ));

    // The next good fetch clears it.
    coordinator.refresh_now().await.unwrap();
    assert!(coordinator.problem().is_none());
    assert_eq!(coordinator.fetch_status(), Some(FetchStatus::Ok));
}

#[tokio::test(start_paused = true)]
async fn rejected_reauthentication_raises_problem() {
    let coordinator = started().await;
    coordinator.source().fail_next(rejected());
    coordinator.source().fail_reauth(rejected());

    let err = coordinator.refresh_now().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(coordinator.fetch_status(), Some(FetchStatus::Error));
    assert!(coordinator.problem().is_some());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_after_reauth_is_stale() {
    let coordinator = started().await;
    coordinator.source().fail_next(rejected());
    coordinator.source().fail_next(transient());

    let err = coordinator.refresh_now().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(coordinator.fetch_status(), Some(FetchStatus::Stale));
    assert!(coordinator.problem().is_none());
}

// ── Targeted operations ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn refresh_asset_not_found_removes_it() {
    let coordinator = started().await;
    let mut events = coordinator.subscribe_filtered(EventFilter::Asset("a3".into()));

    coordinator.source().remove("a3");
    let refreshed = coordinator.refresh_asset("a3".into()).await.unwrap();

    assert!(refreshed.is_none());
    let snapshot = coordinator.snapshot().unwrap();
    assert!(snapshot.asset("a3").is_none());
    assert_eq!(snapshot.assets().len(), 2);
    assert!(matches!(
        events.try_recv(),
        Some(CoordinatorEvent::AssetRefreshed { removed: true, .. })
    ));
    // Only the one asset was fetched.
    assert_eq!(coordinator.source().fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_asset_replaces_just_that_asset() {
    let coordinator = started().await;
    let before = coordinator.snapshot().unwrap();
    let mut events = coordinator.subscribe_filtered(EventFilter::Asset("a1".into()));

    coordinator.source().relocate("a1", "garage");
    coordinator.source().relocate("a2", "house");
    let refreshed = coordinator.refresh_asset("a1".into()).await.unwrap().unwrap();

    assert_eq!(refreshed.location_id, Some(LocationId::from("garage")));
    let snapshot = coordinator.snapshot().unwrap();
    assert_eq!(
        snapshot.asset("a1").unwrap().location_id,
        Some(LocationId::from("garage"))
    );
    // a2 is untouched until the next full refresh.
    assert_eq!(snapshot.asset("a2"), before.asset("a2"));
    assert_eq!(snapshot.fetched_at(), before.fetched_at());

    assert!(matches!(
        events.try_recv(),
        Some(CoordinatorEvent::LocationChanged(_))
    ));
    assert!(matches!(
        events.try_recv(),
        Some(CoordinatorEvent::AssetRefreshed { removed: false, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn move_asset_is_reflected_in_snapshot() {
    let coordinator = started().await;

    coordinator
        .move_asset("a1".into(), "house".into())
        .await
        .unwrap();

    assert_eq!(coordinator.source().moves.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.source().fetches(), 2);
    assert_eq!(
        coordinator.snapshot().unwrap().asset("a1").unwrap().location_id,
        Some(LocationId::from("house"))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_move_does_not_refresh() {
    let coordinator = started().await;

    let err = coordinator
        .move_asset("missing".into(), "house".into())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(coordinator.source().fetches(), 1);
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_and_closes_source() {
    let coordinator = started().await;
    let mut states = coordinator.state_changes();
    assert_eq!(*states.borrow_and_update(), CoordinatorState::Ready);

    coordinator.shutdown().await;

    states.changed().await.unwrap();
    assert_eq!(*states.borrow(), CoordinatorState::Stopped);
    assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    assert!(coordinator.source().closed.load(Ordering::SeqCst));
    assert!(matches!(
        coordinator.refresh_now().await,
        Err(CoreError::ShutDown)
    ));
    assert!(matches!(coordinator.start().await, Err(CoreError::ShutDown)));
    // Fire-and-forget triggers after shutdown are dropped quietly.
    coordinator.request_refresh();
}

#[tokio::test(start_paused = true)]
async fn result_arriving_after_shutdown_is_discarded() {
    let coordinator = started().await;
    coordinator.source().hold_fetches(true);
    coordinator.request_refresh();
    coordinator.source().entered.notified().await;

    coordinator.source().remove("a3");
    let stopper = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.shutdown().await })
    };
    tokio::task::yield_now().await;
    coordinator.source().release.notify_one();
    stopper.await.unwrap();

    assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    assert_eq!(coordinator.snapshot().unwrap().assets().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_a_stuck_fetch() {
    let coordinator = started().await;
    coordinator.source().hold_fetches(true);
    coordinator.request_refresh();
    coordinator.source().entered.notified().await;

    coordinator.shutdown().await;

    assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    let snapshot = coordinator.snapshot().unwrap();
    assert_eq!(snapshot.fetch_status(), FetchStatus::Ok);
    assert_eq!(snapshot.assets().len(), 3);
    assert!(coordinator.source().closed.load(Ordering::SeqCst));
}
