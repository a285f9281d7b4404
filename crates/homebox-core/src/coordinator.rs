// ── Data update coordinator ──
//
// Owns the polling schedule, fetch orchestration, and snapshot
// publication for one Homebox server. A single actor task receives every
// trigger (timer, manual, webhook, targeted asset refresh, move) over an
// mpsc queue, so fetches are serialized and triggers that arrive during a
// fetch collapse into one follow-up.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{CoordinatorConfig, ScheduleConfig};
use crate::error::CoreError;
use crate::model::{Asset, AssetId, FetchStatus, Location, LocationChange, LocationId, Snapshot};
use crate::source::{HomeboxSource, InventorySource};
use crate::store::{SnapshotStore, build_snapshot, location_changes};
use crate::stream::{EventFilter, EventSubscription, SnapshotStream};

const TRIGGER_CHANNEL_SIZE: usize = 32;
const EVENT_CHANNEL_SIZE: usize = 256;

// ── Public types ─────────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CoordinatorState {
    /// No snapshot yet.
    Idle,
    Fetching,
    /// A snapshot is published (possibly stale).
    Ready,
    Stopped,
}

/// A condition that needs user action. Cleared by the next good fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// Homebox rejected the stored credentials even after a fresh login.
    ReauthRequired { message: String },
}

/// Why a full refresh ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RefreshReason {
    Startup,
    Timer,
    Manual,
    Webhook,
    AfterMove,
}

/// Change notifications delivered to subscribers.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A snapshot built from a successful fetch was published.
    SnapshotUpdated(Arc<Snapshot>),
    /// An asset present before and after a fetch changed location.
    LocationChanged(LocationChange),
    /// The published snapshot's fetch status changed.
    StatusChanged {
        status: FetchStatus,
        message: Option<String>,
    },
    /// A targeted refresh replaced (or, if `removed`, deleted) one asset.
    AssetRefreshed { asset_id: AssetId, removed: bool },
}

type Reply<T> = oneshot::Sender<Result<T, CoreError>>;

enum Trigger {
    Refresh {
        reason: RefreshReason,
        reply: Option<Reply<Arc<Snapshot>>>,
    },
    RefreshAsset {
        id: AssetId,
        reply: Reply<Option<Asset>>,
    },
    MoveAsset {
        id: AssetId,
        location: LocationId,
        reply: Reply<()>,
    },
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Call
/// [`start()`](Self::start) for the first fetch and the background loop,
/// and [`shutdown()`](Self::shutdown) to stop it.
pub struct Coordinator<S: InventorySource = HomeboxSource> {
    inner: Arc<CoordinatorInner<S>>,
}

impl<S: InventorySource> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CoordinatorInner<S> {
    schedule: ScheduleConfig,
    source: S,
    store: SnapshotStore,
    state: watch::Sender<CoordinatorState>,
    problem: watch::Sender<Option<Problem>>,
    event_tx: broadcast::Sender<CoordinatorEvent>,
    trigger_tx: mpsc::Sender<Trigger>,
    trigger_rx: Mutex<Option<mpsc::Receiver<Trigger>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator<HomeboxSource> {
    /// Create a coordinator for the configured Homebox server. Does NOT
    /// fetch -- call [`start()`](Self::start).
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let source = HomeboxSource::new(&config)?;
        Ok(Self::with_source(source, config.schedule))
    }
}

impl<S: InventorySource> Coordinator<S> {
    /// Create a coordinator over any inventory source.
    pub fn with_source(source: S, schedule: ScheduleConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (problem, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CHANNEL_SIZE);

        Self {
            inner: Arc::new(CoordinatorInner {
                schedule,
                source,
                store: SnapshotStore::new(),
                state,
                problem,
                event_tx,
                trigger_tx,
                trigger_rx: Mutex::new(Some(trigger_rx)),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.inner.schedule
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Run the first full refresh and start the background loop.
    ///
    /// On failure the coordinator stays `Idle`, nothing is spawned, and
    /// `start()` may be called again.
    pub async fn start(&self) -> Result<Arc<Snapshot>, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        let mut slot = self.inner.trigger_rx.lock().await;
        let Some(rx) = slot.take() else {
            return Err(CoreError::AlreadyStarted);
        };

        info!(
            interval_secs = self.inner.schedule.effective_poll_interval().as_secs(),
            "starting coordinator"
        );

        match self.inner.full_refresh(RefreshReason::Startup).await {
            Ok(snapshot) => {
                drop(slot);
                let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), rx));
                *self.inner.task.lock().await = Some(handle);
                self.inner.started.store(true, Ordering::SeqCst);
                Ok(snapshot)
            }
            Err(e) => {
                *slot = Some(rx);
                Err(e)
            }
        }
    }

    /// Stop the background loop and release the session.
    ///
    /// An in-flight fetch gets `shutdown_timeout` to finish; its result is
    /// discarded either way.
    pub async fn shutdown(&self) {
        if *self.inner.state.borrow() == CoordinatorState::Stopped {
            return;
        }
        self.inner.cancel.cancel();

        let handle = self.inner.task.lock().await.take();
        if let Some(mut handle) = handle {
            let timeout = self.inner.schedule.shutdown_timeout;
            if tokio::time::timeout(timeout, &mut handle).await.is_err() {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "in-flight fetch did not finish, abandoning it"
                );
                handle.abort();
            }
        }

        self.inner.state.send_replace(CoordinatorState::Stopped);
        self.inner.source.close().await;
        info!("coordinator stopped");
    }

    // ── Triggers ─────────────────────────────────────────────────────

    /// Ask for a full refresh without waiting for it.
    pub fn request_refresh(&self) {
        self.enqueue(Trigger::Refresh {
            reason: RefreshReason::Manual,
            reply: None,
        });
    }

    /// A push notification arrived: refresh now and restart the poll timer.
    pub fn notify_push(&self) {
        self.enqueue(Trigger::Refresh {
            reason: RefreshReason::Webhook,
            reply: None,
        });
    }

    /// Refresh and wait for the fetch that covers this request.
    pub async fn refresh_now(&self) -> Result<Arc<Snapshot>, CoreError> {
        self.request(|reply| Trigger::Refresh {
            reason: RefreshReason::Manual,
            reply: Some(reply),
        })
        .await
    }

    /// Re-fetch one asset. `Ok(None)` means Homebox no longer has it and it
    /// was removed from the snapshot.
    pub async fn refresh_asset(&self, id: AssetId) -> Result<Option<Asset>, CoreError> {
        self.request(|reply| Trigger::RefreshAsset { id, reply }).await
    }

    /// Move an asset, then refresh so the snapshot reflects the move.
    pub async fn move_asset(&self, id: AssetId, location: LocationId) -> Result<(), CoreError> {
        self.request(|reply| Trigger::MoveAsset {
            id,
            location,
            reply,
        })
        .await
    }

    fn enqueue(&self, trigger: Trigger) {
        match self.inner.trigger_tx.try_send(trigger) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("trigger queue full, a refresh is already pending"),
            Err(TrySendError::Closed(_)) => debug!("coordinator stopped, trigger dropped"),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Trigger) -> Result<T, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        if !self.inner.started.load(Ordering::SeqCst) {
            return Err(CoreError::NotStarted);
        }
        let (tx, rx) = oneshot::channel();
        self.inner
            .trigger_tx
            .send(make(tx))
            .await
            .map_err(|_| CoreError::ShutDown)?;
        rx.await.map_err(|_| CoreError::ShutDown)?
    }

    // ── State observation ────────────────────────────────────────────

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.store.load()
    }

    pub fn fetch_status(&self) -> Option<FetchStatus> {
        self.inner.store.load().map(|s| s.fetch_status())
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn state_changes(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn problem(&self) -> Option<Problem> {
        self.inner.problem.borrow().clone()
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> EventSubscription {
        self.subscribe_filtered(EventFilter::All)
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> EventSubscription {
        EventSubscription::new(self.inner.event_tx.subscribe(), filter)
    }

    /// Watch the published snapshot.
    pub fn snapshots(&self) -> SnapshotStream {
        self.inner.store.subscribe()
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// Wait for the next trigger (or the poll timer), drain everything else
/// already queued, and handle the batch with at most one full refresh.
async fn run_loop<S: InventorySource>(
    inner: Arc<CoordinatorInner<S>>,
    mut rx: mpsc::Receiver<Trigger>,
) {
    let interval = inner.schedule.effective_poll_interval();
    let mut next_poll = Instant::now() + interval;

    loop {
        let first = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            trigger = rx.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
            () = tokio::time::sleep_until(next_poll) => Trigger::Refresh {
                reason: RefreshReason::Timer,
                reply: None,
            },
        };

        let mut batch = vec![first];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        if inner.process(batch).await {
            next_poll = Instant::now() + interval;
        }
    }

    debug!("coordinator loop exiting");
}

impl<S: InventorySource> CoordinatorInner<S> {
    /// Handle one batch of triggers. Returns whether a full refresh ran.
    async fn process(&self, batch: Vec<Trigger>) -> bool {
        let mut reasons = Vec::new();
        let mut refresh_replies = Vec::new();
        let mut asset_requests = Vec::new();
        let mut moves = Vec::new();

        for trigger in batch {
            match trigger {
                Trigger::Refresh { reason, reply } => {
                    reasons.push(reason);
                    refresh_replies.extend(reply);
                }
                Trigger::RefreshAsset { id, reply } => asset_requests.push((id, reply)),
                Trigger::MoveAsset {
                    id,
                    location,
                    reply,
                } => moves.push((id, location, reply)),
            }
        }

        // Moves first, so the refresh below observes them.
        let mut move_replies = Vec::with_capacity(moves.len());
        for (id, location, reply) in moves {
            let result = self
                .with_reauth(|| self.source.move_asset(&id, &location))
                .await;
            match &result {
                Ok(()) => {
                    info!(asset_id = %id, location_id = %location, "asset moved");
                    reasons.push(RefreshReason::AfterMove);
                }
                Err(e) => warn!(asset_id = %id, error = %e, "asset move failed"),
            }
            move_replies.push((reply, result));
        }

        let refreshed = match reasons.first() {
            Some(&reason) => {
                if reasons.len() > 1 {
                    debug!(coalesced = reasons.len(), ?reasons, "coalescing refresh triggers");
                }
                let result = self.full_refresh(reason).await;
                for reply in refresh_replies {
                    let _ = reply.send(result.clone());
                }
                Some(result)
            }
            None => None,
        };

        for (reply, result) in move_replies {
            let _ = reply.send(result);
        }

        for (id, reply) in asset_requests {
            let result = match &refreshed {
                // The full refresh already covered this asset.
                Some(Ok(snapshot)) => Ok(snapshot.asset(id.as_str()).cloned()),
                _ => self.refresh_single(&id).await,
            };
            let _ = reply.send(result);
        }

        refreshed.is_some()
    }

    /// Fetch everything and replace the snapshot wholesale.
    async fn full_refresh(&self, reason: RefreshReason) -> Result<Arc<Snapshot>, CoreError> {
        self.state.send_replace(CoordinatorState::Fetching);
        debug!(%reason, "full refresh");

        let result = self.with_reauth(|| self.fetch_all()).await;

        if self.cancel.is_cancelled() {
            debug!("shutdown during fetch, discarding result");
            return Err(CoreError::ShutDown);
        }

        match result {
            Ok((locations, assets)) => Ok(self.apply_full(locations, assets)),
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn fetch_all(&self) -> Result<(Vec<Location>, Vec<Asset>), CoreError> {
        let locations = self.source.fetch_locations().await?;
        let assets = self.source.fetch_assets().await?;
        Ok((locations, assets))
    }

    /// Re-fetch one asset into a derived snapshot.
    async fn refresh_single(&self, id: &AssetId) -> Result<Option<Asset>, CoreError> {
        let Some(previous) = self.store.load() else {
            return Err(CoreError::NoSnapshot);
        };

        let result = self.with_reauth(|| self.source.fetch_asset(id)).await;

        if self.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        match result {
            Ok(asset) => {
                let next = Arc::new(previous.with_asset(asset.clone()));
                self.publish(Some(&previous), next);
                let _ = self.event_tx.send(CoordinatorEvent::AssetRefreshed {
                    asset_id: id.clone(),
                    removed: false,
                });
                Ok(Some(asset))
            }
            Err(e) if e.is_not_found() => {
                if previous.asset(id.as_str()).is_some() {
                    info!(asset_id = %id, "asset no longer exists in Homebox, removing");
                    let next = Arc::new(previous.without_asset(id));
                    self.publish(Some(&previous), next);
                    let _ = self.event_tx.send(CoordinatorEvent::AssetRefreshed {
                        asset_id: id.clone(),
                        removed: true,
                    });
                }
                Ok(None)
            }
            Err(e) => {
                if e.is_auth() {
                    self.record_failure(&e);
                } else {
                    warn!(asset_id = %id, error = %e, "asset refresh failed");
                }
                Err(e)
            }
        }
    }

    /// Run `op`; on an auth failure log in again once and retry it once.
    async fn with_reauth<T, F, Fut>(&self, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        match op().await {
            Err(e) if e.is_auth() => {
                warn!(error = %e, "credentials rejected, re-authenticating once");
                self.source.reauthenticate().await?;
                op().await
            }
            other => other,
        }
    }

    // ── Publication ──────────────────────────────────────────────────

    fn apply_full(&self, locations: Vec<Location>, assets: Vec<Asset>) -> Arc<Snapshot> {
        let previous = self.store.load();
        let snapshot = Arc::new(build_snapshot(
            locations,
            assets,
            previous.as_deref(),
            Utc::now(),
            self.schedule.max_location_depth,
        ));

        self.publish(previous.as_deref(), Arc::clone(&snapshot));
        self.state.send_replace(CoordinatorState::Ready);
        if self.problem.send_replace(None).is_some() {
            info!("Homebox accepted credentials again, problem cleared");
        }

        debug!(
            assets = snapshot.assets().len(),
            locations = snapshot.locations().len(),
            issues = snapshot.integrity_issues().len(),
            "snapshot published"
        );
        snapshot
    }

    /// Store `next` and notify subscribers of what changed since `previous`.
    fn publish(&self, previous: Option<&Snapshot>, next: Arc<Snapshot>) {
        self.store.publish(Arc::clone(&next));

        if previous.is_some_and(|p| p.fetch_status() != next.fetch_status()) {
            let _ = self.event_tx.send(CoordinatorEvent::StatusChanged {
                status: next.fetch_status(),
                message: None,
            });
        }

        let changes = previous
            .map(|p| location_changes(p, &next))
            .unwrap_or_default();

        let _ = self
            .event_tx
            .send(CoordinatorEvent::SnapshotUpdated(Arc::clone(&next)));
        for change in changes {
            debug!(
                asset_id = %change.asset_id,
                from = ?change.old_location_id,
                to = ?change.new_location_id,
                "asset changed location"
            );
            let _ = self.event_tx.send(CoordinatorEvent::LocationChanged(change));
        }
    }

    /// Keep the last good data and mark it `Stale` (or `Error` for auth).
    fn record_failure(&self, err: &CoreError) {
        let status = if err.is_auth() {
            error!(error = %err, "re-authentication failed, user action required");
            self.problem.send_replace(Some(Problem::ReauthRequired {
                message: err.to_string(),
            }));
            FetchStatus::Error
        } else {
            warn!(error = %err, "fetch failed, keeping last known data");
            FetchStatus::Stale
        };

        let Some(previous) = self.store.load() else {
            self.state.send_replace(CoordinatorState::Idle);
            return;
        };

        if previous.fetch_status() != status {
            self.store.publish(Arc::new(previous.with_status(status)));
            let _ = self.event_tx.send(CoordinatorEvent::StatusChanged {
                status,
                message: Some(err.to_string()),
            });
        }
        self.state.send_replace(CoordinatorState::Ready);
    }
}
