// ── Sync coordinator ──
//
// Keeps one device's snapshot fresh once paired. Periodic and on-demand
// refreshes share a single fetch lock, so at most one fetch per device is
// in flight and later requests queue behind it. Publication is an atomic
// pointer swap; readers never block and never see a partial snapshot.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use poolsync_api::{Credential, DeviceClient, ErrorKind};

use crate::catalog::WritableField;
use crate::config::CoordinatorConfig;
use crate::decode::HeatMode;
use crate::device::DeviceApi;
use crate::diagnostics::redact;
use crate::error::CoreError;
use crate::snapshot::{DeviceInfo, Snapshot};

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Results, status, events ──────────────────────────────────────────

/// Outcome of one refresh cycle.
#[derive(Debug, Clone)]
pub enum PollResult {
    Updated(Arc<Snapshot>),
    /// The credential was rejected; polling is halted until a new one is
    /// installed.
    AuthRejected,
    CommunicationFailed(poolsync_api::Error),
    ProtocolError(poolsync_api::Error),
    /// The coordinator was shut down; the device was not contacted.
    Stopped,
}

impl PollResult {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Updated(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Health of the polling loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Consecutive failed cycles of any recoverable kind.
    pub failure_streak: u32,
    /// Delay until the next periodic refresh.
    #[serde(serialize_with = "as_secs")]
    pub interval: Duration,
    pub needs_repairing: bool,
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Broadcast to every `events()` receiver after each cycle.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Updated(Arc<Snapshot>),
    Failed { kind: ErrorKind, message: String },
    NeedsRepairing,
}

// ── SyncCoordinator ──────────────────────────────────────────────────

/// Polling loop and snapshot owner for one paired device.
///
/// Cheaply cloneable via `Arc<Inner>`.
pub struct SyncCoordinator<A: DeviceApi = DeviceClient> {
    inner: Arc<Inner<A>>,
}

impl<A: DeviceApi> Clone for SyncCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<A: DeviceApi> {
    api: A,
    config: CoordinatorConfig,
    credential: ArcSwap<Credential>,
    snapshot: ArcSwapOption<Snapshot>,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    status_tx: watch::Sender<SyncStatus>,
    event_tx: broadcast::Sender<SyncEvent>,
    fetch_lock: tokio::sync::Mutex<()>,
    communication_streak: AtomicU32,
    cancel: CancellationToken,
    timer: Mutex<Option<Timer>>,
}

struct Timer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl<A: DeviceApi> Drop for Inner<A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<A: DeviceApi> SyncCoordinator<A> {
    /// Create a coordinator. Does not fetch; call
    /// [`first_refresh()`](Self::first_refresh) to load data and start
    /// the periodic timer.
    pub fn new(api: A, credential: Credential, config: CoordinatorConfig) -> Result<Self, CoreError> {
        config.validate()?;
        if credential.is_empty() {
            return Err(CoreError::NotPaired);
        }

        let (snapshot_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(SyncStatus {
            interval: config.refresh_interval,
            ..SyncStatus::default()
        });
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(Inner {
                api,
                config,
                credential: ArcSwap::from_pointee(credential),
                snapshot: ArcSwapOption::empty(),
                snapshot_tx,
                status_tx,
                event_tx,
                fetch_lock: tokio::sync::Mutex::new(()),
                communication_streak: AtomicU32::new(0),
                cancel: CancellationToken::new(),
                timer: Mutex::new(None),
            }),
        })
    }

    /// Create a coordinator and wait for its first data.
    pub async fn connect(
        api: A,
        credential: Credential,
        config: CoordinatorConfig,
    ) -> Result<Self, CoreError> {
        let coordinator = Self::new(api, credential, config)?;
        coordinator.first_refresh().await?;
        Ok(coordinator)
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Identifier of the device the current credential belongs to.
    pub fn identifier(&self) -> String {
        self.inner.credential.load().identifier().to_owned()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Initial fetch. Resolves once data is available or the fetch failed;
    /// only a successful first fetch starts the periodic timer.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }
        match self.refresh().await {
            PollResult::Updated(snapshot) => {
                self.start_timer();
                info!(
                    address = self.inner.api.address(),
                    interval_secs = self.inner.config.refresh_interval.as_secs(),
                    "device synchronized"
                );
                Ok(snapshot)
            }
            PollResult::AuthRejected => Err(CoreError::NeedsRepairing),
            PollResult::CommunicationFailed(e) | PollResult::ProtocolError(e) => Err(e.into()),
            PollResult::Stopped => Err(CoreError::Stopped),
        }
    }

    /// Replace the credential after re-pairing. Clears the needs-repairing
    /// state and restarts the periodic timer.
    pub async fn install_credential(&self, credential: Credential) -> Result<(), CoreError> {
        if credential.is_empty() {
            return Err(CoreError::NotPaired);
        }
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }

        let guard = self.inner.fetch_lock.lock().await;
        info!(identifier = credential.identifier(), "installing new credential");
        self.inner.credential.store(Arc::new(credential));
        self.inner.communication_streak.store(0, Ordering::Relaxed);
        let interval = self.inner.config.refresh_interval;
        self.inner.status_tx.send_modify(|s| {
            s.needs_repairing = false;
            s.failure_streak = 0;
            s.last_error = None;
            s.interval = interval;
        });
        drop(guard);

        self.start_timer();
        Ok(())
    }

    /// Stop the periodic timer and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let timer = self.timer_slot().take();
        if let Some(timer) = timer {
            let _ = timer.handle.await;
        }
        debug!(address = self.inner.api.address(), "coordinator stopped");
    }

    /// `true` while the periodic timer is scheduled.
    pub fn is_polling(&self) -> bool {
        self.timer_slot()
            .as_ref()
            .is_some_and(|t| !t.cancel.is_cancelled() && !t.handle.is_finished())
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch and publish a new snapshot.
    ///
    /// Queues behind any fetch already in flight. Never fails: every
    /// outcome is a [`PollResult`], also reported through
    /// [`events()`](Self::events) and [`status()`](Self::status).
    pub async fn refresh(&self) -> PollResult {
        let inner = &self.inner;
        let _guard = inner.fetch_lock.lock().await;

        if inner.cancel.is_cancelled() {
            debug!(address = inner.api.address(), "skipping refresh, coordinator stopped");
            return PollResult::Stopped;
        }
        if inner.status_tx.borrow().needs_repairing {
            debug!(address = inner.api.address(), "skipping refresh, credential rejected");
            return PollResult::AuthRejected;
        }

        let credential = inner.credential.load_full();
        match inner.api.fetch_snapshot(&credential).await {
            Ok(data) => {
                let snapshot = Arc::new(Snapshot::new(data));
                inner.snapshot.store(Some(Arc::clone(&snapshot)));
                inner.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
                inner.communication_streak.store(0, Ordering::Relaxed);

                let fetched_at = snapshot.fetched_at();
                let interval = inner.config.refresh_interval;
                inner.status_tx.send_modify(|s| {
                    s.last_success = Some(fetched_at);
                    s.last_error = None;
                    s.failure_streak = 0;
                    s.interval = interval;
                });
                let _ = inner.event_tx.send(SyncEvent::Updated(Arc::clone(&snapshot)));
                debug!(address = inner.api.address(), "snapshot published");
                PollResult::Updated(snapshot)
            }
            Err(e) => match e.kind() {
                ErrorKind::Auth => {
                    self.mark_needs_repairing(&e);
                    PollResult::AuthRejected
                }
                ErrorKind::Communication => {
                    let streak = inner.communication_streak.fetch_add(1, Ordering::Relaxed) + 1;
                    let next = inner.config.next_delay(streak);
                    warn!(
                        address = inner.api.address(),
                        error = %e,
                        streak,
                        next_refresh_secs = next.as_secs(),
                        "device unreachable, keeping last snapshot"
                    );
                    self.record_failure(&e, next);
                    PollResult::CommunicationFailed(e)
                }
                ErrorKind::Protocol => {
                    error!(
                        address = inner.api.address(),
                        error = %e,
                        "device response not understood, possible firmware incompatibility"
                    );
                    let streak = inner.communication_streak.load(Ordering::Relaxed);
                    self.record_failure(&e, inner.config.next_delay(streak));
                    PollResult::ProtocolError(e)
                }
            },
        }
    }

    fn record_failure(&self, err: &poolsync_api::Error, next: Duration) {
        let message = err.to_string();
        self.inner.status_tx.send_modify(|s| {
            s.failure_streak += 1;
            s.last_error = Some(message.clone());
            s.interval = next;
        });
        let _ = self.inner.event_tx.send(SyncEvent::Failed {
            kind: err.kind(),
            message,
        });
    }

    fn mark_needs_repairing(&self, err: &poolsync_api::Error) {
        error!(
            address = self.inner.api.address(),
            error = %err,
            "credential rejected, polling halted until re-paired"
        );
        self.inner.status_tx.send_modify(|s| {
            s.needs_repairing = true;
            s.last_error = Some(err.to_string());
        });
        self.stop_timer();
        let _ = self.inner.event_tx.send(SyncEvent::NeedsRepairing);
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Most recently published snapshot; `None` before the first success.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.load_full()
    }

    /// Watch channel carrying every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Stream of published snapshots, starting with the current one.
    pub fn snapshots(&self) -> WatchStream<Option<Arc<Snapshot>>> {
        WatchStream::new(self.subscribe())
    }

    /// Per-cycle outcomes, including failures.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn needs_repairing(&self) -> bool {
        self.inner.status_tx.borrow().needs_repairing
    }

    /// Hub identity derived from the current snapshot.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        let snapshot = self.current_snapshot()?;
        let identifier = self.identifier();
        Some(snapshot.device_info(&identifier, self.inner.api.address()))
    }

    /// Redacted dump of the coordinator state for troubleshooting.
    pub fn diagnostics(&self) -> Value {
        let snapshot = self.current_snapshot();
        redact(&json!({
            "address": self.inner.api.address(),
            "identifier": self.identifier(),
            "status": self.status(),
            "device_info": self.device_info(),
            "snapshot": snapshot.map(|s| json!({
                "fetched_at": s.fetched_at(),
                "data": s.data(),
            })),
        }))
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Patch one config field of one sub-device, then refresh so the
    /// returned result (and every reader) reflects the write.
    pub async fn write_field(
        &self,
        device_id: &str,
        field_key: &str,
        value: i64,
    ) -> Result<PollResult, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }
        if self.needs_repairing() {
            return Err(CoreError::NeedsRepairing);
        }

        let credential = self.inner.credential.load_full();
        if let Err(e) = self
            .inner
            .api
            .patch_field(device_id, field_key, value, &credential)
            .await
        {
            if e.is_auth() {
                self.mark_needs_repairing(&e);
                return Err(CoreError::NeedsRepairing);
            }
            warn!(device_id, field_key, error = %e, "field write failed");
            return Err(e.into());
        }

        debug!(device_id, field_key, value, "field written, refreshing");
        Ok(self.refresh().await)
    }

    /// Validate and write one of the settable values.
    pub async fn write_setting(
        &self,
        field: WritableField,
        value: f64,
    ) -> Result<PollResult, CoreError> {
        let raw = field.validate(value, self.inner.config.units)?;
        self.write_validated(field, raw).await
    }

    pub async fn set_heat_mode(&self, mode: HeatMode) -> Result<PollResult, CoreError> {
        self.write_validated(WritableField::Mode, mode.raw()).await
    }

    pub async fn set_setpoint(&self, value: f64) -> Result<PollResult, CoreError> {
        self.write_setting(WritableField::Setpoint, value).await
    }

    async fn write_validated(
        &self,
        field: WritableField,
        raw: i64,
    ) -> Result<PollResult, CoreError> {
        let snapshot = self.current_snapshot().ok_or(CoreError::NoData)?;
        let kind = field.device_kind();
        let device_id = snapshot
            .device_id_of(kind)
            .ok_or_else(|| CoreError::DeviceNotFound {
                kind: kind.to_string(),
            })?;
        self.write_field(&device_id, field.wire_key(), raw).await
    }

    // ── Timer management ─────────────────────────────────────────────

    fn timer_slot(&self) -> MutexGuard<'_, Option<Timer>> {
        self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_timer(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let mut slot = self.timer_slot();
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(refresh_task(Arc::downgrade(&self.inner), cancel.clone()));
        *slot = Some(Timer { cancel, handle });
    }

    /// Cancel without joining; may be called from the timer task itself.
    fn stop_timer(&self) {
        if let Some(timer) = self.timer_slot().as_ref() {
            timer.cancel.cancel();
        }
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Periodic refresh with backoff on communication-failure streaks.
async fn refresh_task<A: DeviceApi>(inner: Weak<Inner<A>>, cancel: CancellationToken) {
    loop {
        let Some(strong) = inner.upgrade() else { break };
        let delay = strong.status_tx.borrow().interval;
        drop(strong);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        let Some(inner) = inner.upgrade() else { break };
        let coordinator = SyncCoordinator { inner };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            r = coordinator.refresh() => r,
        };
        if matches!(result, PollResult::AuthRejected | PollResult::Stopped) {
            break;
        }
    }
    debug!("refresh timer stopped");
}
