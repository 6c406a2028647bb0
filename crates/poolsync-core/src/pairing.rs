// ── Pairing session ──
//
// Drives the push-link handshake as one background task: start the link
// window, poll until the device hands out a secret or the window closes,
// and report progress over a channel. The caller holds a `PairingHandle`
// and never re-enters the task.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use poolsync_api::{Credential, ErrorKind, PairingStatus};

use crate::config::{PairingConfig, synthetic_identifier};
use crate::device::DeviceApi;

// ── Public types ─────────────────────────────────────────────────────

/// Lifecycle of a pairing session, observable through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    Idle,
    Starting,
    Polling,
    Succeeded,
    Failed,
}

impl PairingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A completed handshake.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub credential: Credential,
    /// The device did not report its hardware address and the identifier
    /// was synthesized from the network address.
    pub degraded: bool,
}

/// Why a session ended without a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingFailure {
    #[error("the button was not pressed before the link window closed")]
    Timeout,
    #[error("pairing was cancelled")]
    Cancelled,
    #[error("device unreachable: {0}")]
    Communication(String),
    #[error("unexpected response from device: {0}")]
    Protocol(String),
}

/// Progress and result reports delivered to the observer.
#[derive(Debug, Clone)]
pub enum PairingOutcome {
    /// Still waiting for the button press.
    Pending { time_remaining: Duration },
    Succeeded(Pairing),
    Failed(PairingFailure),
}

impl PairingOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

// ── PairingSession ───────────────────────────────────────────────────

/// A not-yet-started push-link handshake against one device.
pub struct PairingSession<A: DeviceApi> {
    api: Arc<A>,
    config: PairingConfig,
}

impl<A: DeviceApi> PairingSession<A> {
    pub fn new(api: A, config: PairingConfig) -> Self {
        Self {
            api: Arc::new(api),
            config,
        }
    }

    /// Start the handshake in the background.
    pub fn begin(self) -> PairingHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PairingState::Idle);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            self.api,
            self.config,
            cancel.clone(),
            state_tx,
            updates_tx,
        ));

        PairingHandle {
            updates: updates_rx,
            state: state_rx,
            cancel: cancel.clone(),
            guard: cancel.drop_guard(),
            task,
        }
    }
}

// ── PairingHandle ────────────────────────────────────────────────────

/// Caller side of a running session. Dropping it cancels the session.
pub struct PairingHandle {
    updates: mpsc::UnboundedReceiver<PairingOutcome>,
    state: watch::Receiver<PairingState>,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<PairingOutcome>,
}

impl PairingHandle {
    /// Next progress report. The terminal outcome is the last item; after
    /// it this returns `None`.
    pub async fn next_update(&mut self) -> Option<PairingOutcome> {
        self.updates.recv().await
    }

    pub fn state(&self) -> PairingState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PairingState> {
        self.state.clone()
    }

    /// Stop the session. Safe to call repeatedly and after completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session, for use from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> PairingOutcome {
        let Self { guard, task, .. } = self;
        let _token = guard.disarm();
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "pairing task aborted");
                PairingOutcome::Failed(PairingFailure::Cancelled)
            }
        }
    }

    /// Cancel and wait for the task to wind down.
    pub async fn cancel_and_wait(self) -> PairingOutcome {
        self.cancel();
        self.outcome().await
    }
}

// ── Background task ──────────────────────────────────────────────────

async fn run<A: DeviceApi>(
    api: Arc<A>,
    config: PairingConfig,
    cancel: CancellationToken,
    state: watch::Sender<PairingState>,
    updates: mpsc::UnboundedSender<PairingOutcome>,
) -> PairingOutcome {
    let outcome = drive(api.as_ref(), &config, &cancel, &state, &updates).await;

    let terminal = match &outcome {
        PairingOutcome::Succeeded(_) => PairingState::Succeeded,
        _ => PairingState::Failed,
    };
    state.send_replace(terminal);
    let _ = updates.send(outcome.clone());
    outcome
}

async fn drive<A: DeviceApi>(
    api: &A,
    config: &PairingConfig,
    cancel: &CancellationToken,
    state: &watch::Sender<PairingState>,
    updates: &mpsc::UnboundedSender<PairingOutcome>,
) -> PairingOutcome {
    let address = api.address();
    state.send_replace(PairingState::Starting);
    info!(%address, "opening push-link window");

    let started = tokio::select! {
        biased;
        () = cancel.cancelled() => return cancelled(address),
        r = api.start_pairing() => r,
    };
    if let Err(e) = started {
        error!(%address, error = %e, "push-link start failed");
        return PairingOutcome::Failed(failure_from(&e));
    }

    state.send_replace(PairingState::Polling);
    let opened_at = Instant::now();
    let mut consecutive_failures = 0u32;
    let mut polls = 0u32;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return cancelled(address),
            () = tokio::time::sleep(config.check_interval) => {}
        }

        polls += 1;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return cancelled(address),
            r = api.poll_pairing_status() => r,
        };
        let elapsed = opened_at.elapsed();

        match result {
            Ok(PairingStatus::Linked { secret, identifier }) => {
                if secret.expose_secret().is_empty() {
                    return PairingOutcome::Failed(PairingFailure::Protocol(
                        "device reported an empty secret".into(),
                    ));
                }
                let (identifier, degraded) = match identifier {
                    Some(id) => (id, false),
                    None => {
                        let id = synthetic_identifier(address);
                        warn!(%address, identifier = %id, "device omitted its hardware address, using synthesized identifier");
                        (id, true)
                    }
                };
                info!(%address, %identifier, polls, "pairing succeeded");
                return PairingOutcome::Succeeded(Pairing {
                    credential: Credential::new(secret, identifier),
                    degraded,
                });
            }
            Ok(PairingStatus::Waiting { time_remaining }) => {
                consecutive_failures = 0;
                if time_remaining.is_some_and(|s| s <= 0) || elapsed >= config.timeout {
                    warn!(%address, polls, "push-link window closed without a button press");
                    return PairingOutcome::Failed(PairingFailure::Timeout);
                }
                let remaining = time_remaining
                    .and_then(|s| u64::try_from(s).ok())
                    .map_or_else(|| config.timeout.saturating_sub(elapsed), Duration::from_secs);
                debug!(%address, remaining_secs = remaining.as_secs(), "waiting for button press");
                let _ = updates.send(PairingOutcome::Pending {
                    time_remaining: remaining,
                });
            }
            Err(e) if e.kind() == ErrorKind::Communication => {
                consecutive_failures += 1;
                warn!(
                    %address,
                    error = %e,
                    consecutive_failures,
                    "push-link status poll failed"
                );
                if consecutive_failures >= config.max_communication_failures {
                    error!(%address, "giving up after repeated communication failures");
                    return PairingOutcome::Failed(PairingFailure::Communication(e.to_string()));
                }
                if elapsed >= config.timeout {
                    return PairingOutcome::Failed(PairingFailure::Timeout);
                }
            }
            Err(e) => {
                error!(%address, error = %e, "push-link status poll returned an unusable response");
                return PairingOutcome::Failed(PairingFailure::Protocol(e.to_string()));
            }
        }
    }
}

fn cancelled(address: &str) -> PairingOutcome {
    info!(%address, "pairing cancelled");
    PairingOutcome::Failed(PairingFailure::Cancelled)
}

fn failure_from(err: &poolsync_api::Error) -> PairingFailure {
    match err.kind() {
        ErrorKind::Communication => PairingFailure::Communication(err.to_string()),
        ErrorKind::Auth | ErrorKind::Protocol => PairingFailure::Protocol(err.to_string()),
    }
}
