use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::broadcast;

use crate::geo::Axis;

use super::process::error::SignalProcessFatalError;

/// Operating mode of the signal controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignalMode {
    /// Autonomous alternation between the two axes.
    Normal,
    /// Pre-empted by a priority command.
    Priority,
}

/// Authoritative signal state. Only the controller task ever produces new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    mode: SignalMode,
    #[serde(rename = "direction")]
    axis: Axis,
    hold: bool,
    since: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl SignalState {
    /// `Normal(NS)`, the state every controller starts in.
    pub fn initial() -> Self {
        Self::normal(Axis::NS)
    }

    pub(crate) fn normal(axis: Axis) -> Self {
        Self {
            mode: SignalMode::Normal,
            axis,
            hold: false,
            since: Utc::now(),
            expires_at: None,
        }
    }

    pub(crate) fn timed(axis: Axis, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            mode: SignalMode::Priority,
            axis,
            hold: false,
            since: Utc::now(),
            expires_at,
        }
    }

    pub(crate) fn held(axis: Axis) -> Self {
        Self {
            mode: SignalMode::Priority,
            axis,
            hold: true,
            since: Utc::now(),
            expires_at: None,
        }
    }

    pub fn mode(&self) -> SignalMode {
        self.mode
    }

    /// Axis currently holding right of way.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// `true` while a priority is held until an explicit release.
    pub fn hold(&self) -> bool {
        self.hold
    }

    /// When the current mode/axis was entered.
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Expiry of a timed priority.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_priority(&self) -> bool {
        self.mode == SignalMode::Priority
    }

    /// Whether `other` differs in mode, axis or hold flag. Timer refreshes don't count.
    pub fn differs_from(&self, other: &SignalState) -> bool {
        self.mode != other.mode || self.axis != other.axis || self.hold != other.hold
    }

    pub(crate) fn keep_since(mut self, previous: &SignalState) -> Self {
        self.since = previous.since;
        self
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.mode, self.hold) {
            (SignalMode::Normal, _) => write!(f, "Normal({})", self.axis),
            (SignalMode::Priority, true) => write!(f, "Priority({}, held)", self.axis),
            (SignalMode::Priority, false) => write!(f, "Priority({}, timed)", self.axis),
        }
    }
}

/// Lifecycle status of the signal controller task.
#[derive(Debug, Clone)]
pub enum SignalControllerStatus {
    /// Controller task has not been started yet.
    NotInitiated,
    /// Controller task is cycling and accepting commands.
    Running,
    /// Shutdown has been requested and is in progress.
    ShutdownInitiated,
    /// Controller task has been gracefully shut down.
    Shutdown,
    /// Controller task terminated due to a fatal error.
    Terminated(Arc<SignalProcessFatalError>),
}

impl SignalControllerStatus {
    /// Returns `true` if the controller has stopped (either shut down or terminated).
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Shutdown | Self::Terminated(_))
    }
}

impl fmt::Display for SignalControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitiated => write!(f, "Not initiated"),
            Self::Running => write!(f, "Running"),
            Self::ShutdownInitiated => write!(f, "Shutdown initiated"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Terminated(error) => write!(f, "Terminated: {error}"),
        }
    }
}

impl From<Arc<SignalProcessFatalError>> for SignalControllerStatus {
    fn from(value: Arc<SignalProcessFatalError>) -> Self {
        Self::Terminated(value)
    }
}

impl From<SignalProcessFatalError> for SignalControllerStatus {
    fn from(value: SignalProcessFatalError) -> Self {
        Arc::new(value).into()
    }
}

/// Update events emitted by the signal controller.
#[derive(Debug, Clone)]
pub enum SignalUpdate {
    /// Controller lifecycle status has changed.
    Status(SignalControllerStatus),
    /// Signal state has changed, or a priority timer/hold was refreshed.
    State(SignalState),
}

impl From<SignalControllerStatus> for SignalUpdate {
    fn from(value: SignalControllerStatus) -> Self {
        Self::Status(value)
    }
}

impl From<SignalState> for SignalUpdate {
    fn from(value: SignalState) -> Self {
        Self::State(value)
    }
}

pub(crate) type SignalTransmitter = broadcast::Sender<SignalUpdate>;

/// Receiver for subscribing to [`SignalUpdate`]s.
pub type SignalReceiver = broadcast::Receiver<SignalUpdate>;

/// Read-only view of the signal controller.
pub trait SignalReader: Send + Sync + 'static {
    /// Creates a new [`SignalReceiver`] for subscribing to controller updates.
    fn update_receiver(&self) -> SignalReceiver;

    /// Returns the current [`SignalControllerStatus`] as a snapshot.
    fn status_snapshot(&self) -> SignalControllerStatus;

    /// Returns the current [`SignalState`] as a snapshot.
    fn state_snapshot(&self) -> SignalState;
}

#[derive(Debug)]
pub(crate) struct SignalStateManager {
    status: Mutex<SignalControllerStatus>,
    state: Mutex<SignalState>,
    update_tx: SignalTransmitter,
}

impl SignalStateManager {
    pub fn new(update_tx: SignalTransmitter) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(SignalControllerStatus::NotInitiated),
            state: Mutex::new(SignalState::initial()),
            update_tx,
        })
    }

    fn lock_status(&self) -> MutexGuard<'_, SignalControllerStatus> {
        self.status
            .lock()
            .expect("`SignalStateManager` status mutex can't be poisoned")
    }

    fn lock_state(&self) -> MutexGuard<'_, SignalState> {
        self.state
            .lock()
            .expect("`SignalStateManager` state mutex can't be poisoned")
    }

    pub fn update_status(&self, new_status: SignalControllerStatus) {
        let mut status_guard = self.lock_status();
        *status_guard = new_status.clone();
        drop(status_guard);

        // Ignore no-receivers errors
        let _ = self.update_tx.send(new_status.into());
    }

    /// Publishes a new state. Must only be called from the controller task.
    pub fn publish_state(&self, new_state: SignalState) {
        let mut state_guard = self.lock_state();
        *state_guard = new_state.clone();
        drop(state_guard);

        let _ = self.update_tx.send(new_state.into());
    }
}

impl SignalReader for SignalStateManager {
    fn update_receiver(&self) -> SignalReceiver {
        self.update_tx.subscribe()
    }

    fn status_snapshot(&self) -> SignalControllerStatus {
        self.lock_status().clone()
    }

    fn state_snapshot(&self) -> SignalState {
        self.lock_state().clone()
    }
}
