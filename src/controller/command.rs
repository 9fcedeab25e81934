use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, time};

use crate::geo::Axis;

use super::{
    error::Result,
    state::{SignalMode, SignalState},
};

/// Acknowledgement of a controller command, carrying the resulting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub mode: SignalMode,
    #[serde(rename = "direction")]
    pub axis: Axis,
    pub hold: bool,
    /// Whether the command changed mode, axis or hold flag.
    pub changed: bool,
}

impl CommandAck {
    pub(crate) fn new(state: &SignalState, changed: bool) -> Self {
        Self {
            mode: state.mode(),
            axis: state.axis(),
            hold: state.hold(),
            changed,
        }
    }
}

/// Anything that accepts signal priority commands: the in-process
/// [`SignalController`](crate::controller::SignalController) or a remote one reached over HTTP.
#[async_trait]
pub trait SignalCommander: Send + Sync {
    /// Grants priority to `axis` for `duration`, after which the normal cycle resumes.
    async fn engage(&self, axis: Axis, duration: time::Duration) -> Result<CommandAck>;

    /// Grants priority to `axis` until [`release`](Self::release) is called.
    async fn engage_hold(&self, axis: Axis) -> Result<CommandAck>;

    /// Ends a held priority. No-op for timed priorities, which expire on their own.
    async fn release(&self) -> Result<CommandAck>;

    /// Returns the current signal state.
    async fn state(&self) -> Result<SignalState>;
}

pub(super) type AckSender = oneshot::Sender<CommandAck>;

#[derive(Debug)]
pub(super) enum ControllerCommand {
    Engage {
        axis: Axis,
        duration: time::Duration,
        ack: AckSender,
    },
    EngageHold {
        axis: Axis,
        ack: AckSender,
    },
    Release {
        ack: AckSender,
    },
}
