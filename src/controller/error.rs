use std::{result, sync::Arc};

use thiserror::Error;

use super::{process::error::SignalProcessFatalError, state::SignalControllerStatus};

#[derive(Error, Debug)]
pub enum SignalControllerError {
    #[error("Signal controller already shutdown error")]
    AlreadyShutdown,

    #[error("Signal controller already terminated error, status: {0}")]
    AlreadyTerminated(SignalControllerStatus),

    #[error("Signal controller shutdown procedure failed: {0}")]
    ShutdownFailed(Arc<SignalProcessFatalError>),

    #[error("Signal controller is not accepting commands, status: {0}")]
    CommandRejected(SignalControllerStatus),

    #[error("Signal controller dropped the command acknowledgement")]
    AckDropped,

    #[error("[RemoteRequest] {0}")]
    RemoteRequest(#[from] reqwest::Error),

    #[error("Remote signal controller responded with status {status}: {body}")]
    RemoteStatus { status: u16, body: String },
}

pub(crate) type Result<T> = result::Result<T, SignalControllerError>;
