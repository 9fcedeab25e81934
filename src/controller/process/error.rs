use std::result;

use thiserror::Error;
use tokio::{
    sync::broadcast::error::{RecvError, SendError},
    task::JoinError,
};

#[derive(Error, Debug)]
pub enum SignalProcessFatalError {
    #[error("Command channel closed")]
    CommandChannelClosed,

    #[error("TaskJoin error {0}")]
    SignalProcessTaskJoin(JoinError),

    #[error("Shutdown `RecvError` error: {0}")]
    ShutdownSignalRecv(RecvError),

    #[error("Failed to send signal controller shutdown request error: {0}")]
    SendShutdownSignalFailed(SendError<()>),

    #[error("Signal controller shutdown timeout error")]
    ShutdownTimeout,
}

pub(crate) type ProcessResult<T> = result::Result<T, SignalProcessFatalError>;
