use std::{io, result};

use thiserror::Error;
use tokio::time;

use crate::util::PanicPayload;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("[Io] {0}")]
    Io(#[from] io::Error),

    #[error("[Http] {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("[Serialize] {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Collaborator call timed out after {0:?}")]
    Timeout(time::Duration),

    #[error("Collaborator call panicked: {0}")]
    Panicked(PanicPayload),
}

pub(crate) type SinkResult<T> = result::Result<T, SinkError>;
