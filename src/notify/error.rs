use std::result;

use thiserror::Error;
use tokio::{task::JoinError, time};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Alert session for `{vehicle_id}` did not stop within {timeout:?}, aborted")]
    StopTimeout {
        vehicle_id: String,
        timeout: time::Duration,
    },

    #[error("Alert session for `{vehicle_id}` TaskJoin error {source}")]
    SessionTaskJoin {
        vehicle_id: String,
        source: JoinError,
    },
}

pub(crate) type Result<T> = result::Result<T, NotifyError>;
