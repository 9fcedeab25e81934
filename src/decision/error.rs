use std::result;

use thiserror::Error;

use crate::geo::error::GeoError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("Malformed vehicle report: {0}")]
    MalformedReport(#[from] GeoError),

    #[error("Malformed vehicle report: empty vehicle id")]
    EmptyVehicleId,

    #[error("Trigger threshold must be a positive number of meters, got {0}")]
    InvalidTriggerThreshold(f64),

    #[error("Release threshold ({release_m} m) must exceed the trigger threshold ({trigger_m} m)")]
    InvalidReleaseThreshold { trigger_m: f64, release_m: f64 },
}

pub(crate) type Result<T> = result::Result<T, DecisionError>;
