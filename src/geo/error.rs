use std::result;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Invalid latitude {0}, must be a finite value within [-90, 90]")]
    InvalidLatitude(f64),

    #[error("Invalid longitude {0}, must be a finite value within [-180, 180]")]
    InvalidLongitude(f64),

    #[error("Approach computation produced a non-finite {quantity}")]
    NonFinite { quantity: &'static str },
}

pub(crate) type Result<T> = result::Result<T, GeoError>;
