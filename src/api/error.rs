use std::{io, result};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{controller::error::SignalControllerError, decision::error::DecisionError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid direction `{0}`, expected `NS` or `EW`")]
    InvalidDirection(String),

    #[error("Invalid priority duration {0}")]
    InvalidDuration(f64),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Controller(#[from] SignalControllerError),

    #[error("Failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("HTTP server error: {0}")]
    Serve(io::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_)
            | Self::MissingField(_)
            | Self::InvalidDirection(_)
            | Self::InvalidDuration(_)
            | Self::Decision(_) => StatusCode::BAD_REQUEST,
            Self::Controller(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Bind { .. } | Self::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub(crate) type Result<T> = result::Result<T, ApiError>;
