#![doc = include_str!("../README.md")]

/// Exports the HTTP routers of the decision server and the signal controller service, and
/// [`RemoteSignalController`], the HTTP client of the latter.
///
/// [`RemoteSignalController`]: crate::api::RemoteSignalController
pub mod api;
/// Exports [`AppConfig`], the environment-driven process configuration.
///
/// [`AppConfig`]: crate::config::AppConfig
pub mod config;
/// Exports [`SignalControllerEngine`], [`SignalController`], and other types related to the
/// pre-emptable two-phase signal cycle.
///
/// [`SignalControllerEngine`]: crate::controller::SignalControllerEngine
/// [`SignalController`]: crate::controller::SignalController
pub mod controller;
/// Exports [`DecisionEngine`] and the types describing vehicle reports and their outcomes.
///
/// [`DecisionEngine`]: crate::decision::DecisionEngine
pub mod decision;
/// Exports [`Coordinate`], [`Axis`] and the great-circle computations used to classify an
/// approaching vehicle.
///
/// [`Coordinate`]: crate::geo::Coordinate
/// [`Axis`]: crate::geo::Axis
pub mod geo;
/// Exports [`NotificationCoordinator`], which runs one blinking alert session per vehicle.
///
/// [`NotificationCoordinator`]: crate::notify::NotificationCoordinator
pub mod notify;
/// Exports the [`Actuator`], [`NotificationSink`] and [`EventLog`] collaborator traits and their
/// implementations.
///
/// [`Actuator`]: crate::sink::Actuator
/// [`NotificationSink`]: crate::sink::NotificationSink
/// [`EventLog`]: crate::sink::EventLog
pub mod sink;
mod util;

/// Error types returned by `greenlane`.
pub mod error {
    pub use super::api::error::ApiError;
    pub use super::config::ConfigError;
    pub use super::controller::{
        error::SignalControllerError, process::error::SignalProcessFatalError,
    };
    pub use super::decision::error::DecisionError;
    pub use super::geo::error::GeoError;
    pub use super::notify::error::NotifyError;
    pub use super::sink::error::SinkError;
    pub use super::util::PanicPayload;

    /// Convenience general-purpose Result type alias.
    pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
}
