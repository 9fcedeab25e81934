mod config;
mod engine;
pub(crate) mod error;
mod state;

pub use config::PriorityPolicy;
pub use engine::DecisionEngine;
pub use state::{EventStatus, ReportResponse, VehicleEvent, VehicleReport, VehicleState};

#[cfg(test)]
mod tests;
