mod client;
pub(crate) mod error;
mod models;
mod server;

pub use client::RemoteSignalController;
pub use models::{
    CommandResponse, LastEventQuery, PriorityBody, UNKNOWN_VEHICLE_ID, VehicleReportBody,
};
pub use server::{bind, controller_router, health_router, report_router, serve};

#[cfg(test)]
mod tests;
