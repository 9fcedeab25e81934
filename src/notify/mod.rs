mod config;
mod coordinator;
pub(crate) mod error;
mod session;

pub use config::NotificationConfig;
pub use coordinator::NotificationCoordinator;
