use std::future::Future;

use tokio::time;

use crate::util::catch_panic;

mod actuator;
pub(crate) mod error;
mod event_log;
mod notifier;

pub use actuator::{Actuator, GpioActuator, GpioPins, SimulatedActuator};
pub use event_log::{
    DEFAULT_EVENT_QUEUE_CAPACITY, EventDispatcher, EventLog, JsonlEventLog, LogRecord,
    TracingEventLog,
};
pub use notifier::{
    AlertMetadata, AlertUpdate, AlertUpdateKind, BlynkConfig, BlynkNotifier, NotificationSink,
    TracingNotifier, VehicleKind,
};

use error::{SinkError, SinkResult};

/// Runs a collaborator call with a timeout and panic protection.
///
/// Collaborators are advisory side effects: whatever goes wrong inside them surfaces as a
/// [`SinkError`] for the caller to log, never as a panic or an unbounded wait.
pub(crate) async fn guarded<F>(timeout: time::Duration, fut: F) -> SinkResult<()>
where
    F: Future<Output = SinkResult<()>>,
{
    match time::timeout(timeout, catch_panic(fut)).await {
        Ok(Ok(res)) => res,
        Ok(Err(payload)) => Err(SinkError::Panicked(payload)),
        Err(_) => Err(SinkError::Timeout(timeout)),
    }
}
