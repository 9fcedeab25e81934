mod command;
mod config;
mod engine;
pub(crate) mod error;
pub(crate) mod process;
mod state;

pub use command::{CommandAck, SignalCommander};
pub use config::{ResumePhase, SignalControllerConfig};
pub use engine::{SignalController, SignalControllerEngine};
pub use state::{
    SignalControllerStatus, SignalMode, SignalReader, SignalReceiver, SignalState, SignalUpdate,
};
