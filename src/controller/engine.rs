use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc, oneshot,
    },
    time,
};

use crate::{
    geo::Axis,
    sink::{Actuator, EventDispatcher},
    util::AbortOnDropHandle,
};

use super::{
    command::{AckSender, CommandAck, ControllerCommand, SignalCommander},
    config::{SignalControllerConfig, SignalControllerHandleConfig},
    error::{Result, SignalControllerError},
    process::{SignalControllerProcess, error::SignalProcessFatalError},
    state::{
        SignalControllerStatus, SignalReader, SignalReceiver, SignalState, SignalStateManager,
        SignalUpdate,
    },
};

/// Handle to a running signal controller task.
///
/// Commands are queued to the controller task, which owns the signal state and applies them in
/// arrival order. Each command resolves once the controller has acted on it.
#[derive(Debug)]
pub struct SignalController {
    config: SignalControllerHandleConfig,
    command_tx: mpsc::Sender<ControllerCommand>,
    handle: Mutex<Option<AbortOnDropHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    state_manager: Arc<SignalStateManager>,
}

impl SignalController {
    fn new(
        config: &SignalControllerConfig,
        command_tx: mpsc::Sender<ControllerCommand>,
        handle: AbortOnDropHandle<()>,
        shutdown_tx: broadcast::Sender<()>,
        state_manager: Arc<SignalStateManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: config.into(),
            command_tx,
            handle: Mutex::new(Some(handle)),
            shutdown_tx,
            state_manager,
        })
    }

    /// Returns a [`SignalReader`] interface for accessing controller status and state updates.
    pub fn reader(&self) -> Arc<dyn SignalReader> {
        self.state_manager.clone()
    }

    /// Creates a new [`SignalReceiver`] for subscribing to status and state updates.
    pub fn update_receiver(&self) -> SignalReceiver {
        self.state_manager.update_receiver()
    }

    /// Returns the current [`SignalControllerStatus`] as a snapshot.
    pub fn status_snapshot(&self) -> SignalControllerStatus {
        self.state_manager.status_snapshot()
    }

    /// Returns the current [`SignalState`] as a snapshot.
    pub fn state_snapshot(&self) -> SignalState {
        self.state_manager.state_snapshot()
    }

    async fn send_command<F>(&self, build: F) -> Result<CommandAck>
    where
        F: FnOnce(AckSender) -> ControllerCommand,
    {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.command_tx
            .send(build(ack_tx))
            .await
            .map_err(|_| SignalControllerError::CommandRejected(self.status_snapshot()))?;

        ack_rx.await.map_err(|_| SignalControllerError::AckDropped)
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<()>> {
        self.handle
            .lock()
            .expect("`SignalController` mutex can't be poisoned")
            .take()
    }

    /// Tries to perform a clean shutdown of the controller task and consumes the task handle.
    ///
    /// If a clean shutdown fails, the task is aborted. This method can only be called once per
    /// controller instance. On a clean shutdown the outputs are released through
    /// [`Actuator::shutdown`].
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(SignalControllerError::AlreadyShutdown);
        };

        if handle.is_finished() {
            let status = self.state_manager.status_snapshot();
            return Err(SignalControllerError::AlreadyTerminated(status));
        }

        self.state_manager
            .update_status(SignalControllerStatus::ShutdownInitiated);

        let shutdown_send_res = self.shutdown_tx.send(()).map_err(|e| {
            handle.abort();
            SignalProcessFatalError::SendShutdownSignalFailed(e)
        });

        let shutdown_res = match shutdown_send_res {
            Ok(_) => {
                tokio::select! {
                    join_res = &mut handle => {
                        join_res.map_err(SignalProcessFatalError::SignalProcessTaskJoin)
                    }
                    _ = time::sleep(self.config.shutdown_timeout()) => {
                        handle.abort();
                        Err(SignalProcessFatalError::ShutdownTimeout)
                    }
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = shutdown_res {
            let e_ref = Arc::new(e);
            self.state_manager.update_status(e_ref.clone().into());

            return Err(SignalControllerError::ShutdownFailed(e_ref));
        }

        self.state_manager
            .update_status(SignalControllerStatus::Shutdown);
        Ok(())
    }

    /// Waits until the controller task has stopped and returns the final status.
    pub async fn until_stopped(&self) -> SignalControllerStatus {
        let mut update_rx = self.update_receiver();

        let status = self.status_snapshot();
        if status.is_stopped() {
            return status;
        }

        loop {
            match update_rx.recv().await {
                Ok(SignalUpdate::Status(status)) if status.is_stopped() => return status,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    let status = self.status_snapshot();
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(RecvError::Closed) => return self.status_snapshot(),
            }
        }
    }
}

#[async_trait]
impl SignalCommander for SignalController {
    async fn engage(&self, axis: Axis, duration: time::Duration) -> Result<CommandAck> {
        self.send_command(|ack| ControllerCommand::Engage {
            axis,
            duration,
            ack,
        })
        .await
    }

    async fn engage_hold(&self, axis: Axis) -> Result<CommandAck> {
        self.send_command(|ack| ControllerCommand::EngageHold { axis, ack })
            .await
    }

    async fn release(&self) -> Result<CommandAck> {
        self.send_command(|ack| ControllerCommand::Release { ack })
            .await
    }

    async fn state(&self) -> Result<SignalState> {
        Ok(self.state_snapshot())
    }
}

/// Builder for configuring and starting a signal controller.
///
/// The controller task is spawned when [`start`](Self::start) is called, and a
/// [`SignalController`] is returned for commanding and monitoring it.
pub struct SignalControllerEngine {
    config: SignalControllerConfig,
    actuator: Arc<dyn Actuator>,
    events: Arc<EventDispatcher>,
    state_manager: Arc<SignalStateManager>,
}

impl SignalControllerEngine {
    /// Creates a new signal controller engine driving the given actuator.
    pub fn new(
        config: impl Into<SignalControllerConfig>,
        actuator: Arc<dyn Actuator>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        let (update_tx, _) = broadcast::channel::<SignalUpdate>(1_000);
        let state_manager = SignalStateManager::new(update_tx);

        Self {
            config: config.into(),
            actuator,
            events,
            state_manager,
        }
    }

    /// Returns a reader interface for accessing controller status and state updates.
    pub fn reader(&self) -> Arc<dyn SignalReader> {
        self.state_manager.clone()
    }

    /// Creates a new receiver for subscribing to status and state updates.
    pub fn update_receiver(&self) -> SignalReceiver {
        self.state_manager.update_receiver()
    }

    /// Starts the controller task in `Normal(NS)` and returns a [`SignalController`] for managing
    /// it.
    pub fn start(self) -> Arc<SignalController> {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer());

        let handle = SignalControllerProcess::spawn(
            &self.config,
            self.actuator,
            self.events,
            command_rx,
            &shutdown_tx,
            self.state_manager.clone(),
        );

        SignalController::new(
            &self.config,
            command_tx,
            handle,
            shutdown_tx,
            self.state_manager,
        )
    }
}
