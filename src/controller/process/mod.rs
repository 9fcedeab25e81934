use std::{future, sync::Arc};

use chrono::Utc;
use tokio::{
    sync::{broadcast, mpsc},
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    geo::Axis,
    sink::{Actuator, EventDispatcher, LogRecord, guarded},
    util::{AbortOnDropHandle, Never},
};

use super::{
    command::{CommandAck, ControllerCommand},
    config::{SignalControllerConfig, SignalProcessConfig},
    state::{SignalControllerStatus, SignalState, SignalStateManager},
};

pub(crate) mod error;

use error::{ProcessResult, SignalProcessFatalError};

/// Far-future deadline used when a requested priority duration overflows the clock.
const FAR_FUTURE: time::Duration = time::Duration::from_secs(86_400 * 365 * 30);

/// Internal timing regime backing the published [`SignalState`].
#[derive(Debug, Clone, Copy)]
enum Regime {
    Normal {
        axis: Axis,
        phase_ends: Instant,
    },
    Timed {
        axis: Axis,
        expires: Instant,
        pre_empted: Axis,
    },
    Held {
        axis: Axis,
        pre_empted: Axis,
    },
}

impl Regime {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Normal { phase_ends, .. } => Some(*phase_ends),
            Self::Timed { expires, .. } => Some(*expires),
            Self::Held { .. } => None,
        }
    }

    fn priority_axis(&self) -> Option<Axis> {
        match self {
            Self::Normal { .. } => None,
            Self::Timed { axis, .. } | Self::Held { axis, .. } => Some(*axis),
        }
    }

    /// Normal-cycle axis that was (or is) running when priority took over.
    fn pre_empted_axis(&self) -> Axis {
        match self {
            Self::Normal { axis, .. } => *axis,
            Self::Timed { pre_empted, .. } | Self::Held { pre_empted, .. } => *pre_empted,
        }
    }
}

pub(super) struct SignalControllerProcess {
    config: SignalProcessConfig,
    actuator: Arc<dyn Actuator>,
    events: Arc<EventDispatcher>,
    command_rx: mpsc::Receiver<ControllerCommand>,
    state_manager: Arc<SignalStateManager>,
    regime: Regime,
    state: SignalState,
}

impl SignalControllerProcess {
    pub fn spawn(
        config: &SignalControllerConfig,
        actuator: Arc<dyn Actuator>,
        events: Arc<EventDispatcher>,
        command_rx: mpsc::Receiver<ControllerCommand>,
        shutdown_tx: &broadcast::Sender<()>,
        state_manager: Arc<SignalStateManager>,
    ) -> AbortOnDropHandle<()> {
        let config: SignalProcessConfig = config.into();

        // Subscribed before spawning so an early shutdown request can't be missed
        let shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let process = Self {
                regime: Regime::Normal {
                    axis: Axis::NS,
                    phase_ends: Instant::now() + config.phase_duration(Axis::NS),
                },
                config,
                actuator,
                events,
                command_rx,
                state_manager,
                state: SignalState::initial(),
            };

            process.event_loop(shutdown_rx).await
        })
        .into()
    }

    async fn event_loop(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        self.state_manager
            .update_status(SignalControllerStatus::Running);

        let fatal_error = tokio::select! {
            Err(e) = self.run() => e,
            shutdown_res = shutdown_rx.recv() => {
                let Err(e) = shutdown_res else {
                    // Shutdown signal received
                    info!(state = %self.state, "signal controller stopping");
                    self.release_outputs().await;
                    return;
                };

                SignalProcessFatalError::ShutdownSignalRecv(e)
            }
        };

        error!(error = %fatal_error, "signal controller terminated");
        self.state_manager.update_status(fatal_error.into());
    }

    async fn run(&mut self) -> ProcessResult<Never> {
        self.enter_normal(Axis::NS).await;
        self.events
            .dispatch(LogRecord::ControllerStateChange(self.state.clone()));
        info!(state = %self.state, "signal controller running");

        loop {
            let deadline = self.regime.deadline();

            tokio::select! {
                // Commands win over an expired deadline, so pre-emption is never deferred
                biased;

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        return Err(SignalProcessFatalError::CommandChannelClosed);
                    };
                    self.handle_command(command).await;
                }
                _ = Self::wait_until(deadline) => self.handle_deadline().await,
            }
        }
    }

    async fn wait_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => future::pending::<()>().await,
        }
    }

    async fn handle_command(&mut self, command: ControllerCommand) {
        let (changed, ack) = match command {
            ControllerCommand::Engage {
                axis,
                duration,
                ack,
            } => {
                let duration = duration.max(self.config.min_priority_duration());
                (self.engage(axis, Some(duration)).await, ack)
            }
            ControllerCommand::EngageHold { axis, ack } => (self.engage(axis, None).await, ack),
            ControllerCommand::Release { ack } => (self.release().await, ack),
        };

        // Requester may have given up waiting
        let _ = ack.send(CommandAck::new(&self.state, changed));
    }

    /// Enters priority for `axis`, timed when `duration` is set, held otherwise.
    async fn engage(&mut self, axis: Axis, duration: Option<time::Duration>) -> bool {
        let already_green = self.regime.priority_axis() == Some(axis);
        let pre_empted = self.regime.pre_empted_axis();

        let new_state = match duration {
            Some(duration) => {
                let now = Instant::now();
                let expires = now
                    .checked_add(duration)
                    .unwrap_or_else(|| now + FAR_FUTURE);
                self.regime = Regime::Timed {
                    axis,
                    expires,
                    pre_empted,
                };

                let expires_at = chrono::Duration::from_std(duration)
                    .ok()
                    .and_then(|d| Utc::now().checked_add_signed(d));
                SignalState::timed(axis, expires_at)
            }
            None => {
                self.regime = Regime::Held { axis, pre_empted };
                SignalState::held(axis)
            }
        };

        if already_green {
            debug!(%axis, "priority refreshed");
        }

        // Re-engaging the axis that already has priority must not touch the outputs
        self.transition(new_state, !already_green).await
    }

    async fn release(&mut self) -> bool {
        match self.regime {
            Regime::Held { pre_empted, .. } => {
                let axis = self.config.resume_phase().resume_axis(pre_empted);
                info!(resume = %axis, "held priority released");
                self.enter_normal(axis).await
            }
            Regime::Timed { .. } => {
                debug!("release ignored, timed priority expires on its own");
                false
            }
            Regime::Normal { .. } => {
                debug!("release ignored, no priority engaged");
                false
            }
        }
    }

    async fn handle_deadline(&mut self) {
        match self.regime {
            Regime::Normal { axis, .. } => {
                self.enter_normal(axis.other()).await;
            }
            Regime::Timed {
                axis, pre_empted, ..
            } => {
                let resume = self.config.resume_phase().resume_axis(pre_empted);
                info!(%axis, %resume, "timed priority expired");
                self.enter_normal(resume).await;
            }
            Regime::Held { .. } => {}
        }
    }

    async fn enter_normal(&mut self, axis: Axis) -> bool {
        self.regime = Regime::Normal {
            axis,
            phase_ends: Instant::now() + self.config.phase_duration(axis),
        };

        self.transition(SignalState::normal(axis), true).await
    }

    /// Applies `new_state`, optionally driving the outputs, and publishes it. Returns whether
    /// mode, axis or hold flag changed.
    async fn transition(&mut self, new_state: SignalState, drive_outputs: bool) -> bool {
        let changed = new_state.differs_from(&self.state);
        let new_state = if changed {
            new_state
        } else {
            new_state.keep_since(&self.state)
        };

        if drive_outputs {
            self.drive_outputs(new_state.axis()).await;
        }

        self.state = new_state.clone();
        self.state_manager.publish_state(new_state.clone());

        if changed {
            debug!(state = %new_state, "signal state change");
            self.events
                .dispatch(LogRecord::ControllerStateChange(new_state));
        }

        changed
    }

    async fn release_outputs(&self) {
        let res = guarded(self.config.actuator_timeout(), self.actuator.shutdown()).await;

        if let Err(e) = res {
            warn!(error = %e, "actuator failed to release outputs");
        }
    }

    async fn drive_outputs(&self, axis: Axis) {
        let (ns_green, ew_green) = axis.green_outputs();

        let res = guarded(
            self.config.actuator_timeout(),
            self.actuator.set_outputs(ns_green, ew_green),
        )
        .await;

        if let Err(e) = res {
            warn!(error = %e, ns_green, ew_green, "actuator failed to set outputs");
        }
    }
}
