use strum::{Display, EnumString};
use tokio::time;

use crate::geo::Axis;

/// Which normal phase the cycle resumes at once a priority ends.
///
/// Whatever the choice, the resumed phase is granted a full phase duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResumePhase {
    /// Restart the alternation from axis A (`NS`).
    #[default]
    AxisA,
    /// Resume the axis whose normal phase was pre-empted.
    PreEmpted,
}

impl ResumePhase {
    pub(crate) fn resume_axis(&self, pre_empted: Axis) -> Axis {
        match self {
            Self::AxisA => Axis::NS,
            Self::PreEmpted => pre_empted,
        }
    }
}

/// Configuration for the [`SignalControllerEngine`](crate::controller::SignalControllerEngine).
#[derive(Clone, Debug)]
pub struct SignalControllerConfig {
    phase_ns: time::Duration,
    phase_ew: time::Duration,
    resume_phase: ResumePhase,
    min_priority_duration: time::Duration,
    actuator_timeout: time::Duration,
    command_buffer: usize,
    shutdown_timeout: time::Duration,
}

impl Default for SignalControllerConfig {
    fn default() -> Self {
        Self {
            phase_ns: time::Duration::from_secs(5),
            phase_ew: time::Duration::from_secs(5),
            resume_phase: ResumePhase::default(),
            min_priority_duration: time::Duration::from_secs(1),
            actuator_timeout: time::Duration::from_secs(2),
            command_buffer: 64,
            shutdown_timeout: time::Duration::from_secs(6),
        }
    }
}

impl SignalControllerConfig {
    /// Returns the green time of the given axis during the normal cycle.
    pub fn phase_duration(&self, axis: Axis) -> time::Duration {
        match axis {
            Axis::NS => self.phase_ns,
            Axis::EW => self.phase_ew,
        }
    }

    /// Returns the phase the cycle resumes at after a priority ends.
    pub fn resume_phase(&self) -> ResumePhase {
        self.resume_phase
    }

    /// Returns the shortest timed priority the controller grants.
    pub fn min_priority_duration(&self) -> time::Duration {
        self.min_priority_duration
    }

    /// Returns the timeout applied to each actuator call.
    pub fn actuator_timeout(&self) -> time::Duration {
        self.actuator_timeout
    }

    /// Returns the capacity of the command queue.
    pub fn command_buffer(&self) -> usize {
        self.command_buffer
    }

    /// Returns the timeout duration for graceful shutdown operations.
    pub fn shutdown_timeout(&self) -> time::Duration {
        self.shutdown_timeout
    }

    /// Sets the green time of the north-south phase.
    ///
    /// Default: `5` seconds
    pub fn with_phase_ns(mut self, secs: u64) -> Self {
        self.phase_ns = time::Duration::from_secs(secs.max(1));
        self
    }

    /// Sets the green time of the east-west phase.
    ///
    /// Default: `5` seconds
    pub fn with_phase_ew(mut self, secs: u64) -> Self {
        self.phase_ew = time::Duration::from_secs(secs.max(1));
        self
    }

    /// Sets the phase the cycle resumes at after a priority ends.
    ///
    /// Default: [`ResumePhase::AxisA`]
    pub fn with_resume_phase(mut self, resume_phase: ResumePhase) -> Self {
        self.resume_phase = resume_phase;
        self
    }

    /// Sets the shortest timed priority the controller grants. Shorter requests are extended.
    ///
    /// Default: `1` second
    pub fn with_min_priority_duration(mut self, secs: u64) -> Self {
        self.min_priority_duration = time::Duration::from_secs(secs);
        self
    }

    /// Sets the timeout applied to each actuator call.
    ///
    /// Default: `2_000` milliseconds
    pub fn with_actuator_timeout(mut self, millis: u64) -> Self {
        self.actuator_timeout = time::Duration::from_millis(millis);
        self
    }

    /// Sets the capacity of the command queue.
    ///
    /// Default: `64`
    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    /// Sets the timeout duration for graceful shutdown operations.
    ///
    /// Default: `6` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = time::Duration::from_secs(secs);
        self
    }
}

#[derive(Debug)]
pub(super) struct SignalControllerHandleConfig {
    shutdown_timeout: time::Duration,
}

impl SignalControllerHandleConfig {
    pub fn shutdown_timeout(&self) -> time::Duration {
        self.shutdown_timeout
    }
}

impl From<&SignalControllerConfig> for SignalControllerHandleConfig {
    fn from(value: &SignalControllerConfig) -> Self {
        Self {
            shutdown_timeout: value.shutdown_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub(super) struct SignalProcessConfig {
    phase_ns: time::Duration,
    phase_ew: time::Duration,
    resume_phase: ResumePhase,
    min_priority_duration: time::Duration,
    actuator_timeout: time::Duration,
}

impl SignalProcessConfig {
    pub fn phase_duration(&self, axis: Axis) -> time::Duration {
        match axis {
            Axis::NS => self.phase_ns,
            Axis::EW => self.phase_ew,
        }
    }

    pub fn resume_phase(&self) -> ResumePhase {
        self.resume_phase
    }

    pub fn min_priority_duration(&self) -> time::Duration {
        self.min_priority_duration
    }

    pub fn actuator_timeout(&self) -> time::Duration {
        self.actuator_timeout
    }
}

impl From<&SignalControllerConfig> for SignalProcessConfig {
    fn from(value: &SignalControllerConfig) -> Self {
        Self {
            phase_ns: value.phase_ns,
            phase_ew: value.phase_ew,
            resume_phase: value.resume_phase,
            min_priority_duration: value.min_priority_duration,
            actuator_timeout: value.actuator_timeout,
        }
    }
}
