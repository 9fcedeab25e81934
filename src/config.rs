use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;
use tokio::time;

use crate::{
    controller::{ResumePhase, SignalControllerConfig},
    decision::{PriorityPolicy, error::DecisionError},
    geo::{Coordinate, error::GeoError},
    notify::NotificationConfig,
    sink::{BlynkConfig, DEFAULT_EVENT_QUEUE_CAPACITY, GpioPins},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for `{key}`: `{value}` ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid intersection coordinate: {0}")]
    Intersection(#[from] GeoError),

    #[error("Invalid priority policy: {0}")]
    Policy(#[from] DecisionError),
}

pub(crate) type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_CONTROLLER_LISTEN_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_CONTROLLER_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Process-wide configuration, read from the environment.
///
/// Unset variables take their defaults. Set but unparsable variables are errors, never silently
/// replaced by defaults.
#[derive(Clone, Debug)]
pub struct AppConfig {
    listen_addr: String,
    controller_listen_addr: String,
    controller_url: String,
    controller_request_timeout: time::Duration,
    policy: PriorityPolicy,
    controller: SignalControllerConfig,
    notification: NotificationConfig,
    simulate: bool,
    gpio_root: PathBuf,
    blynk: Option<BlynkConfig>,
    event_log_path: Option<PathBuf>,
    event_log_timeout: time::Duration,
    event_log_capacity: usize,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };

        let default_policy = PriorityPolicy::default();
        let default_intersection = default_policy.intersection();
        let intersection = Coordinate::new(
            vars.parse("INTERSECTION_LAT")?
                .unwrap_or(default_intersection.lat()),
            vars.parse("INTERSECTION_LON")?
                .unwrap_or(default_intersection.lon()),
        )?;

        let mut policy = default_policy
            .clone()
            .with_intersection(intersection)
            .with_thresholds(
                vars.parse("TRIGGER_THRESHOLD_METERS")?
                    .unwrap_or(default_policy.trigger_threshold_m()),
                vars.parse("RELEASE_THRESHOLD_METERS")?
                    .unwrap_or(default_policy.release_threshold_m()),
            )?;
        if let Some(hold) = vars.parse_bool("HOLD_UNTIL_PASS")? {
            policy = policy.with_hold_until_pass(hold);
        }
        if let Some(secs) = vars.parse("DEFAULT_PRIORITY_SECONDS")? {
            policy = policy.with_default_priority(secs);
        }

        let mut controller = SignalControllerConfig::default();
        if let Some(secs) = vars.parse("CYCLE_NS_SECONDS")? {
            controller = controller.with_phase_ns(secs);
        }
        if let Some(secs) = vars.parse("CYCLE_EW_SECONDS")? {
            controller = controller.with_phase_ew(secs);
        }
        if let Some(resume_phase) = vars.parse::<ResumePhase>("RESUME_PHASE")? {
            controller = controller.with_resume_phase(resume_phase);
        }

        let mut notification = NotificationConfig::default();
        if let Some(millis) = vars.parse("NOTIFY_TOGGLE_MS")? {
            notification = notification.with_toggle_interval(millis);
        }

        let blynk = vars.string("BLYNK_AUTH_TOKEN").map(|token| {
            let config = BlynkConfig::new(token);
            match vars.string("BLYNK_BASE_URL") {
                Some(base_url) => config.with_base_url(base_url),
                None => config,
            }
        });

        let event_log_timeout = vars
            .parse("EVENT_LOG_TIMEOUT_SECONDS")?
            .map(time::Duration::from_secs)
            .unwrap_or(time::Duration::from_secs(5));

        let controller_request_timeout = vars
            .parse("CONTROLLER_REQUEST_TIMEOUT_SECONDS")?
            .map(time::Duration::from_secs)
            .unwrap_or(time::Duration::from_secs(3));

        Ok(Self {
            listen_addr: vars
                .string("GREENLANE_LISTEN_ADDR")
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            controller_listen_addr: vars
                .string("GREENLANE_CONTROLLER_LISTEN_ADDR")
                .unwrap_or_else(|| DEFAULT_CONTROLLER_LISTEN_ADDR.to_string()),
            controller_url: vars
                .string("GREENLANE_CONTROLLER_URL")
                .unwrap_or_else(|| DEFAULT_CONTROLLER_URL.to_string()),
            controller_request_timeout,
            policy,
            controller,
            notification,
            simulate: vars.parse_bool("SIMULATE")?.unwrap_or(true),
            gpio_root: vars
                .string("GPIO_SYSFS_ROOT")
                .unwrap_or_else(|| DEFAULT_GPIO_ROOT.to_string())
                .into(),
            blynk,
            event_log_path: vars.string("EVENT_LOG_PATH").map(PathBuf::from),
            event_log_timeout,
            event_log_capacity: vars
                .parse("EVENT_LOG_QUEUE_CAPACITY")?
                .unwrap_or(DEFAULT_EVENT_QUEUE_CAPACITY),
        })
    }

    /// Address the decision server listens on.
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Address the signal controller service listens on.
    pub fn controller_listen_addr(&self) -> &str {
        &self.controller_listen_addr
    }

    /// Base URL of a remote signal controller service.
    pub fn controller_url(&self) -> &str {
        &self.controller_url
    }

    pub fn controller_request_timeout(&self) -> time::Duration {
        self.controller_request_timeout
    }

    pub fn policy(&self) -> &PriorityPolicy {
        &self.policy
    }

    pub fn controller(&self) -> &SignalControllerConfig {
        &self.controller
    }

    pub fn notification(&self) -> &NotificationConfig {
        &self.notification
    }

    /// Whether signal outputs are only logged instead of written to GPIO.
    pub fn simulate(&self) -> bool {
        self.simulate
    }

    pub fn gpio_root(&self) -> &PathBuf {
        &self.gpio_root
    }

    pub fn gpio_pins(&self) -> GpioPins {
        GpioPins::default()
    }

    /// Blynk notifier settings, present when an auth token is configured.
    pub fn blynk(&self) -> Option<&BlynkConfig> {
        self.blynk.as_ref()
    }

    /// Path of the JSON lines event log. Events are only traced when unset.
    pub fn event_log_path(&self) -> Option<&PathBuf> {
        self.event_log_path.as_ref()
    }

    /// Timeout applied to each event log write.
    pub fn event_log_timeout(&self) -> time::Duration {
        self.event_log_timeout
    }

    /// Records queued for the event log before new ones are dropped.
    pub fn event_log_capacity(&self) -> usize {
        self.event_log_capacity
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, key: &'static str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.string(key) else {
            return Ok(None);
        };

        value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value,
            })
    }

    fn parse_bool(&self, key: &'static str) -> Result<Option<bool>> {
        let Some(value) = self.string(key) else {
            return Ok(None);
        };

        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        }
    }
}
