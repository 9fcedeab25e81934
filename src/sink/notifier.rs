use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::time;
use tracing::{debug, info};
use uuid::Uuid;

use crate::geo::Axis;

use super::error::{SinkError, SinkResult};

/// Kind of emergency vehicle, derived from its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum VehicleKind {
    Ambulance,
    Firetruck,
}

impl VehicleKind {
    /// Identifiers containing `AMB` (any case) are ambulances, everything else is a fire truck.
    pub fn from_vehicle_id(vehicle_id: &str) -> Self {
        if vehicle_id.to_ascii_uppercase().contains("AMB") {
            Self::Ambulance
        } else {
            Self::Firetruck
        }
    }

    /// Display color as `RRGGBB`.
    pub const fn color_code(&self) -> &'static str {
        match self {
            Self::Ambulance => "3B82F6",
            Self::Firetruck => "EF4444",
        }
    }
}

/// Live data shown alongside an active alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertMetadata {
    pub axis: Axis,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum AlertUpdateKind {
    /// First update of a session, raises the alert.
    AlertOn,
    /// Metadata refreshed while the alert is active.
    Refresh,
    /// Periodic blinker toggle.
    Toggle,
    /// Last update of a session, clears the alert.
    AlertOff,
}

/// Structured update delivered to a [`NotificationSink`].
#[derive(Debug, Clone, Serialize)]
pub struct AlertUpdate {
    pub session_id: Uuid,
    pub kind: AlertUpdateKind,
    pub vehicle_id: String,
    pub vehicle_kind: VehicleKind,
    pub axis: Axis,
    pub distance_m: f64,
    /// Current blinker level. `true` while raising the alert, `false` when clearing it.
    pub output: bool,
    pub time: DateTime<Utc>,
}

impl AlertUpdate {
    pub fn new(
        session_id: Uuid,
        kind: AlertUpdateKind,
        vehicle_id: &str,
        metadata: AlertMetadata,
        output: bool,
    ) -> Self {
        Self {
            session_id,
            kind,
            vehicle_id: vehicle_id.to_string(),
            vehicle_kind: VehicleKind::from_vehicle_id(vehicle_id),
            axis: metadata.axis,
            distance_m: metadata.distance_m,
            output,
            time: Utc::now(),
        }
    }
}

impl fmt::Display for AlertUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) axis={} distance={:.1}m output={}",
            self.kind,
            self.vehicle_kind,
            self.vehicle_id,
            self.axis,
            self.distance_m,
            self.output
        )
    }
}

/// Alert sink (cloud dashboard widget, buzzer, ...). Delivery is fire-and-forget.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, update: &AlertUpdate) -> SinkResult<()>;
}

/// Sink that only emits log lines.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn publish(&self, update: &AlertUpdate) -> SinkResult<()> {
        match update.kind {
            AlertUpdateKind::Toggle => debug!(session = %update.session_id, "{update}"),
            _ => info!(session = %update.session_id, "{update}"),
        }
        Ok(())
    }
}

/// Configuration for the [`BlynkNotifier`].
#[derive(Clone, Debug)]
pub struct BlynkConfig {
    base_url: String,
    auth_token: String,
    request_timeout: time::Duration,
}

impl BlynkConfig {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            base_url: "https://blynk.cloud/external/api".to_string(),
            auth_token: auth_token.into(),
            request_timeout: time::Duration::from_secs(5),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> time::Duration {
        self.request_timeout
    }

    /// Sets the base URL of the Blynk external API.
    ///
    /// Default: `https://blynk.cloud/external/api`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the HTTP request timeout.
    ///
    /// Default: `5` seconds
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = time::Duration::from_secs(secs);
        self
    }
}

/// Virtual pins of the alert dashboard.
mod vpin {
    pub const ALERT_STATUS: &str = "V0";
    pub const VEHICLE_NAME: &str = "V1";
    pub const VEHICLE_ID: &str = "V2";
    pub const DIRECTION: &str = "V3";
    pub const DISTANCE: &str = "V4";
    pub const BUZZER: &str = "V5";
    pub const LED: &str = "V6";
    pub const COLOR: &str = "V7";
}

/// Sink pushing alert state to a Blynk dashboard through its batch `update` endpoint.
pub struct BlynkNotifier {
    config: BlynkConfig,
    client: reqwest::Client,
}

impl BlynkNotifier {
    pub fn new(config: BlynkConfig) -> SinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { config, client })
    }

    pub(super) fn pin_values(update: &AlertUpdate) -> Vec<(&'static str, String)> {
        let metadata = || {
            vec![
                (vpin::VEHICLE_NAME, update.vehicle_kind.to_string()),
                (vpin::VEHICLE_ID, update.vehicle_id.clone()),
                (vpin::DIRECTION, update.axis.to_string()),
                (vpin::DISTANCE, format!("{:.1}", update.distance_m)),
                (vpin::COLOR, update.vehicle_kind.color_code().to_string()),
            ]
        };

        match update.kind {
            AlertUpdateKind::AlertOn => {
                let mut values = vec![
                    (vpin::ALERT_STATUS, "1".to_string()),
                    (vpin::BUZZER, "1".to_string()),
                    (vpin::LED, "255".to_string()),
                ];
                values.extend(metadata());
                values
            }
            AlertUpdateKind::Refresh => metadata(),
            AlertUpdateKind::Toggle => {
                let led = if update.output { "255" } else { "0" };
                vec![(vpin::LED, led.to_string())]
            }
            AlertUpdateKind::AlertOff => vec![
                (vpin::ALERT_STATUS, "0".to_string()),
                (vpin::BUZZER, "0".to_string()),
                (vpin::LED, "0".to_string()),
            ],
        }
    }
}

#[async_trait]
impl NotificationSink for BlynkNotifier {
    async fn publish(&self, update: &AlertUpdate) -> SinkResult<()> {
        let mut query = vec![("token", self.config.auth_token.clone())];
        query.extend(Self::pin_values(update));

        let response = self
            .client
            .get(format!("{}/batch/update", self.config.base_url()))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(120).collect(),
            });
        }

        debug!(kind = %update.kind, vehicle = %update.vehicle_id, "Blynk update delivered");
        Ok(())
    }
}
