use serde::{Deserialize, Serialize};
use tokio::time;

use crate::{controller::CommandAck, decision::VehicleReport, geo::Axis};

use super::error::{ApiError, Result};

/// Identifier used for reports that don't carry one.
pub const UNKNOWN_VEHICLE_ID: &str = "UNKNOWN";

/// Body of `POST /api/vehicle`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleReportBody {
    pub id: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// km/h
    pub speed: Option<f64>,
}

impl VehicleReportBody {
    pub fn into_report(self) -> Result<VehicleReport> {
        let lat = self.lat.ok_or(ApiError::MissingField("lat"))?;
        let lon = self.lon.ok_or(ApiError::MissingField("lon"))?;
        let id = self.id.unwrap_or_else(|| UNKNOWN_VEHICLE_ID.to_string());

        Ok(VehicleReport::new(id, lat, lon).with_speed(self.speed.unwrap_or(0.0)))
    }
}

/// Query of `GET /api/last_event`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastEventQuery {
    pub id: Option<String>,
}

/// Body of `POST /api/priority` and `POST /api/priority_hold`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityBody {
    /// `NS` or `EW`, any case. Defaults to `NS`.
    pub direction: Option<String>,
    /// Seconds, timed priority only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl PriorityBody {
    pub fn new(axis: Axis, duration: Option<time::Duration>) -> Self {
        Self {
            direction: Some(axis.to_string()),
            duration: duration.map(|d| d.as_secs_f64()),
        }
    }

    pub fn axis(&self) -> Result<Axis> {
        match &self.direction {
            Some(direction) => direction
                .trim()
                .parse()
                .map_err(|_| ApiError::InvalidDirection(direction.clone())),
            None => Ok(Axis::NS),
        }
    }

    pub fn duration(&self, default: time::Duration) -> Result<time::Duration> {
        match self.duration {
            Some(secs) => {
                time::Duration::try_from_secs_f64(secs).map_err(|_| ApiError::InvalidDuration(secs))
            }
            None => Ok(default),
        }
    }
}

/// Response of every controller command route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub ack: CommandAck,
}

impl From<CommandAck> for CommandResponse {
    fn from(ack: CommandAck) -> Self {
        Self { ok: true, ack }
    }
}
