use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::geo::{Approach, Axis};

/// Position report received from a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleReport {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Reported speed in km/h, informational only.
    pub speed_kmh: f64,
    pub received_at: DateTime<Utc>,
}

impl VehicleReport {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
            speed_kmh: 0.0,
            received_at: Utc::now(),
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }
}

/// Latest known state of one vehicle, as last decided by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub last_report: VehicleReport,
    pub approach: Approach,
    /// Whether an alert session is running for the vehicle.
    pub alert_active: bool,
    /// Whether the last report was inside the trigger threshold.
    pub priority_triggered: bool,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a report, as seen by the reporting vehicle and the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventStatus {
    Normal,
    PriorityTriggered,
    /// No report has been processed for the queried vehicle.
    Unknown,
}

impl EventStatus {
    pub(crate) fn from_triggered(triggered: bool) -> Self {
        if triggered {
            Self::PriorityTriggered
        } else {
            Self::Normal
        }
    }
}

/// Record of one processed report, returned by the event queries and written to the event log.
///
/// Fields are optional so that "nothing known yet" is expressible as an all-null record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleEvent {
    pub ts: Option<DateTime<Utc>>,
    pub vehicle: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub distance_m: Option<f64>,
    pub bearing: Option<f64>,
    pub direction: Option<Axis>,
    pub priority_triggered: bool,
    pub alert_active: bool,
    pub status: EventStatus,
}

impl VehicleEvent {
    /// All-null record, optionally carrying the queried vehicle id.
    pub fn unknown(vehicle: Option<&str>) -> Self {
        Self {
            ts: None,
            vehicle: vehicle.map(str::to_string),
            lat: None,
            lon: None,
            speed_kmh: None,
            distance_m: None,
            bearing: None,
            direction: None,
            priority_triggered: false,
            alert_active: false,
            status: EventStatus::Unknown,
        }
    }
}

impl From<&VehicleState> for VehicleEvent {
    fn from(state: &VehicleState) -> Self {
        let report = &state.last_report;

        Self {
            ts: Some(report.received_at),
            vehicle: Some(report.id.clone()),
            lat: Some(report.lat),
            lon: Some(report.lon),
            speed_kmh: Some(report.speed_kmh),
            distance_m: Some(state.approach.distance_m),
            bearing: Some(state.approach.bearing_deg),
            direction: Some(state.approach.axis),
            priority_triggered: state.priority_triggered,
            alert_active: state.alert_active,
            status: EventStatus::from_triggered(state.priority_triggered),
        }
    }
}

/// Response returned to the reporting vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub status: EventStatus,
    pub distance_m: f64,
    pub direction: Axis,
}
