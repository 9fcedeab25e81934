use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub(crate) mod error;

use error::{GeoError, Result};

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One of the two orthogonal approach axes of the intersection.
///
/// Declaration order matters: when a bearing is exactly equidistant from both axes,
/// [`classify_axis`] resolves the tie in favor of the first declared axis ([`Axis::NS`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Axis {
    /// North-south approach (axis A), reference bearings 0° and 180°.
    #[serde(rename = "NS")]
    #[strum(serialize = "NS", ascii_case_insensitive)]
    NS,
    /// East-west approach (axis B), reference bearings 90° and 270°.
    #[serde(rename = "EW")]
    #[strum(serialize = "EW", ascii_case_insensitive)]
    EW,
}

impl Axis {
    /// Both axes, in declaration order.
    pub const ALL: [Axis; 2] = [Axis::NS, Axis::EW];

    /// Returns the two opposite reference bearings (degrees) that define this axis.
    pub const fn reference_bearings(&self) -> [f64; 2] {
        match self {
            Self::NS => [0.0, 180.0],
            Self::EW => [90.0, 270.0],
        }
    }

    /// Returns the orthogonal axis.
    pub const fn other(&self) -> Axis {
        match self {
            Self::NS => Self::EW,
            Self::EW => Self::NS,
        }
    }

    /// Returns `(ns_green, ew_green)` output levels that give this axis right of way.
    pub const fn green_outputs(&self) -> (bool, bool) {
        match self {
            Self::NS => (true, false),
            Self::EW => (false, true),
        }
    }
}

/// Validated WGS84 coordinate, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::InvalidLatitude(lat));
        }

        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::InvalidLongitude(lon));
        }

        Ok(Self { lat, lon })
    }

    /// Builds a coordinate without validation, for known-good constants.
    pub(crate) const fn new_unchecked(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Great-circle distance between two points using the haversine formula.
///
/// Inputs are in degrees, output is in meters and never negative.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let sin_dphi = (delta_phi / 2.0).sin();
    let sin_dlambda = (delta_lambda / 2.0).sin();
    let a = sin_dphi * sin_dphi + phi1.cos() * phi2.cos() * sin_dlambda * sin_dlambda;
    // Rounding can push `a` marginally outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Forward azimuth from point 1 to point 2, normalized to `[0, 360)` degrees.
pub fn initial_bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Normalizes an angle in degrees to `[0, 360)`.
pub fn normalize_bearing(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // `rem_euclid` may return exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Shortest-arc distance between two bearings, in `[0, 180]` degrees.
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let direct = (normalize_bearing(a) - normalize_bearing(b)).abs();
    direct.min(360.0 - direct)
}

/// Maps a bearing to the nearer of the two approach axes.
///
/// Exact ties resolve to the first declared axis.
pub fn classify_axis(bearing_degrees: f64) -> Axis {
    let delta_to = |axis: Axis| {
        axis.reference_bearings()
            .into_iter()
            .map(|reference| angular_distance(bearing_degrees, reference))
            .fold(f64::INFINITY, f64::min)
    };

    let mut best = Axis::ALL[0];
    let mut best_delta = delta_to(best);

    for axis in Axis::ALL.into_iter().skip(1) {
        let delta = delta_to(axis);
        if delta < best_delta {
            best = axis;
            best_delta = delta;
        }
    }

    best
}

/// Distance, bearing and axis of a vehicle relative to the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Approach {
    pub distance_m: f64,
    pub bearing_deg: f64,
    pub axis: Axis,
}

impl Approach {
    /// Computes the approach of `vehicle` towards `intersection`.
    ///
    /// The bearing is measured from the vehicle to the intersection. Non-finite results are
    /// rejected so they never reach the priority policy.
    pub fn compute(vehicle: Coordinate, intersection: Coordinate) -> Result<Self> {
        let distance_m = distance_meters(
            vehicle.lat(),
            vehicle.lon(),
            intersection.lat(),
            intersection.lon(),
        );
        if !distance_m.is_finite() {
            return Err(GeoError::NonFinite {
                quantity: "distance",
            });
        }

        let bearing_deg = initial_bearing_degrees(
            vehicle.lat(),
            vehicle.lon(),
            intersection.lat(),
            intersection.lon(),
        );
        if !bearing_deg.is_finite() {
            return Err(GeoError::NonFinite { quantity: "bearing" });
        }

        Ok(Self {
            distance_m,
            bearing_deg,
            axis: classify_axis(bearing_deg),
        })
    }
}
