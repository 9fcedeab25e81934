use tokio::time;

use crate::geo::Coordinate;

use super::error::{DecisionError, Result};

/// Priority policy applied by the [`DecisionEngine`](crate::decision::DecisionEngine).
///
/// The release threshold is always strictly greater than the trigger threshold. The gap between
/// them keeps GPS noise around the trigger boundary from flapping a held priority.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorityPolicy {
    intersection: Coordinate,
    trigger_threshold_m: f64,
    release_threshold_m: f64,
    hold_until_pass: bool,
    default_priority: time::Duration,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            intersection: Coordinate::new_unchecked(12.9716, 77.5945),
            trigger_threshold_m: 120.0,
            release_threshold_m: 150.0,
            hold_until_pass: true,
            default_priority: time::Duration::from_secs(10),
        }
    }
}

impl PriorityPolicy {
    /// Returns the coordinate of the controlled intersection.
    pub fn intersection(&self) -> Coordinate {
        self.intersection
    }

    /// Returns the distance under which a vehicle triggers priority.
    pub fn trigger_threshold_m(&self) -> f64 {
        self.trigger_threshold_m
    }

    /// Returns the distance beyond which a held priority is released.
    pub fn release_threshold_m(&self) -> f64 {
        self.release_threshold_m
    }

    /// Returns whether priority is held until the vehicle has passed, instead of timed.
    pub fn hold_until_pass(&self) -> bool {
        self.hold_until_pass
    }

    /// Returns the duration of a timed priority.
    pub fn default_priority(&self) -> time::Duration {
        self.default_priority
    }

    /// Sets the coordinate of the controlled intersection.
    ///
    /// Default: `12.9716, 77.5945`
    pub fn with_intersection(mut self, intersection: Coordinate) -> Self {
        self.intersection = intersection;
        self
    }

    /// Sets the trigger and release thresholds, in meters.
    ///
    /// Default: `120` / `150`
    ///
    /// # Errors
    ///
    /// The trigger threshold must be positive and the release threshold strictly greater.
    pub fn with_thresholds(mut self, trigger_m: f64, release_m: f64) -> Result<Self> {
        if !trigger_m.is_finite() || trigger_m <= 0.0 {
            return Err(DecisionError::InvalidTriggerThreshold(trigger_m));
        }

        if !release_m.is_finite() || release_m <= trigger_m {
            return Err(DecisionError::InvalidReleaseThreshold {
                trigger_m,
                release_m,
            });
        }

        self.trigger_threshold_m = trigger_m;
        self.release_threshold_m = release_m;
        Ok(self)
    }

    /// Sets whether priority is held until the vehicle has passed.
    ///
    /// Default: `true`
    pub fn with_hold_until_pass(mut self, hold_until_pass: bool) -> Self {
        self.hold_until_pass = hold_until_pass;
        self
    }

    /// Sets the duration of a timed priority.
    ///
    /// Default: `10` seconds
    pub fn with_default_priority(mut self, secs: u64) -> Self {
        self.default_priority = time::Duration::from_secs(secs);
        self
    }
}
