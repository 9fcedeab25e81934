use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::{
    controller::SignalCommander,
    geo::{Approach, Axis, Coordinate},
    notify::NotificationCoordinator,
    sink::{AlertMetadata, EventDispatcher, LogRecord},
};

use super::{
    config::PriorityPolicy,
    error::{DecisionError, Result},
    state::{EventStatus, ReportResponse, VehicleEvent, VehicleReport, VehicleState},
};

type VehicleSlot = Arc<AsyncMutex<Option<VehicleState>>>;

#[derive(Debug, Default)]
struct LatestEvents {
    global: Option<VehicleEvent>,
    by_vehicle: HashMap<String, VehicleEvent>,
}

/// Applies the [`PriorityPolicy`] to incoming vehicle reports.
///
/// Reports of the same vehicle are processed one at a time, in arrival order. Reports of
/// different vehicles proceed concurrently.
pub struct DecisionEngine {
    policy: PriorityPolicy,
    commander: Arc<dyn SignalCommander>,
    notifier: Arc<NotificationCoordinator>,
    events: Arc<EventDispatcher>,
    vehicles: Mutex<HashMap<String, VehicleSlot>>,
    latest: Mutex<LatestEvents>,
}

impl DecisionEngine {
    pub fn new(
        policy: PriorityPolicy,
        commander: Arc<dyn SignalCommander>,
        notifier: Arc<NotificationCoordinator>,
        events: Arc<EventDispatcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            policy,
            commander,
            notifier,
            events,
            vehicles: Mutex::new(HashMap::new()),
            latest: Mutex::new(LatestEvents::default()),
        })
    }

    pub fn policy(&self) -> &PriorityPolicy {
        &self.policy
    }

    fn lock_vehicles(&self) -> MutexGuard<'_, HashMap<String, VehicleSlot>> {
        self.vehicles
            .lock()
            .expect("`DecisionEngine` vehicles mutex can't be poisoned")
    }

    fn lock_latest(&self) -> MutexGuard<'_, LatestEvents> {
        self.latest
            .lock()
            .expect("`DecisionEngine` latest events mutex can't be poisoned")
    }

    fn vehicle_slot(&self, vehicle_id: &str) -> VehicleSlot {
        self.lock_vehicles()
            .entry(vehicle_id.to_string())
            .or_default()
            .clone()
    }

    /// Processes one vehicle report: decides trigger, hold and release, drives the alert session
    /// and signal controller, records the outcome and returns the response for the vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] if the report is malformed, in which case nothing is mutated.
    /// Controller and notification failures are logged and never fail the report.
    pub async fn process_report(&self, report: VehicleReport) -> Result<ReportResponse> {
        if report.id.trim().is_empty() {
            return Err(DecisionError::EmptyVehicleId);
        }

        let vehicle = Coordinate::new(report.lat, report.lon)?;
        let approach = Approach::compute(vehicle, self.policy.intersection())?;

        let slot = self.vehicle_slot(&report.id);
        let mut state_guard = slot.lock().await;

        let id = report.id.as_str();
        let triggered = approach.distance_m < self.policy.trigger_threshold_m();

        debug!(
            vehicle = id,
            position = %vehicle,
            speed_kmh = report.speed_kmh,
            distance_m = approach.distance_m,
            bearing = approach.bearing_deg,
            axis = %approach.axis,
            "vehicle report"
        );

        let metadata = AlertMetadata {
            axis: approach.axis,
            distance_m: approach.distance_m,
        };

        if triggered {
            if self.notifier.start(id, metadata) {
                info!(
                    vehicle = id,
                    axis = %approach.axis,
                    distance_m = approach.distance_m,
                    "priority triggered"
                );
                self.request_priority(id, approach.axis).await;
            } else {
                // Already alerting, the signal command is not repeated
                self.notifier.refresh(id, metadata);
            }
        } else if approach.distance_m > self.policy.release_threshold_m() {
            let was_alerting = self.notifier.stop(id).await;
            if was_alerting {
                info!(
                    vehicle = id,
                    distance_m = approach.distance_m,
                    "vehicle passed, alert stopped"
                );
            }

            let was_triggered = state_guard.as_ref().is_some_and(|s| s.priority_triggered);

            // Only a vehicle that held priority may end it
            if self.policy.hold_until_pass() && (was_alerting || was_triggered) {
                self.release_or_hand_over(id).await;
            }
        } else {
            // Between the two thresholds an active alert is kept, so GPS noise can't flap it
            self.notifier.refresh(id, metadata);
        }

        let alert_active = self.notifier.is_active(id);
        let state = VehicleState {
            last_report: report,
            approach,
            alert_active,
            priority_triggered: triggered,
            updated_at: Utc::now(),
        };

        let event = VehicleEvent::from(&state);
        self.store_event(&event);
        self.events.dispatch(LogRecord::VehicleDetection(event));

        *state_guard = Some(state);

        Ok(ReportResponse {
            status: EventStatus::from_triggered(triggered),
            distance_m: approach.distance_m,
            direction: approach.axis,
        })
    }

    async fn request_priority(&self, vehicle_id: &str, axis: Axis) {
        let res = if self.policy.hold_until_pass() {
            self.commander.engage_hold(axis).await
        } else {
            self.commander
                .engage(axis, self.policy.default_priority())
                .await
        };

        match res {
            Ok(ack) => info!(
                vehicle = vehicle_id,
                mode = %ack.mode,
                axis = %ack.axis,
                hold = ack.hold,
                "priority requested"
            ),
            Err(e) => warn!(vehicle = vehicle_id, error = %e, "priority request failed"),
        }
    }

    /// Ends the held priority of `vehicle_id`, unless other vehicles are still alerting. The hold
    /// then moves to the nearest of them.
    async fn release_or_hand_over(&self, vehicle_id: &str) {
        let active = self.notifier.active_sessions();
        if active.is_empty() {
            self.request_release(vehicle_id).await;
            return;
        }

        match self.nearest_approach(&active) {
            Some((next_id, axis)) => {
                info!(from = vehicle_id, to = %next_id, %axis, "priority handed over");
                self.request_priority(&next_id, axis).await;
            }
            // Their first report is still in progress and will engage priority itself
            None => debug!(
                vehicle = vehicle_id,
                alerting = active.len(),
                "release deferred, other vehicles alerting"
            ),
        }
    }

    /// Closest of `vehicle_ids` to the intersection, among those with a recorded approach.
    fn nearest_approach(&self, vehicle_ids: &[String]) -> Option<(String, Axis)> {
        let latest = self.lock_latest();

        vehicle_ids
            .iter()
            .filter_map(|id| {
                let event = latest.by_vehicle.get(id)?;
                Some((id, event.direction?, event.distance_m?))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(id, axis, _)| (id.clone(), axis))
    }

    async fn request_release(&self, vehicle_id: &str) {
        match self.commander.release().await {
            Ok(ack) if ack.changed => {
                info!(vehicle = vehicle_id, axis = %ack.axis, "priority released")
            }
            Ok(_) => debug!(vehicle = vehicle_id, "release had no held priority to end"),
            Err(e) => warn!(vehicle = vehicle_id, error = %e, "priority release failed"),
        }
    }

    fn store_event(&self, event: &VehicleEvent) {
        let mut latest = self.lock_latest();

        if let Some(vehicle) = &event.vehicle {
            latest.by_vehicle.insert(vehicle.clone(), event.clone());
        }
        latest.global = Some(event.clone());
    }

    /// Latest processed event across all vehicles, or an all-null record.
    pub fn last_event(&self) -> VehicleEvent {
        self.lock_latest()
            .global
            .clone()
            .unwrap_or_else(|| VehicleEvent::unknown(None))
    }

    /// Latest processed event of `vehicle_id`, or an all-null record carrying the id.
    pub fn vehicle_event(&self, vehicle_id: &str) -> VehicleEvent {
        self.lock_latest()
            .by_vehicle
            .get(vehicle_id)
            .cloned()
            .unwrap_or_else(|| VehicleEvent::unknown(Some(vehicle_id)))
    }

    /// Latest decided state of `vehicle_id`. Waits for a report of that vehicle in progress.
    pub async fn vehicle_state(&self, vehicle_id: &str) -> Option<VehicleState> {
        let slot = self.lock_vehicles().get(vehicle_id).cloned()?;
        slot.lock().await.clone()
    }

    /// Identifiers of every vehicle that has reported, sorted.
    pub fn known_vehicles(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_vehicles().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops every alert session.
    pub async fn shutdown(&self) {
        if let Err(e) = self.notifier.shutdown_all().await {
            warn!(error = %e, "alert sessions did not all stop cleanly");
        }
    }
}
