use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{self, Duration};

use crate::{
    controller::{
        CommandAck, SignalCommander, SignalMode, SignalState, error::SignalControllerError,
    },
    geo::{Axis, error::GeoError},
    notify::{NotificationConfig, NotificationCoordinator},
    sink::{
        AlertUpdate, AlertUpdateKind, EventDispatcher, EventLog, LogRecord, NotificationSink,
        error::SinkResult,
    },
};

use super::{error::DecisionError, *};

const INTERSECTION_LAT: f64 = 12.9716;
const INTERSECTION_LON: f64 = 77.5945;
const METERS_PER_DEGREE: f64 = 111_194.926_6;

/// Report `distance_m` due south of the intersection, approaching along NS.
fn south(id: &str, distance_m: f64) -> VehicleReport {
    VehicleReport::new(
        id,
        INTERSECTION_LAT - distance_m / METERS_PER_DEGREE,
        INTERSECTION_LON,
    )
    .with_speed(40.0)
}

/// Report `distance_m` due west of the intersection, approaching along EW.
fn west(id: &str, distance_m: f64) -> VehicleReport {
    let lon_scale = METERS_PER_DEGREE * INTERSECTION_LAT.to_radians().cos();
    VehicleReport::new(id, INTERSECTION_LAT, INTERSECTION_LON - distance_m / lon_scale)
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Engage(Axis, Duration),
    EngageHold(Axis),
    Release,
}

#[derive(Default)]
struct RecordingCommander {
    commands: Mutex<Vec<Command>>,
    fail: bool,
}

impl RecordingCommander {
    fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn ack(&self, command: Command) -> Result<CommandAck, SignalControllerError> {
        self.commands.lock().unwrap().push(command.clone());

        if self.fail {
            return Err(SignalControllerError::AckDropped);
        }

        let ack = match command {
            Command::Engage(axis, _) => CommandAck {
                mode: SignalMode::Priority,
                axis,
                hold: false,
                changed: true,
            },
            Command::EngageHold(axis) => CommandAck {
                mode: SignalMode::Priority,
                axis,
                hold: true,
                changed: true,
            },
            Command::Release => CommandAck {
                mode: SignalMode::Normal,
                axis: Axis::NS,
                hold: false,
                changed: true,
            },
        };
        Ok(ack)
    }
}

#[async_trait]
impl SignalCommander for RecordingCommander {
    async fn engage(
        &self,
        axis: Axis,
        duration: Duration,
    ) -> Result<CommandAck, SignalControllerError> {
        self.ack(Command::Engage(axis, duration))
    }

    async fn engage_hold(&self, axis: Axis) -> Result<CommandAck, SignalControllerError> {
        self.ack(Command::EngageHold(axis))
    }

    async fn release(&self) -> Result<CommandAck, SignalControllerError> {
        self.ack(Command::Release)
    }

    async fn state(&self) -> Result<SignalState, SignalControllerError> {
        Ok(SignalState::initial())
    }
}

#[derive(Default)]
struct RecordingSink {
    kinds: Mutex<Vec<AlertUpdateKind>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, update: &AlertUpdate) -> SinkResult<()> {
        self.kinds.lock().unwrap().push(update.kind);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLog {
    detections: Mutex<Vec<VehicleEvent>>,
}

#[async_trait]
impl EventLog for RecordingLog {
    async fn record(&self, record: &LogRecord) -> SinkResult<()> {
        if let LogRecord::VehicleDetection(event) = record {
            self.detections.lock().unwrap().push(event.clone());
        }
        Ok(())
    }
}

struct Harness {
    engine: Arc<DecisionEngine>,
    commander: Arc<RecordingCommander>,
    sink: Arc<RecordingSink>,
    log: Arc<RecordingLog>,
}

impl Harness {
    fn new(policy: PriorityPolicy) -> Self {
        Self::with_commander(policy, RecordingCommander::default())
    }

    fn with_commander(policy: PriorityPolicy, commander: RecordingCommander) -> Self {
        let commander = Arc::new(commander);
        let sink = Arc::new(RecordingSink::default());
        let log = Arc::new(RecordingLog::default());

        let notifier = NotificationCoordinator::new(NotificationConfig::default(), sink.clone());
        let events = EventDispatcher::spawn(log.clone(), Duration::from_secs(1));
        let engine = DecisionEngine::new(policy, commander.clone(), notifier, events);

        Self {
            engine,
            commander,
            sink,
            log,
        }
    }

    async fn report(&self, report: VehicleReport) -> ReportResponse {
        self.engine.process_report(report).await.unwrap()
    }

    fn alert_count(&self, kind: AlertUpdateKind) -> usize {
        self.sink
            .kinds
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }
}

fn timed_policy() -> PriorityPolicy {
    PriorityPolicy::default().with_hold_until_pass(false)
}

#[tokio::test(start_paused = true)]
async fn approaching_vehicle_triggers_held_priority() {
    let h = Harness::new(PriorityPolicy::default());

    let res = h.report(south("AMB001", 80.0)).await;

    assert_eq!(res.status, EventStatus::PriorityTriggered);
    assert_eq!(res.direction, Axis::NS);
    assert!((res.distance_m - 80.0).abs() < 0.01);
    assert_eq!(h.commander.commands(), vec![Command::EngageHold(Axis::NS)]);

    let event = h.engine.vehicle_event("AMB001");
    assert!(event.alert_active);
    assert!(event.priority_triggered);
    assert_eq!(event.speed_kmh, Some(40.0));
}

#[tokio::test(start_paused = true)]
async fn closer_report_only_refreshes_alert() {
    let h = Harness::new(PriorityPolicy::default());

    h.report(south("AMB001", 80.0)).await;
    time::sleep(Duration::from_millis(10)).await;
    let res = h.report(south("AMB001", 50.0)).await;
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(res.status, EventStatus::PriorityTriggered);
    assert_eq!(h.commander.commands().len(), 1);
    assert_eq!(h.alert_count(AlertUpdateKind::AlertOn), 1);
    assert_eq!(h.alert_count(AlertUpdateKind::Refresh), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_policy_never_releases() {
    let h = Harness::new(timed_policy());

    h.report(south("FIRT001", 80.0)).await;
    let res = h.report(south("FIRT001", 160.0)).await;

    assert_eq!(res.status, EventStatus::Normal);
    assert_eq!(
        h.commander.commands(),
        vec![Command::Engage(Axis::NS, Duration::from_secs(10))]
    );
    assert!(!h.engine.vehicle_event("FIRT001").alert_active);
    assert_eq!(h.alert_count(AlertUpdateKind::AlertOff), 1);
}

#[tokio::test(start_paused = true)]
async fn passing_vehicle_releases_held_priority() {
    let h = Harness::new(PriorityPolicy::default());

    h.report(south("AMB001", 80.0)).await;
    let res = h.report(south("AMB001", 160.0)).await;

    assert_eq!(res.status, EventStatus::Normal);
    assert_eq!(
        h.commander.commands(),
        vec![Command::EngageHold(Axis::NS), Command::Release]
    );
    assert!(!h.engine.vehicle_event("AMB001").alert_active);
    assert_eq!(h.alert_count(AlertUpdateKind::AlertOff), 1);
}

#[tokio::test(start_paused = true)]
async fn oscillating_around_trigger_does_not_flap() {
    let h = Harness::new(PriorityPolicy::default());

    let mut statuses = Vec::new();
    for distance in [115.0, 125.0, 115.0, 125.0, 115.0, 125.0] {
        statuses.push(h.report(south("AMB001", distance)).await.status);
    }
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        statuses,
        vec![
            EventStatus::PriorityTriggered,
            EventStatus::Normal,
            EventStatus::PriorityTriggered,
            EventStatus::Normal,
            EventStatus::PriorityTriggered,
            EventStatus::Normal,
        ]
    );
    assert_eq!(h.commander.commands(), vec![Command::EngageHold(Axis::NS)]);
    assert_eq!(h.alert_count(AlertUpdateKind::AlertOn), 1);
    assert_eq!(h.alert_count(AlertUpdateKind::AlertOff), 0);
    assert!(h.engine.vehicle_event("AMB001").alert_active);
}

#[tokio::test(start_paused = true)]
async fn release_needs_the_release_threshold() {
    let h = Harness::new(PriorityPolicy::default());

    h.report(south("AMB001", 80.0)).await;
    h.report(south("AMB001", 140.0)).await;
    assert_eq!(h.commander.commands().len(), 1);

    h.report(south("AMB001", 151.0)).await;
    assert_eq!(
        h.commander.commands(),
        vec![Command::EngageHold(Axis::NS), Command::Release]
    );
}

#[tokio::test(start_paused = true)]
async fn approach_axis_follows_bearing() {
    let h = Harness::new(timed_policy());

    let res = h.report(west("FIRT001", 90.0)).await;

    assert_eq!(res.direction, Axis::EW);
    assert_eq!(
        h.commander.commands(),
        vec![Command::Engage(Axis::EW, Duration::from_secs(10))]
    );
}

#[tokio::test(start_paused = true)]
async fn vehicles_are_tracked_independently() {
    let h = Harness::new(PriorityPolicy::default());

    let (a, b) = tokio::join!(
        h.engine.process_report(south("AMB001", 80.0)),
        h.engine.process_report(west("FIRT001", 70.0)),
    );
    assert_eq!(a.unwrap().direction, Axis::NS);
    assert_eq!(b.unwrap().direction, Axis::EW);

    let mut commands = h.commander.commands();
    commands.sort_by_key(|c| format!("{c:?}"));
    assert_eq!(
        commands,
        vec![Command::EngageHold(Axis::EW), Command::EngageHold(Axis::NS)]
    );
    assert_eq!(h.engine.known_vehicles(), vec!["AMB001", "FIRT001"]);

    let state = h.engine.vehicle_state("FIRT001").await.unwrap();
    assert!(state.alert_active);
    assert_eq!(state.approach.axis, Axis::EW);
}

#[tokio::test(start_paused = true)]
async fn controller_failures_do_not_fail_reports() {
    let commander = RecordingCommander {
        fail: true,
        ..Default::default()
    };
    let h = Harness::with_commander(PriorityPolicy::default(), commander);

    let res = h.report(south("AMB001", 80.0)).await;
    assert_eq!(res.status, EventStatus::PriorityTriggered);

    let res = h.report(south("AMB001", 200.0)).await;
    assert_eq!(res.status, EventStatus::Normal);
    assert_eq!(h.commander.commands().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_reports_are_rejected_without_side_effects() {
    let h = Harness::new(PriorityPolicy::default());

    let err = h
        .engine
        .process_report(VehicleReport::new("AMB001", f64::NAN, 77.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DecisionError::MalformedReport(GeoError::InvalidLatitude(_))
    ));

    let err = h
        .engine
        .process_report(VehicleReport::new("AMB001", 12.0, 181.0))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DecisionError::MalformedReport(GeoError::InvalidLongitude(181.0))
    );

    let err = h
        .engine
        .process_report(VehicleReport::new("  ", 12.0, 77.0))
        .await
        .unwrap_err();
    assert_eq!(err, DecisionError::EmptyVehicleId);

    assert!(h.engine.known_vehicles().is_empty());
    assert!(h.commander.commands().is_empty());
    assert_eq!(h.engine.last_event().status, EventStatus::Unknown);
}

#[tokio::test(start_paused = true)]
async fn event_queries() {
    let h = Harness::new(PriorityPolicy::default());

    let empty = h.engine.last_event();
    assert_eq!(empty, VehicleEvent::unknown(None));
    assert!(empty.vehicle.is_none());
    assert!(empty.distance_m.is_none());

    let missing = h.engine.vehicle_event("GHOST1");
    assert_eq!(missing.vehicle.as_deref(), Some("GHOST1"));
    assert_eq!(missing.status, EventStatus::Unknown);

    h.report(south("AMB001", 80.0)).await;
    h.report(south("FIRT001", 300.0)).await;

    let last = h.engine.last_event();
    assert_eq!(last.vehicle.as_deref(), Some("FIRT001"));
    assert_eq!(last.status, EventStatus::Normal);
    assert_eq!(last.direction, Some(Axis::NS));

    let amb = h.engine.vehicle_event("AMB001");
    assert_eq!(amb.status, EventStatus::PriorityTriggered);
    assert!((amb.distance_m.unwrap() - 80.0).abs() < 0.01);
    assert_eq!(h.commander.commands(), vec![Command::EngageHold(Axis::NS)]);
}

#[tokio::test(start_paused = true)]
async fn distant_vehicle_never_releases_another_vehicles_hold() {
    let h = Harness::new(PriorityPolicy::default());

    h.report(south("AMB001", 80.0)).await;
    time::sleep(Duration::from_millis(10)).await;
    h.report(south("FIRT009", 400.0)).await;
    let res = h.report(south("AMB001", 40.0)).await;

    assert_eq!(res.status, EventStatus::PriorityTriggered);
    assert_eq!(h.commander.commands(), vec![Command::EngageHold(Axis::NS)]);
    assert!(h.engine.vehicle_event("AMB001").alert_active);
}

#[tokio::test(start_paused = true)]
async fn passing_vehicle_hands_hold_over_to_vehicle_still_approaching() {
    let h = Harness::new(PriorityPolicy::default());

    h.report(south("AMB001", 80.0)).await;
    h.report(west("FIRT001", 80.0)).await;
    time::sleep(Duration::from_millis(10)).await;

    h.report(south("AMB001", 200.0)).await;
    h.report(west("FIRT001", 40.0)).await;

    assert_eq!(
        h.commander.commands(),
        vec![
            Command::EngageHold(Axis::NS),
            Command::EngageHold(Axis::EW),
            Command::EngageHold(Axis::EW),
        ]
    );
    assert!(h.engine.vehicle_event("FIRT001").alert_active);
    assert!(!h.engine.vehicle_event("AMB001").alert_active);

    // The last alerting vehicle passing ends the hold
    h.report(west("FIRT001", 200.0)).await;
    assert_eq!(h.commander.commands().last(), Some(&Command::Release));
    assert_eq!(h.commander.commands().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn concurrent_reports_of_one_vehicle_are_serialized() {
    let h = Harness::new(PriorityPolicy::default());

    let (a, b) = tokio::join!(
        h.engine.process_report(south("AMB001", 80.0)),
        h.engine.process_report(south("AMB001", 70.0)),
    );
    assert_eq!(a.unwrap().status, EventStatus::PriorityTriggered);
    assert_eq!(b.unwrap().status, EventStatus::PriorityTriggered);
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.commander.commands(), vec![Command::EngageHold(Axis::NS)]);
    assert_eq!(h.alert_count(AlertUpdateKind::AlertOn), 1);
    assert_eq!(h.engine.known_vehicles(), vec!["AMB001"]);
}

#[tokio::test(start_paused = true)]
async fn every_report_is_logged() {
    let h = Harness::new(PriorityPolicy::default());

    h.report(south("AMB001", 80.0)).await;
    h.report(south("AMB001", 60.0)).await;
    h.report(south("AMB001", 300.0)).await;
    time::sleep(Duration::from_millis(10)).await;

    let detections = h.log.detections.lock().unwrap();
    assert_eq!(detections.len(), 3);
    assert_eq!(detections[0].status, EventStatus::PriorityTriggered);
    assert_eq!(detections[2].status, EventStatus::Normal);
    assert!(!detections[2].alert_active);
}

mod policy {
    use super::*;

    #[test]
    fn defaults() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.intersection().lat(), INTERSECTION_LAT);
        assert_eq!(policy.intersection().lon(), INTERSECTION_LON);
        assert_eq!(policy.trigger_threshold_m(), 120.0);
        assert_eq!(policy.release_threshold_m(), 150.0);
        assert!(policy.hold_until_pass());
        assert_eq!(policy.default_priority(), Duration::from_secs(10));
    }

    #[test]
    fn release_must_exceed_trigger() {
        assert_eq!(
            PriorityPolicy::default().with_thresholds(120.0, 120.0),
            Err(DecisionError::InvalidReleaseThreshold {
                trigger_m: 120.0,
                release_m: 120.0
            })
        );
        assert!(
            PriorityPolicy::default()
                .with_thresholds(120.0, f64::NAN)
                .is_err()
        );
        assert_eq!(
            PriorityPolicy::default().with_thresholds(0.0, 10.0),
            Err(DecisionError::InvalidTriggerThreshold(0.0))
        );

        let policy = PriorityPolicy::default()
            .with_thresholds(100.0, 130.0)
            .unwrap();
        assert_eq!(policy.trigger_threshold_m(), 100.0);
        assert_eq!(policy.release_threshold_m(), 130.0);
    }
}
