use std::{future, sync::Arc};

use axum::Router;
use serde_json::{Value, json};
use tokio::{net::TcpListener, time::Duration};

use crate::{
    controller::{
        SignalCommander, SignalController, SignalControllerConfig, SignalControllerEngine,
        SignalMode, error::SignalControllerError,
    },
    decision::{DecisionEngine, PriorityPolicy},
    geo::Axis,
    notify::{NotificationConfig, NotificationCoordinator},
    sink::{EventDispatcher, SimulatedActuator, TracingEventLog, TracingNotifier},
};

use super::*;

async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, app, future::pending()));
    format!("http://{addr}")
}

fn events() -> Arc<EventDispatcher> {
    EventDispatcher::spawn(Arc::new(TracingEventLog), Duration::from_secs(1))
}

fn start_controller() -> Arc<SignalController> {
    SignalControllerEngine::new(
        SignalControllerConfig::default(),
        Arc::new(SimulatedActuator),
        events(),
    )
    .start()
}

async fn controller_server() -> (String, Arc<SignalController>) {
    let controller = start_controller();
    let app = controller_router(controller.clone(), Duration::from_secs(10)).merge(health_router());
    (spawn_server(app).await, controller)
}

async fn report_server() -> String {
    let notifier =
        NotificationCoordinator::new(NotificationConfig::default(), Arc::new(TracingNotifier));
    let engine = DecisionEngine::new(
        PriorityPolicy::default(),
        start_controller(),
        notifier,
        events(),
    );
    spawn_server(report_router(engine).merge(health_router())).await
}

async fn post(url: String, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

async fn get(url: String) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

mod controller_routes {
    use super::*;

    #[tokio::test]
    async fn health() {
        let (base, _controller) = controller_server().await;
        let body = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn priority_hold_and_release() {
        let (base, controller) = controller_server().await;

        let (status, body) = post(
            format!("{base}/api/priority"),
            json!({ "direction": "ew", "duration": 30 }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["ok"], true);
        assert_eq!(body["mode"], "priority");
        assert_eq!(body["direction"], "EW");
        assert_eq!(body["hold"], false);
        assert_eq!(body["changed"], true);

        let state = get(format!("{base}/api/state")).await;
        assert_eq!(state["mode"], "priority");
        assert_eq!(state["direction"], "EW");
        assert!(state["expires_at"].is_string());

        let (_, body) = post(
            format!("{base}/api/priority_hold"),
            json!({ "direction": "NS" }),
        )
        .await;
        assert_eq!(body["hold"], true);
        assert_eq!(body["direction"], "NS");

        let (status, body) = post(format!("{base}/api/priority_release"), json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(body["mode"], "normal");
        assert_eq!(body["changed"], true);
        assert_eq!(controller.state_snapshot().mode(), SignalMode::Normal);
    }

    #[tokio::test]
    async fn rejects_bad_commands() {
        let (base, controller) = controller_server().await;

        let (status, body) = post(
            format!("{base}/api/priority"),
            json!({ "direction": "north" }),
        )
        .await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("north"));

        let (status, _) = post(
            format!("{base}/api/priority"),
            json!({ "direction": "NS", "duration": -5 }),
        )
        .await;
        assert_eq!(status, 400);

        assert!(!controller.state_snapshot().is_priority());
    }
}

mod remote_controller {
    use super::*;

    #[tokio::test]
    async fn commands_round_trip() {
        let (base, _controller) = controller_server().await;
        let remote =
            RemoteSignalController::new(format!("{base}/"), Duration::from_secs(5)).unwrap();
        assert_eq!(remote.base_url(), base);

        let ack = remote.engage_hold(Axis::EW).await.unwrap();
        assert_eq!(ack.mode, SignalMode::Priority);
        assert!(ack.hold);

        let state = remote.state().await.unwrap();
        assert_eq!(state.to_string(), "Priority(EW, held)");

        let ack = remote.engage(Axis::EW, Duration::from_secs(4)).await.unwrap();
        assert!(!ack.hold);
        assert!(ack.changed);

        let ack = remote.release().await.unwrap();
        assert!(!ack.changed);
    }

    #[tokio::test]
    async fn stopped_controller_is_reported() {
        let (base, controller) = controller_server().await;
        controller.shutdown().await.unwrap();

        let remote = RemoteSignalController::new(base, Duration::from_secs(5)).unwrap();
        let err = remote.engage_hold(Axis::NS).await.unwrap_err();

        match err {
            SignalControllerError::RemoteStatus { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("not accepting commands"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_controller_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote =
            RemoteSignalController::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = remote.release().await.unwrap_err();
        assert!(matches!(err, SignalControllerError::RemoteRequest(_)));
    }
}

mod report_routes {
    use super::*;

    #[tokio::test]
    async fn vehicle_report_triggers_priority() {
        let base = report_server().await;

        let (status, body) = post(
            format!("{base}/api/vehicle"),
            json!({ "id": "AMB001", "lat": 12.9710, "lon": 77.5945, "speed": 42 }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["status"], "priority_triggered");
        assert_eq!(body["direction"], "NS");
        let distance = body["distance_m"].as_f64().unwrap();
        assert!((distance - 66.7).abs() < 0.1);

        let event = get(format!("{base}/api/last_event")).await;
        assert_eq!(event["vehicle"], "AMB001");
        assert_eq!(event["priority_triggered"], true);
        assert_eq!(event["alert_active"], true);
        assert_eq!(event["speed_kmh"], 42.0);
    }

    #[tokio::test]
    async fn missing_id_is_reported_as_unknown_vehicle() {
        let base = report_server().await;

        let (status, body) = post(
            format!("{base}/api/vehicle"),
            json!({ "lat": 12.9800, "lon": 77.5945 }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "normal");

        let event = get(format!("{base}/api/last_event?id={UNKNOWN_VEHICLE_ID}")).await;
        assert_eq!(event["vehicle"], UNKNOWN_VEHICLE_ID);
        assert_eq!(event["status"], "normal");
    }

    #[tokio::test]
    async fn malformed_reports_are_rejected() {
        let base = report_server().await;

        for body in [
            json!({ "id": "AMB001", "lat": "north", "lon": 77.5945 }),
            json!({ "id": "AMB001", "lon": 77.5945 }),
            json!({ "id": "AMB001", "lat": 95.0, "lon": 77.5945 }),
            json!({ "id": "", "lat": 12.9710, "lon": 77.5945 }),
        ] {
            let (status, response) = post(format!("{base}/api/vehicle"), body).await;
            assert_eq!(status, 400);
            assert!(response["error"].is_string());
        }

        let event = get(format!("{base}/api/last_event")).await;
        assert_eq!(event["status"], "unknown");
        assert!(event["vehicle"].is_null());
    }

    #[tokio::test]
    async fn unknown_vehicle_query_returns_null_record() {
        let base = report_server().await;

        let event = get(format!("{base}/api/last_event?id=NOPE")).await;
        assert_eq!(event["vehicle"], "NOPE");
        assert_eq!(event["status"], "unknown");
        assert!(event["distance_m"].is_null());
        assert!(event["direction"].is_null());
        assert_eq!(event["priority_triggered"], false);
    }
}
