use std::{future::Future, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tokio::{net::TcpListener, time};
use tracing::{debug, info};

use crate::{
    controller::{SignalCommander, SignalState},
    decision::{DecisionEngine, ReportResponse, VehicleEvent},
};

use super::{
    error::{ApiError, Result},
    models::{CommandResponse, LastEventQuery, PriorityBody, VehicleReportBody},
};

/// Parses a JSON body regardless of its content type.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

async fn health() -> &'static str {
    "ok"
}

async fn post_vehicle(
    State(engine): State<Arc<DecisionEngine>>,
    body: Bytes,
) -> Result<Json<ReportResponse>> {
    let report = parse_body::<VehicleReportBody>(&body)?.into_report()?;
    let res = engine.process_report(report).await?;

    Ok(Json(res))
}

async fn get_last_event(
    State(engine): State<Arc<DecisionEngine>>,
    Query(query): Query<LastEventQuery>,
) -> Json<VehicleEvent> {
    let event = match query.id.as_deref() {
        Some(id) => engine.vehicle_event(id),
        None => engine.last_event(),
    };

    Json(event)
}

/// Routes exposed by the decision server: vehicle reports and event queries.
pub fn report_router(engine: Arc<DecisionEngine>) -> Router {
    Router::new()
        .route("/api/vehicle", post(post_vehicle))
        .route("/api/last_event", get(get_last_event))
        .with_state(engine)
}

/// Liveness route, answering `ok`.
pub fn health_router() -> Router {
    Router::new().route("/health", get(health))
}

#[derive(Clone)]
struct ControllerRoutes {
    commander: Arc<dyn SignalCommander>,
    default_duration: time::Duration,
}

async fn post_priority(
    State(routes): State<ControllerRoutes>,
    body: Bytes,
) -> Result<Json<CommandResponse>> {
    let body = parse_body::<PriorityBody>(&body)?;
    let axis = body.axis()?;
    let duration = body.duration(routes.default_duration)?;

    debug!(%axis, ?duration, "priority requested over HTTP");
    let ack = routes.commander.engage(axis, duration).await?;

    Ok(Json(ack.into()))
}

async fn post_priority_hold(
    State(routes): State<ControllerRoutes>,
    body: Bytes,
) -> Result<Json<CommandResponse>> {
    let axis = parse_body::<PriorityBody>(&body)?.axis()?;

    debug!(%axis, "priority hold requested over HTTP");
    let ack = routes.commander.engage_hold(axis).await?;

    Ok(Json(ack.into()))
}

async fn post_priority_release(
    State(routes): State<ControllerRoutes>,
) -> Result<Json<CommandResponse>> {
    debug!("priority release requested over HTTP");
    let ack = routes.commander.release().await?;

    Ok(Json(ack.into()))
}

async fn get_state(State(routes): State<ControllerRoutes>) -> Result<Json<SignalState>> {
    Ok(Json(routes.commander.state().await?))
}

/// Routes exposed by the signal controller. `default_duration` applies to timed priority
/// requests that don't carry one.
pub fn controller_router(
    commander: Arc<dyn SignalCommander>,
    default_duration: time::Duration,
) -> Router {
    Router::new()
        .route("/api/priority", post(post_priority))
        .route("/api/priority_hold", post(post_priority_hold))
        .route("/api/priority_release", post(post_priority_release))
        .route("/api/state", get(get_state))
        .with_state(ControllerRoutes {
            commander,
            default_duration,
        })
}

/// Binds `addr`.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ApiError::Serve)
}
