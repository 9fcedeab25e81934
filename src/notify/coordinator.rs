use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{info, warn};

use crate::sink::{AlertMetadata, NotificationSink};

use super::{config::NotificationConfig, error::Result, session::NotificationSession};

/// Runs at most one blinking alert session per vehicle.
///
/// Sessions publish through the configured [`NotificationSink`]. Sink failures are logged by the
/// session and never surface here.
pub struct NotificationCoordinator {
    config: NotificationConfig,
    sink: Arc<dyn NotificationSink>,
    sessions: Mutex<HashMap<String, NotificationSession>>,
}

impl NotificationCoordinator {
    pub fn new(config: NotificationConfig, sink: Arc<dyn NotificationSink>) -> Arc<Self> {
        Arc::new(Self {
            config,
            sink,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, NotificationSession>> {
        self.sessions
            .lock()
            .expect("`NotificationCoordinator` mutex can't be poisoned")
    }

    /// Starts an alert session for `vehicle_id`.
    ///
    /// Returns `false`, without touching the running session, if one is already active.
    pub fn start(&self, vehicle_id: &str, metadata: AlertMetadata) -> bool {
        let mut sessions = self.lock_sessions();

        if let Some(session) = sessions.get(vehicle_id)
            && !session.is_finished()
        {
            return false;
        }

        let session =
            NotificationSession::spawn(&self.config, self.sink.clone(), vehicle_id, metadata);
        info!(
            vehicle = vehicle_id,
            session_id = %session.session_id(),
            axis = %metadata.axis,
            distance_m = metadata.distance_m,
            "alert started"
        );
        sessions.insert(vehicle_id.to_string(), session);

        true
    }

    /// Updates the metadata of the active session, which publishes a refresh.
    ///
    /// Returns `false` if `vehicle_id` has no active session.
    pub fn refresh(&self, vehicle_id: &str, metadata: AlertMetadata) -> bool {
        match self.lock_sessions().get(vehicle_id) {
            Some(session) => {
                session.refresh(metadata);
                true
            }
            None => false,
        }
    }

    /// Stops the session of `vehicle_id`, waiting for it to clear its alert.
    ///
    /// Returns `false` if there was no session to stop.
    pub async fn stop(&self, vehicle_id: &str) -> bool {
        let Some(session) = self.lock_sessions().remove(vehicle_id) else {
            return false;
        };

        let session_id = session.session_id();
        match session.stop(vehicle_id, self.config.stop_timeout()).await {
            Ok(()) => info!(vehicle = vehicle_id, %session_id, "alert stopped"),
            Err(e) => warn!(vehicle = vehicle_id, %session_id, error = %e, "alert stop failed"),
        }

        true
    }

    /// Whether `vehicle_id` has an active session.
    pub fn is_active(&self, vehicle_id: &str) -> bool {
        self.lock_sessions()
            .get(vehicle_id)
            .is_some_and(|session| !session.is_finished())
    }

    /// Identifiers of all vehicles with an active session, sorted.
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .lock_sessions()
            .iter()
            .filter(|(_, session)| !session.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stops every session. All sessions are stopped even if some fail; the first failure is
    /// returned.
    pub async fn shutdown_all(&self) -> Result<()> {
        let sessions: Vec<(String, NotificationSession)> = self.lock_sessions().drain().collect();
        let timeout = self.config.stop_timeout();

        let results = futures::future::join_all(
            sessions
                .into_iter()
                .map(|(id, session)| async move { session.stop(&id, timeout).await }),
        )
        .await;

        results.into_iter().collect()
    }
}
