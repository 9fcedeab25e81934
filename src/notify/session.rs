use std::sync::Arc;

use tokio::{
    sync::{broadcast, watch},
    time::{self, Instant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    sink::{AlertMetadata, AlertUpdate, AlertUpdateKind, NotificationSink, guarded},
    util::AbortOnDropHandle,
};

use super::{
    config::NotificationConfig,
    error::{NotifyError, Result},
};

/// Handle to one vehicle's running alert task.
#[derive(Debug)]
pub(super) struct NotificationSession {
    session_id: Uuid,
    cancel_tx: broadcast::Sender<()>,
    metadata_tx: watch::Sender<AlertMetadata>,
    handle: AbortOnDropHandle<()>,
}

impl NotificationSession {
    pub fn spawn(
        config: &NotificationConfig,
        sink: Arc<dyn NotificationSink>,
        vehicle_id: &str,
        metadata: AlertMetadata,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        let (metadata_tx, metadata_rx) = watch::channel(metadata);

        let task = SessionTask {
            session_id,
            vehicle_id: vehicle_id.to_string(),
            toggle_interval: config.toggle_interval(),
            publish_timeout: config.publish_timeout(),
            sink,
            cancel_rx,
            metadata_rx,
            output: true,
        };

        let handle = tokio::spawn(task.run()).into();

        Self {
            session_id,
            cancel_tx,
            metadata_tx,
            handle,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Hands new metadata to the session, which publishes a refresh.
    pub fn refresh(&self, metadata: AlertMetadata) {
        self.metadata_tx.send_replace(metadata);
    }

    /// Cancels the session and waits up to `timeout` for it to clear its alert.
    pub async fn stop(mut self, vehicle_id: &str, timeout: time::Duration) -> Result<()> {
        // Session may already be gone, in which case the join below returns immediately
        let _ = self.cancel_tx.send(());

        match time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NotifyError::SessionTaskJoin {
                vehicle_id: vehicle_id.to_string(),
                source: e,
            }),
            Err(_) => {
                self.handle.abort();
                Err(NotifyError::StopTimeout {
                    vehicle_id: vehicle_id.to_string(),
                    timeout,
                })
            }
        }
    }
}

struct SessionTask {
    session_id: Uuid,
    vehicle_id: String,
    toggle_interval: time::Duration,
    publish_timeout: time::Duration,
    sink: Arc<dyn NotificationSink>,
    cancel_rx: broadcast::Receiver<()>,
    metadata_rx: watch::Receiver<AlertMetadata>,
    output: bool,
}

impl SessionTask {
    fn update(&self, kind: AlertUpdateKind, metadata: AlertMetadata) -> AlertUpdate {
        AlertUpdate::new(self.session_id, kind, &self.vehicle_id, metadata, self.output)
    }

    /// Publishes `update` unless cancelled first. Returns `false` once cancelled.
    async fn publish_or_cancel(&mut self, update: AlertUpdate) -> bool {
        let Self {
            sink,
            publish_timeout,
            cancel_rx,
            ..
        } = self;

        tokio::select! {
            biased;
            _ = cancel_rx.recv() => false,
            _ = publish(sink.as_ref(), *publish_timeout, &update) => true,
        }
    }

    async fn run(mut self) {
        info!(session_id = %self.session_id, vehicle = %self.vehicle_id, "alert session started");

        let metadata = *self.metadata_rx.borrow_and_update();
        let alert_on = self.update(AlertUpdateKind::AlertOn, metadata);

        if self.publish_or_cancel(alert_on).await {
            self.blink().await;
        }

        self.output = false;
        let metadata = *self.metadata_rx.borrow();
        let alert_off = self.update(AlertUpdateKind::AlertOff, metadata);
        publish(self.sink.as_ref(), self.publish_timeout, &alert_off).await;

        info!(session_id = %self.session_id, vehicle = %self.vehicle_id, "alert session ended");
    }

    async fn blink(&mut self) {
        let mut next_toggle = Instant::now() + self.toggle_interval;

        loop {
            let update = tokio::select! {
                biased;

                _ = self.cancel_rx.recv() => return,
                changed = self.metadata_rx.changed() => {
                    if changed.is_err() {
                        // Coordinator dropped the session
                        return;
                    }
                    let metadata = *self.metadata_rx.borrow_and_update();
                    self.update(AlertUpdateKind::Refresh, metadata)
                }
                _ = time::sleep_until(next_toggle) => {
                    self.output = !self.output;
                    next_toggle = Instant::now() + self.toggle_interval;
                    debug!(vehicle = %self.vehicle_id, output = self.output, "alert toggle");
                    let metadata = *self.metadata_rx.borrow();
                    self.update(AlertUpdateKind::Toggle, metadata)
                }
            };

            if !self.publish_or_cancel(update).await {
                return;
            }
        }
    }
}

async fn publish(sink: &dyn NotificationSink, timeout: time::Duration, update: &AlertUpdate) {
    if let Err(e) = guarded(timeout, sink.publish(update)).await {
        warn!(
            session_id = %update.session_id,
            vehicle = %update.vehicle_id,
            kind = %update.kind,
            error = %e,
            "alert publish failed"
        );
    }
}
