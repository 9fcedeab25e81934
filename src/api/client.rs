use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tokio::time;

use crate::{
    controller::{
        CommandAck, SignalCommander, SignalState,
        error::{Result, SignalControllerError},
    },
    geo::Axis,
};

use super::models::{CommandResponse, PriorityBody};

/// [`SignalCommander`] reaching a signal controller served on another host through its HTTP
/// routes.
#[derive(Debug, Clone)]
pub struct RemoteSignalController {
    base_url: String,
    client: Client,
}

impl RemoteSignalController {
    /// Creates a client for the controller served at `base_url`, e.g. `http://10.0.0.2:5001`.
    pub fn new(base_url: impl Into<String>, request_timeout: time::Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(SignalControllerError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn command<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<CommandAck> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;

        let res: CommandResponse = Self::read(response).await?;
        Ok(res.ack)
    }
}

#[async_trait]
impl SignalCommander for RemoteSignalController {
    async fn engage(&self, axis: Axis, duration: time::Duration) -> Result<CommandAck> {
        self.command("/api/priority", &PriorityBody::new(axis, Some(duration)))
            .await
    }

    async fn engage_hold(&self, axis: Axis) -> Result<CommandAck> {
        self.command("/api/priority_hold", &PriorityBody::new(axis, None))
            .await
    }

    async fn release(&self) -> Result<CommandAck> {
        self.command("/api/priority_release", &json!({})).await
    }

    async fn state(&self) -> Result<SignalState> {
        let response = self
            .client
            .get(format!("{}/api/state", self.base_url))
            .send()
            .await?;

        Self::read(response).await
    }
}
