use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Call state change events published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventType {
    CallUpdated,
    CallTerminating,
    CallHungup,
}

impl CallEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEventType::CallUpdated => "call_updated",
            CallEventType::CallTerminating => "call_terminating",
            CallEventType::CallHungup => "call_hungup",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(
        &self,
        customer_id: Uuid,
        event: CallEventType,
        payload: serde_json::Value,
    ) -> Result<()>;
}

/// Delivers events as JSON POSTs to a configured webhook endpoint.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, client: reqwest::Client) -> Self {
        Self { url, client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(
        &self,
        customer_id: Uuid,
        event: CallEventType,
        payload: serde_json::Value,
    ) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&json!({
                "customer_id": customer_id,
                "event": event,
                "payload": payload,
                "timestamp": Utc::now(),
            }))
            .send()
            .await
            .with_context(|| format!("publishing {} webhook", event.as_str()))?
            .error_for_status()
            .with_context(|| format!("{} webhook rejected", event.as_str()))?;
        Ok(())
    }
}

/// Used when no webhook endpoint is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn publish(
        &self,
        _customer_id: Uuid,
        _event: CallEventType,
        _payload: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}
