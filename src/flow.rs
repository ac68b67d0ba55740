use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use uuid::Uuid;

use crate::call::Action;

/// Key/value variables scoped to one activeflow.
pub type Variables = HashMap<String, String>;

/// The flow engine: supplies the action following a just-completed one and
/// the activeflow's variable store.
#[async_trait]
pub trait FlowClient: Send + Sync {
    /// `None` means the flow is exhausted.
    async fn get_next_action(
        &self,
        activeflow_id: Uuid,
        current_action_id: Uuid,
    ) -> Result<Option<Action>>;

    async fn get_variables(&self, activeflow_id: Uuid) -> Result<Variables>;
}

pub struct HttpFlowClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFlowClient {
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl FlowClient for HttpFlowClient {
    async fn get_next_action(
        &self,
        activeflow_id: Uuid,
        current_action_id: Uuid,
    ) -> Result<Option<Action>> {
        let response = self
            .client
            .get(format!(
                "{}/activeflows/{}/next-action",
                self.base_url, activeflow_id
            ))
            .query(&[("current_action_id", current_action_id.to_string())])
            .send()
            .await
            .with_context(|| format!("next action request for activeflow {}", activeflow_id))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let action = response
            .error_for_status()
            .with_context(|| format!("next action rejected for activeflow {}", activeflow_id))?
            .json()
            .await
            .context("decoding next action")?;
        Ok(Some(action))
    }

    async fn get_variables(&self, activeflow_id: Uuid) -> Result<Variables> {
        let variables = self
            .client
            .get(format!(
                "{}/activeflows/{}/variables",
                self.base_url, activeflow_id
            ))
            .send()
            .await
            .with_context(|| format!("variables request for activeflow {}", activeflow_id))?
            .error_for_status()
            .with_context(|| format!("variables rejected for activeflow {}", activeflow_id))?
            .json()
            .await
            .context("decoding activeflow variables")?;
        Ok(variables)
    }
}
