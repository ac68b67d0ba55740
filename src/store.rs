use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::call::{Action, AmdStatus, Call, CallStatus, HangupReason};

/// Persistence for call records. All cross-trigger state lives here; the
/// engine keeps nothing in memory between triggers.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create(&self, call: Call) -> Result<Call>;

    async fn get(&self, id: Uuid) -> Result<Call>;

    async fn get_by_channel(&self, channel_id: &str) -> Result<Call>;

    async fn set_status(&self, id: Uuid, status: CallStatus) -> Result<Call>;

    /// Persist a new current action and the hold flag in one update.
    async fn set_action(&self, id: Uuid, action: Action, hold: bool) -> Result<Call>;

    /// Claim the advancement slot. Returns false when it is already held;
    /// this is the compare-and-swap enforcing at most one advancement in
    /// flight per call.
    async fn acquire_hold(&self, id: Uuid) -> Result<bool>;

    async fn release_hold(&self, id: Uuid) -> Result<Call>;

    async fn set_recording_id(&self, id: Uuid, recording_id: Option<Uuid>) -> Result<Call>;

    async fn add_recording_id(&self, id: Uuid, recording_id: Uuid) -> Result<Call>;

    async fn set_external_media_id(&self, id: Uuid, external_media_id: Option<Uuid>)
        -> Result<Call>;

    async fn set_amd_status(&self, id: Uuid, status: AmdStatus) -> Result<Call>;

    /// Mark the call hung up. The reason is set once and never overwritten.
    async fn set_hangup(&self, id: Uuid, reason: HangupReason) -> Result<Call>;
}

/// In-memory store, the default backend and the one the tests run against.
#[derive(Default)]
pub struct MemoryCallStore {
    calls: RwLock<HashMap<Uuid, Call>>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, mutate: F) -> Result<Call>
    where
        F: FnOnce(&mut Call),
    {
        let mut calls = self
            .calls
            .write()
            .map_err(|_| anyhow!("call store lock poisoned"))?;
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| anyhow!("call {} not found", id))?;
        mutate(call);
        call.tm_update = Utc::now();
        Ok(call.clone())
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn create(&self, call: Call) -> Result<Call> {
        let mut calls = self
            .calls
            .write()
            .map_err(|_| anyhow!("call store lock poisoned"))?;
        if calls.contains_key(&call.id) {
            bail!("call {} already exists", call.id);
        }
        calls.insert(call.id, call.clone());
        Ok(call)
    }

    async fn get(&self, id: Uuid) -> Result<Call> {
        let calls = self
            .calls
            .read()
            .map_err(|_| anyhow!("call store lock poisoned"))?;
        calls
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("call {} not found", id))
    }

    async fn get_by_channel(&self, channel_id: &str) -> Result<Call> {
        let calls = self
            .calls
            .read()
            .map_err(|_| anyhow!("call store lock poisoned"))?;
        calls
            .values()
            .find(|call| call.channel_id == channel_id)
            .cloned()
            .ok_or_else(|| anyhow!("no call for channel {}", channel_id))
    }

    async fn set_status(&self, id: Uuid, status: CallStatus) -> Result<Call> {
        self.update(id, |call| call.status = status)
    }

    async fn set_action(&self, id: Uuid, action: Action, hold: bool) -> Result<Call> {
        self.update(id, |call| {
            call.action = action;
            call.action_next_hold = hold;
        })
    }

    async fn acquire_hold(&self, id: Uuid) -> Result<bool> {
        let mut calls = self
            .calls
            .write()
            .map_err(|_| anyhow!("call store lock poisoned"))?;
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| anyhow!("call {} not found", id))?;
        if call.action_next_hold {
            return Ok(false);
        }
        call.action_next_hold = true;
        call.tm_update = Utc::now();
        Ok(true)
    }

    async fn release_hold(&self, id: Uuid) -> Result<Call> {
        self.update(id, |call| call.action_next_hold = false)
    }

    async fn set_recording_id(&self, id: Uuid, recording_id: Option<Uuid>) -> Result<Call> {
        self.update(id, |call| call.recording_id = recording_id)
    }

    async fn add_recording_id(&self, id: Uuid, recording_id: Uuid) -> Result<Call> {
        self.update(id, |call| call.recording_ids.push(recording_id))
    }

    async fn set_external_media_id(
        &self,
        id: Uuid,
        external_media_id: Option<Uuid>,
    ) -> Result<Call> {
        self.update(id, |call| call.external_media_id = external_media_id)
    }

    async fn set_amd_status(&self, id: Uuid, status: AmdStatus) -> Result<Call> {
        self.update(id, |call| call.amd_status = Some(status))
    }

    async fn set_hangup(&self, id: Uuid, reason: HangupReason) -> Result<Call> {
        self.update(id, |call| {
            call.status = CallStatus::Hangup;
            if call.hangup_reason.is_none() {
                call.hangup_reason = Some(reason);
            }
            call.tm_hangup = Some(Utc::now());
        })
    }
}
