use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ActionEngine;
use crate::call::{Action, ActionType, Call, HangupReason};
use crate::event::CallEventType;

impl ActionEngine {
    /// Advance the call to the next flow action. At most one advancement may
    /// be in flight per call; a second trigger arriving while the hold flag
    /// is set is a deliberate no-op.
    pub async fn advance_to_next_action(&self, call_id: Uuid) -> Result<()> {
        let call = self.store.get(call_id).await?;
        if call.status.is_terminated() {
            debug!(call_id = %call.id, "call already hung up, skipping advance");
            return Ok(());
        }

        if !self.store.acquire_hold(call.id).await? {
            debug!(call_id = %call.id, "advancement already in flight, skipping");
            return Ok(());
        }
        let call = self.store.get(call.id).await?;

        match self.advance_held(&call).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // never leave the call stuck in the held state
                if let Err(release_err) = self.store.release_hold(call.id).await {
                    warn!(
                        call_id = %call.id,
                        "failed to release hold after advance error: {}", release_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn advance_held(&self, call: &Call) -> Result<()> {
        self.clean_current_action(call).await?;

        let next = self
            .flow
            .get_next_action(call.activeflow_id, call.action.id)
            .await
            .with_context(|| format!("fetching next action for call {}", call.id))?
            .unwrap_or_else(Action::hangup);

        info!(
            call_id = %call.id,
            action_id = %next.id,
            action_type = ?next.r#type,
            "advancing to next action"
        );

        // the new action and the hold release land in one update
        let call = self.store.set_action(call.id, next, false).await?;
        self.publish_call(&call, CallEventType::CallUpdated).await;

        self.queue.queue_execute(call.id).await
    }

    /// Timer-fired continuation. The armed action's identity is compared
    /// against the call's current action; a mismatch means the timer is
    /// stale and the fire is discarded.
    pub async fn on_action_timeout(&self, call_id: Uuid, action: Action) -> Result<()> {
        let call = self.store.get(call_id).await?;
        if call.status.is_terminated() {
            debug!(call_id = %call.id, "call already hung up, discarding timeout");
            return Ok(());
        }

        if !call.action.matches(&action) {
            debug!(
                call_id = %call.id,
                armed_action_id = %action.id,
                current_action_id = %call.action.id,
                "stale action timeout discarded"
            );
            return Ok(());
        }

        self.channel
            .get(&call.channel_id)
            .await
            .with_context(|| format!("loading channel for timed out call {}", call.id))?;

        self.advance_to_next_action(call.id).await
    }

    /// Unconditionally close out the call's actions, e.g. after the owning
    /// channel has disappeared.
    pub async fn force_advance(&self, call_id: Uuid) -> Result<()> {
        let call = self.store.get(call_id).await?;
        if call.status.is_terminated() {
            debug!(call_id = %call.id, "call already hung up, skipping force advance");
            return Ok(());
        }

        let call = self.store.release_hold(call.id).await?;

        match self.channel.get(&call.channel_id).await {
            Ok(_) => self.advance_to_next_action(call.id).await,
            Err(e) => {
                warn!(
                    call_id = %call.id,
                    channel_id = %call.channel_id,
                    "channel gone, hanging up: {}", e
                );
                let call = self.store.set_hangup(call.id, HangupReason::Failed).await?;
                self.publish_call(&call, CallEventType::CallHungup).await;
                Ok(())
            }
        }
    }

    /// Tear down whatever the current action left running before a new one
    /// supersedes it. Returns true when the previous action was a
    /// no-side-effect type and the caller can skip waiting entirely.
    pub async fn clean_current_action(&self, call: &Call) -> Result<bool> {
        if call.action.r#type == ActionType::Sleep {
            return Ok(true);
        }

        let channel = self.channel.get(&call.channel_id).await?;
        if channel.playback_active() {
            debug!(call_id = %call.id, "stopping active playback");
            self.channel.stop_playback(&call.channel_id).await?;
        }
        if let Some(confbridge_id) = call.confbridge_id {
            debug!(call_id = %call.id, confbridge_id = %confbridge_id, "kicking from confbridge");
            self.confbridge.kick(confbridge_id, call.id).await?;
        }
        Ok(false)
    }
}
