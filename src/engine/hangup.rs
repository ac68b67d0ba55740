use anyhow::{Context, Result};
use tracing::info;

use super::{ActionEngine, Completion};
use crate::call::action::HangupOption;
use crate::call::{Action, Call, CallStatus, Cause, HangupReason};
use crate::event::CallEventType;

/// Fixed mapping from symbolic hangup reasons to protocol cause codes.
pub fn cause_from_reason(reason: HangupReason) -> Cause {
    match reason {
        HangupReason::Normal | HangupReason::Cancel | HangupReason::Amd => Cause::NORMAL_CLEARING,
        HangupReason::Busy => Cause::USER_BUSY,
        HangupReason::NoAnswer => Cause::NO_ANSWER,
        HangupReason::Timeout => Cause::NO_USER_RESPONSE,
        HangupReason::Failed => Cause::NETWORK_OUT_OF_ORDER,
    }
}

impl ActionEngine {
    pub(super) async fn run_hangup(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: HangupOption = action.decode_option()?;
        let cause = self.resolve_cause(&option).await?;
        self.terminate(call, cause).await?;
        Ok(Completion::Await)
    }

    /// An explicit reason wins; otherwise a referenced call donates the
    /// hangup cause its channel recorded. The referenced call is read-only
    /// here.
    async fn resolve_cause(&self, option: &HangupOption) -> Result<Cause> {
        if let Some(reason) = option.reason {
            return Ok(cause_from_reason(reason));
        }

        if let Some(reference_id) = option.reference_id {
            let reference = self
                .store
                .get(reference_id)
                .await
                .with_context(|| format!("loading hangup reference call {}", reference_id))?;
            let channel = self
                .channel
                .get(&reference.channel_id)
                .await
                .with_context(|| format!("loading channel of reference call {}", reference_id))?;
            return Ok(channel.hangup_cause);
        }

        Ok(Cause::NORMAL_CLEARING)
    }

    /// Move the call to `Terminating` and issue the driver hangup. The
    /// status write and the terminating event both land before the driver
    /// call, so observers see the intermediate state even when the driver
    /// is slow or fails. The returned channel snapshot may not have ended
    /// yet.
    pub(crate) async fn terminate(&self, call: &Call, cause: Cause) -> Result<()> {
        let call = self
            .store
            .set_status(call.id, CallStatus::Terminating)
            .await?;
        self.publish_call(&call, CallEventType::CallTerminating).await;

        let channel = self
            .channel
            .hangup(&call.channel_id, cause)
            .await
            .with_context(|| format!("hanging up channel {} of call {}", call.channel_id, call.id))?;

        info!(call_id = %call.id, cause = %cause, "hangup issued");
        if channel.tm_end.is_some() {
            self.publish_call(&call, CallEventType::CallHungup).await;
        }
        Ok(())
    }
}
