use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::call::action::{
    AmdOption, ConfbridgeJoinOption, DigitsReceiveOption, DigitsSendOption,
    ExternalMediaStartOption, PlayOption, RecordingStartOption, StreamEchoOption, TalkOption,
};
use crate::call::{Action, ActionType, Call, CallStatus};
use crate::driver::{
    AmdDetector, ChannelDriver, ConfbridgeDriver, ExternalMediaRequest, RecordingDriver,
    RecordingReferenceType, RecordingRequest, SnoopDirection,
};
use crate::event::{CallEventType, Notifier};
use crate::flow::FlowClient;
use crate::store::CallStore;
use crate::synthesis::SynthesisClient;

pub mod advance;
pub mod digits;
pub mod hangup;
pub mod queue;

#[cfg(test)]
mod tests;

pub use queue::EngineQueue;

/// Upper bound on one speech synthesis round trip.
pub const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Scheme marker prefixed onto media references handed to the channel
/// driver.
pub const MEDIA_SCHEME: &str = "sound:";

pub(crate) fn media_uri(url: &str) -> String {
    format!("{}{}", MEDIA_SCHEME, url)
}

/// How an executed action completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Done, advance to the next flow action now.
    Advance,
    /// A channel event will drive the next trigger.
    Await,
    /// Arm a timer carrying the executed action's identity.
    ArmTimeout(Duration),
}

/// The call action execution and advancement engine. Stateless between
/// triggers: every load and mutation goes through the store, so any
/// instance can pick up any trigger.
pub struct ActionEngine {
    channel: Arc<dyn ChannelDriver>,
    confbridge: Arc<dyn ConfbridgeDriver>,
    recording: Arc<dyn RecordingDriver>,
    amd: Arc<dyn AmdDetector>,
    synthesis: Arc<dyn SynthesisClient>,
    flow: Arc<dyn FlowClient>,
    store: Arc<dyn CallStore>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<dyn EngineQueue>,
}

impl ActionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: Arc<dyn ChannelDriver>,
        confbridge: Arc<dyn ConfbridgeDriver>,
        recording: Arc<dyn RecordingDriver>,
        amd: Arc<dyn AmdDetector>,
        synthesis: Arc<dyn SynthesisClient>,
        flow: Arc<dyn FlowClient>,
        store: Arc<dyn CallStore>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<dyn EngineQueue>,
    ) -> Self {
        Self {
            channel,
            confbridge,
            recording,
            amd,
            synthesis,
            flow,
            store,
            notifier,
            queue,
        }
    }

    /// Execute the action currently assigned to the call and apply its
    /// completion mode. Advances at most once per invocation.
    pub async fn execute_current_action(&self, call_id: Uuid) -> Result<()> {
        let call = self.store.get(call_id).await?;
        if call.status.is_terminated() {
            debug!(call_id = %call.id, "call already hung up, skipping execute");
            return Ok(());
        }

        let mut action = call.action.clone();
        action.tm_execute = Some(Utc::now());
        let call = self
            .store
            .set_action(call.id, action.clone(), call.action_next_hold)
            .await?;

        info!(
            call_id = %call.id,
            action_id = %action.id,
            action_type = ?action.r#type,
            "executing action"
        );

        let completion = self
            .run_action(&call, &action)
            .await
            .with_context(|| format!("executing {:?} action {} on call {}", action.r#type, action.id, call.id))?;

        match completion {
            Completion::Advance => self.advance_to_next_action(call.id).await,
            Completion::Await => Ok(()),
            Completion::ArmTimeout(after) => self.queue.arm_timeout(call.id, action, after).await,
        }
    }

    async fn run_action(&self, call: &Call, action: &Action) -> Result<Completion> {
        match action.r#type {
            ActionType::Answer => self.run_answer(call).await,
            ActionType::Talk => self.run_talk(call, action).await,
            ActionType::Play => self.run_play(call, action).await,
            ActionType::RecordingStart => self.run_recording_start(call, action).await,
            ActionType::RecordingStop => self.run_recording_stop(call).await,
            ActionType::DigitsReceive => self.run_digits_receive(call, action).await,
            ActionType::DigitsSend => self.run_digits_send(call, action).await,
            ActionType::ExternalMediaStart => self.run_external_media_start(call, action).await,
            ActionType::ExternalMediaStop => self.run_external_media_stop(call).await,
            ActionType::ConfbridgeJoin => self.run_confbridge_join(call, action).await,
            ActionType::StreamEcho => self.run_stream_echo(call, action).await,
            ActionType::Amd => self.run_amd(call, action).await,
            ActionType::Sleep => Ok(Completion::Advance),
            ActionType::Hangup => self.run_hangup(call, action).await,
        }
    }

    async fn run_answer(&self, call: &Call) -> Result<Completion> {
        if call.status != CallStatus::Progressing {
            self.channel.answer(&call.channel_id).await?;
        }
        Ok(Completion::Advance)
    }

    async fn run_talk(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: TalkOption = action.decode_option()?;
        if option.text.is_empty() {
            bail!("talk action {} requires text", action.id);
        }

        if call.status != CallStatus::Progressing {
            self.channel.answer(&call.channel_id).await?;
        }

        let media = timeout(
            SYNTHESIS_TIMEOUT,
            self.synthesis.synthesize(&option.text, &option.language),
        )
        .await
        .map_err(|_| anyhow!("speech synthesis timed out after {:?}", SYNTHESIS_TIMEOUT))??;

        self.channel
            .play(&call.channel_id, &[media_uri(&media)], &action.id.to_string())
            .await?;

        if option.r#async {
            Ok(Completion::Advance)
        } else {
            Ok(Completion::Await)
        }
    }

    async fn run_play(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: PlayOption = action.decode_option()?;
        if option.stream_urls.is_empty() {
            bail!("play action {} requires stream_urls", action.id);
        }

        let media: Vec<String> = option.stream_urls.iter().map(|url| media_uri(url)).collect();
        self.channel
            .play(&call.channel_id, &media, &action.id.to_string())
            .await?;
        Ok(Completion::Await)
    }

    async fn run_recording_start(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: RecordingStartOption = action.decode_option()?;
        if call.recording_id.is_some() {
            bail!("call {} already has an active recording", call.id);
        }

        let format = if option.format.is_empty() {
            "wav".to_string()
        } else {
            option.format
        };
        let request = RecordingRequest {
            activeflow_id: call.activeflow_id,
            reference_type: RecordingReferenceType::Call,
            reference_id: call.id,
            format,
            end_of_silence: option.end_of_silence,
            end_of_key: option.end_of_key,
            duration: option.duration,
            on_end_flow_id: option.on_end_flow_id,
        };

        let recording = self.recording.start(&request).await?;
        self.store
            .set_recording_id(call.id, Some(recording.id))
            .await?;
        self.store.add_recording_id(call.id, recording.id).await?;

        info!(call_id = %call.id, recording_id = %recording.id, "recording started");
        Ok(Completion::Advance)
    }

    async fn run_recording_stop(&self, call: &Call) -> Result<Completion> {
        let recording_id = call
            .recording_id
            .ok_or_else(|| anyhow!("call {} has no active recording", call.id))?;

        self.recording.stop(recording_id).await?;
        self.store.set_recording_id(call.id, None).await?;
        Ok(Completion::Advance)
    }

    async fn run_digits_receive(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: DigitsReceiveOption = action.decode_option()?;
        let variables = self.flow.get_variables(call.activeflow_id).await?;
        let received = variables
            .get(digits::DIGITS_VARIABLE)
            .map(String::as_str)
            .unwrap_or_default();

        if digits::digits_complete(received, &option) {
            debug!(call_id = %call.id, digits = received, "digit collection complete");
            return Ok(Completion::Advance);
        }
        Ok(Completion::ArmTimeout(Duration::from_millis(option.duration)))
    }

    async fn run_digits_send(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: DigitsSendOption = action.decode_option()?;
        if option.digits.is_empty() {
            bail!("digits_send action {} requires digits", action.id);
        }

        let duration = Duration::from_millis(option.duration);
        let interval = Duration::from_millis(option.interval);
        self.channel
            .send_dtmf(&call.channel_id, &option.digits, duration, interval)
            .await?;

        // guard timeout covering the whole tone train
        let guard = duration + interval * (option.digits.len() as u32 - 1);
        Ok(Completion::ArmTimeout(guard))
    }

    async fn run_external_media_start(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: ExternalMediaStartOption = action.decode_option()?;
        if option.external_host.is_empty() {
            bail!(
                "external_media_start action {} requires external_host",
                action.id
            );
        }

        let request = ExternalMediaRequest {
            channel_id: call.channel_id.clone(),
            external_host: option.external_host,
            encapsulation: option.encapsulation,
            transport: option.transport,
            connection_type: option.connection_type,
            format: option.format,
            direction: option.direction,
        };
        let media = self.channel.start_external_media(&request).await?;
        self.store
            .set_external_media_id(call.id, Some(media.id))
            .await?;
        Ok(Completion::Advance)
    }

    async fn run_external_media_stop(&self, call: &Call) -> Result<Completion> {
        let external_media_id = call
            .external_media_id
            .ok_or_else(|| anyhow!("call {} has no external media", call.id))?;

        self.channel.stop_external_media(external_media_id).await?;
        self.store.set_external_media_id(call.id, None).await?;
        Ok(Completion::Advance)
    }

    async fn run_confbridge_join(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: ConfbridgeJoinOption = action.decode_option()?;
        if option.confbridge_id.is_nil() {
            bail!(
                "confbridge_join action {} requires confbridge_id",
                action.id
            );
        }

        self.confbridge.join(option.confbridge_id, call.id).await?;
        Ok(Completion::Await)
    }

    async fn run_stream_echo(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: StreamEchoOption = action.decode_option()?;
        self.channel.echo(&call.channel_id).await?;
        Ok(Completion::ArmTimeout(Duration::from_millis(option.duration)))
    }

    async fn run_amd(&self, call: &Call, action: &Action) -> Result<Completion> {
        let option: AmdOption = action.decode_option()?;

        let snoop_id = Uuid::new_v4();
        self.channel
            .start_snoop(
                &call.channel_id,
                snoop_id,
                SnoopDirection::Both,
                SnoopDirection::None,
            )
            .await?;
        self.amd
            .watch(call.id, snoop_id, option.machine_handle, option.sync)
            .await?;

        if option.sync {
            Ok(Completion::Await)
        } else {
            Ok(Completion::Advance)
        }
    }

    pub(crate) async fn publish_call(&self, call: &Call, event: CallEventType) {
        let payload = match serde_json::to_value(call) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(call_id = %call.id, "failed to encode call payload: {}", e);
                return;
            }
        };
        if let Err(e) = self.notifier.publish(call.customer_id, event, payload).await {
            warn!(
                call_id = %call.id,
                "failed to publish {} event: {}",
                event.as_str(),
                e
            );
        }
    }
}
