use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::call::action::MachineHandle;
use crate::call::{Action, ActionType, Call, CallStatus, Cause, Channel};
use crate::driver::{
    AmdDetector, ChannelDriver, ConfbridgeDriver, ExternalMedia, ExternalMediaRequest, Recording,
    RecordingDriver, RecordingRequest, SnoopDirection,
};
use crate::engine::digits::DIGITS_VARIABLE;
use crate::engine::queue::{EngineJob, EngineQueue};
use crate::engine::ActionEngine;
use crate::event::{CallEventType, Notifier};
use crate::flow::{FlowClient, Variables};
use crate::store::{CallStore, MemoryCallStore};
use crate::synthesis::SynthesisClient;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCommand {
    Answer(String),
    Play {
        channel_id: String,
        media: Vec<String>,
        correlation_id: String,
    },
    StopPlayback(String),
    SendDtmf {
        channel_id: String,
        digits: String,
        duration: Duration,
        interval: Duration,
    },
    Echo(String),
    StartSnoop {
        channel_id: String,
        spy: SnoopDirection,
        whisper: SnoopDirection,
    },
    StartExternalMedia(String),
    StopExternalMedia(Uuid),
    Hangup {
        channel_id: String,
        cause: Cause,
    },
}

pub struct MockChannelDriver {
    pub channels: Mutex<HashMap<String, Channel>>,
    pub commands: Mutex<Vec<ChannelCommand>>,
    /// Whether a hangup returns a snapshot that has already ended.
    pub end_on_hangup: AtomicBool,
}

impl MockChannelDriver {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            end_on_hangup: AtomicBool::new(true),
        }
    }

    pub fn insert_channel(&self, channel: Channel) {
        self.channels
            .lock()
            .unwrap()
            .insert(channel.id.clone(), channel);
    }

    pub fn remove_channel(&self, channel_id: &str) {
        self.channels.lock().unwrap().remove(channel_id);
    }

    pub fn commands(&self) -> Vec<ChannelCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: ChannelCommand) {
        self.commands.lock().unwrap().push(command);
    }

    fn channel(&self, channel_id: &str) -> Result<Channel> {
        self.channels
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| anyhow!("channel {} not found", channel_id))
    }
}

#[async_trait]
impl ChannelDriver for MockChannelDriver {
    async fn answer(&self, channel_id: &str) -> Result<()> {
        self.channel(channel_id)?;
        self.record(ChannelCommand::Answer(channel_id.to_string()));
        Ok(())
    }

    async fn play(&self, channel_id: &str, media: &[String], correlation_id: &str) -> Result<()> {
        self.channel(channel_id)?;
        self.record(ChannelCommand::Play {
            channel_id: channel_id.to_string(),
            media: media.to_vec(),
            correlation_id: correlation_id.to_string(),
        });
        Ok(())
    }

    async fn stop_playback(&self, channel_id: &str) -> Result<()> {
        if let Some(channel) = self.channels.lock().unwrap().get_mut(channel_id) {
            channel.playback_id = None;
        }
        self.record(ChannelCommand::StopPlayback(channel_id.to_string()));
        Ok(())
    }

    async fn send_dtmf(
        &self,
        channel_id: &str,
        digits: &str,
        duration: Duration,
        interval: Duration,
    ) -> Result<()> {
        self.channel(channel_id)?;
        self.record(ChannelCommand::SendDtmf {
            channel_id: channel_id.to_string(),
            digits: digits.to_string(),
            duration,
            interval,
        });
        Ok(())
    }

    async fn echo(&self, channel_id: &str) -> Result<()> {
        self.channel(channel_id)?;
        self.record(ChannelCommand::Echo(channel_id.to_string()));
        Ok(())
    }

    async fn start_snoop(
        &self,
        channel_id: &str,
        snoop_id: Uuid,
        spy: SnoopDirection,
        whisper: SnoopDirection,
    ) -> Result<Channel> {
        self.channel(channel_id)?;
        self.record(ChannelCommand::StartSnoop {
            channel_id: channel_id.to_string(),
            spy,
            whisper,
        });
        Ok(Channel {
            id: snoop_id.to_string(),
            ..Channel::default()
        })
    }

    async fn start_external_media(&self, request: &ExternalMediaRequest) -> Result<ExternalMedia> {
        self.channel(&request.channel_id)?;
        self.record(ChannelCommand::StartExternalMedia(
            request.channel_id.clone(),
        ));
        Ok(ExternalMedia {
            id: Uuid::new_v4(),
            channel_id: request.channel_id.clone(),
            local_ip: None,
            local_port: None,
        })
    }

    async fn stop_external_media(&self, id: Uuid) -> Result<ExternalMedia> {
        self.record(ChannelCommand::StopExternalMedia(id));
        Ok(ExternalMedia {
            id,
            channel_id: String::new(),
            local_ip: None,
            local_port: None,
        })
    }

    async fn get(&self, channel_id: &str) -> Result<Channel> {
        self.channel(channel_id)
    }

    async fn hangup(&self, channel_id: &str, cause: Cause) -> Result<Channel> {
        let mut channel = self.channel(channel_id)?;
        self.record(ChannelCommand::Hangup {
            channel_id: channel_id.to_string(),
            cause,
        });
        channel.hangup_cause = cause;
        if self.end_on_hangup.load(Ordering::Relaxed) {
            channel.tm_end = Some(Utc::now());
        }
        Ok(channel)
    }
}

#[derive(Default)]
pub struct MockConfbridgeDriver {
    pub joins: Mutex<Vec<(Uuid, Uuid)>>,
    pub kicks: Mutex<Vec<(Uuid, Uuid)>>,
}

#[async_trait]
impl ConfbridgeDriver for MockConfbridgeDriver {
    async fn join(&self, confbridge_id: Uuid, call_id: Uuid) -> Result<()> {
        self.joins.lock().unwrap().push((confbridge_id, call_id));
        Ok(())
    }

    async fn kick(&self, confbridge_id: Uuid, call_id: Uuid) -> Result<()> {
        self.kicks.lock().unwrap().push((confbridge_id, call_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRecordingDriver {
    pub started: Mutex<Vec<RecordingRequest>>,
    pub stopped: Mutex<Vec<Uuid>>,
    pub fail_start: AtomicBool,
}

#[async_trait]
impl RecordingDriver for MockRecordingDriver {
    async fn start(&self, request: &RecordingRequest) -> Result<Recording> {
        if self.fail_start.load(Ordering::Relaxed) {
            bail!("recording backend unavailable");
        }
        self.started.lock().unwrap().push(request.clone());
        Ok(Recording {
            id: Uuid::new_v4(),
            reference_id: request.reference_id,
            format: request.format.clone(),
            tm_start: Some(Utc::now()),
            tm_end: None,
        })
    }

    async fn stop(&self, recording_id: Uuid) -> Result<Recording> {
        self.stopped.lock().unwrap().push(recording_id);
        Ok(Recording {
            id: recording_id,
            reference_id: Uuid::new_v4(),
            format: "wav".to_string(),
            tm_start: Some(Utc::now()),
            tm_end: Some(Utc::now()),
        })
    }
}

#[derive(Default)]
pub struct MockAmdDetector {
    pub watches: Mutex<Vec<(Uuid, Uuid, MachineHandle, bool)>>,
}

#[async_trait]
impl AmdDetector for MockAmdDetector {
    async fn watch(
        &self,
        call_id: Uuid,
        snoop_id: Uuid,
        machine_handle: MachineHandle,
        sync: bool,
    ) -> Result<()> {
        self.watches
            .lock()
            .unwrap()
            .push((call_id, snoop_id, machine_handle, sync));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSynthesisClient {
    pub requests: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SynthesisClient for MockSynthesisClient {
    async fn synthesize(&self, text: &str, language: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        Ok("tts-output.wav".to_string())
    }
}

#[derive(Default)]
pub struct MockFlowClient {
    pub next: Mutex<VecDeque<Action>>,
    pub variables: Mutex<Variables>,
    pub requests: Mutex<Vec<(Uuid, Uuid)>>,
    pub fail_next: AtomicBool,
}

impl MockFlowClient {
    pub fn push_next(&self, action: Action) {
        self.next.lock().unwrap().push_back(action);
    }

    pub fn set_digits(&self, digits: &str) {
        self.variables
            .lock()
            .unwrap()
            .insert(DIGITS_VARIABLE.to_string(), digits.to_string());
    }

    pub fn requests(&self) -> Vec<(Uuid, Uuid)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowClient for MockFlowClient {
    async fn get_next_action(
        &self,
        activeflow_id: Uuid,
        current_action_id: Uuid,
    ) -> Result<Option<Action>> {
        if self.fail_next.load(Ordering::Relaxed) {
            bail!("flow engine unavailable");
        }
        self.requests
            .lock()
            .unwrap()
            .push((activeflow_id, current_action_id));
        Ok(self.next.lock().unwrap().pop_front())
    }

    async fn get_variables(&self, _activeflow_id: Uuid) -> Result<Variables> {
        Ok(self.variables.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub events: Mutex<Vec<(Uuid, CallEventType)>>,
}

impl MockNotifier {
    pub fn event_types(&self) -> Vec<CallEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| *event)
            .collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn publish(
        &self,
        customer_id: Uuid,
        event: CallEventType,
        _payload: serde_json::Value,
    ) -> Result<()> {
        self.events.lock().unwrap().push((customer_id, event));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockQueue {
    pub jobs: Mutex<Vec<EngineJob>>,
}

impl MockQueue {
    pub fn jobs(&self) -> Vec<EngineJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineQueue for MockQueue {
    async fn queue_execute(&self, call_id: Uuid) -> Result<()> {
        self.jobs.lock().unwrap().push(EngineJob::Execute { call_id });
        Ok(())
    }

    async fn arm_timeout(&self, call_id: Uuid, action: Action, after: Duration) -> Result<()> {
        self.jobs.lock().unwrap().push(EngineJob::Timeout {
            call_id,
            action,
            after,
        });
        Ok(())
    }
}

pub struct TestContext {
    pub channel: Arc<MockChannelDriver>,
    pub confbridge: Arc<MockConfbridgeDriver>,
    pub recording: Arc<MockRecordingDriver>,
    pub amd: Arc<MockAmdDetector>,
    pub synthesis: Arc<MockSynthesisClient>,
    pub flow: Arc<MockFlowClient>,
    pub store: Arc<MemoryCallStore>,
    pub notifier: Arc<MockNotifier>,
    pub queue: Arc<MockQueue>,
    pub engine: ActionEngine,
}

impl TestContext {
    pub fn new() -> Self {
        let channel = Arc::new(MockChannelDriver::new());
        let confbridge = Arc::new(MockConfbridgeDriver::default());
        let recording = Arc::new(MockRecordingDriver::default());
        let amd = Arc::new(MockAmdDetector::default());
        let synthesis = Arc::new(MockSynthesisClient::default());
        let flow = Arc::new(MockFlowClient::default());
        let store = Arc::new(MemoryCallStore::new());
        let notifier = Arc::new(MockNotifier::default());
        let queue = Arc::new(MockQueue::default());

        let engine = ActionEngine::new(
            channel.clone(),
            confbridge.clone(),
            recording.clone(),
            amd.clone(),
            synthesis.clone(),
            flow.clone(),
            store.clone(),
            notifier.clone(),
            queue.clone(),
        );

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
            engine,
        }
    }

    pub async fn seed_call_with<F>(&self, mutate: F) -> Call
    where
        F: FnOnce(&mut Call),
    {
        let channel_id = format!("chan-{}", Uuid::new_v4());
        let mut call = Call::new(Uuid::new_v4(), &channel_id, Uuid::new_v4(), Uuid::new_v4());
        mutate(&mut call);
        self.channel.insert_channel(Channel {
            id: call.channel_id.clone(),
            ..Channel::default()
        });
        self.store.create(call).await.unwrap()
    }

    pub async fn seed_call(&self, status: CallStatus, action: Action) -> Call {
        self.seed_call_with(|call| {
            call.status = status;
            call.action = action;
        })
        .await
    }
}

pub fn action(r#type: ActionType, option: serde_json::Value) -> Action {
    Action::new(r#type, option)
}
