use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::Duration;
use uuid::Uuid;

use crate::call::action::MachineHandle;
use crate::call::{Cause, Channel};

pub mod http;

pub use http::{
    HttpAmdDetector, HttpChannelDriver, HttpConfbridgeDriver, HttpRecordingDriver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnoopDirection {
    None,
    In,
    Out,
    Both,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub reference_id: Uuid,
    pub format: String,
    pub tm_start: Option<DateTime<Utc>>,
    pub tm_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingReferenceType {
    Call,
    Confbridge,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct RecordingRequest {
    pub activeflow_id: Uuid,
    pub reference_type: RecordingReferenceType,
    pub reference_id: Uuid,
    pub format: String,
    pub end_of_silence: u32,
    pub end_of_key: String,
    pub duration: u32,
    pub on_end_flow_id: Option<Uuid>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMedia {
    pub id: Uuid,
    pub channel_id: String,
    pub local_ip: Option<String>,
    pub local_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalMediaRequest {
    pub channel_id: String,
    pub external_host: String,
    pub encapsulation: String,
    pub transport: String,
    pub connection_type: String,
    pub format: String,
    pub direction: String,
}

/// Primitive operations on a media server channel.
#[async_trait]
pub trait ChannelDriver: Send + Sync {
    async fn answer(&self, channel_id: &str) -> Result<()>;

    /// Start playing the given media refs in order; `correlation_id` tags the
    /// playback so completion events can be tied back to the action that
    /// started it.
    async fn play(&self, channel_id: &str, media: &[String], correlation_id: &str) -> Result<()>;

    async fn stop_playback(&self, channel_id: &str) -> Result<()>;

    async fn send_dtmf(
        &self,
        channel_id: &str,
        digits: &str,
        duration: Duration,
        interval: Duration,
    ) -> Result<()>;

    /// Switch the channel into an echo application context.
    async fn echo(&self, channel_id: &str) -> Result<()>;

    async fn start_snoop(
        &self,
        channel_id: &str,
        snoop_id: Uuid,
        spy: SnoopDirection,
        whisper: SnoopDirection,
    ) -> Result<Channel>;

    async fn start_external_media(&self, request: &ExternalMediaRequest) -> Result<ExternalMedia>;

    async fn stop_external_media(&self, id: Uuid) -> Result<ExternalMedia>;

    async fn get(&self, channel_id: &str) -> Result<Channel>;

    /// Force-hangup the channel. The returned snapshot is not guaranteed to
    /// have `tm_end` set yet.
    async fn hangup(&self, channel_id: &str, cause: Cause) -> Result<Channel>;
}

/// Conference bridge operations scoped to one bridge.
#[async_trait]
pub trait ConfbridgeDriver: Send + Sync {
    async fn join(&self, confbridge_id: Uuid, call_id: Uuid) -> Result<()>;
    async fn kick(&self, confbridge_id: Uuid, call_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait RecordingDriver: Send + Sync {
    async fn start(&self, request: &RecordingRequest) -> Result<Recording>;
    async fn stop(&self, recording_id: Uuid) -> Result<Recording>;
}

/// Answering machine detection watches keyed by the snoop channel feeding
/// them audio.
#[async_trait]
pub trait AmdDetector: Send + Sync {
    async fn watch(
        &self,
        call_id: Uuid,
        snoop_id: Uuid,
        machine_handle: MachineHandle,
        sync: bool,
    ) -> Result<()>;
}
