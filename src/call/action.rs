use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use super::HangupReason;

/// The closed set of flow actions this engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Answer,
    Talk,
    Play,
    RecordingStart,
    RecordingStop,
    DigitsReceive,
    DigitsSend,
    ExternalMediaStart,
    ExternalMediaStop,
    ConfbridgeJoin,
    StreamEcho,
    Amd,
    Sleep,
    Hangup,
}

/// One step of a flow. The option document is decoded per type when the
/// action is executed.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub r#type: ActionType,
    #[serde(default)]
    pub option: serde_json::Value,
    /// Stamped when the action is dispatched; timers carry it back so stale
    /// fires can be told apart from live ones.
    pub tm_execute: Option<DateTime<Utc>>,
}

impl Action {
    pub fn new(r#type: ActionType, option: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            r#type,
            option,
            tm_execute: None,
        }
    }

    /// Fallback action when the flow has no further steps.
    pub fn hangup() -> Self {
        Self::new(ActionType::Hangup, serde_json::Value::Null)
    }

    /// Whether `other` refers to this exact action instance. Both the ID and
    /// the dispatch timestamp must agree.
    pub fn matches(&self, other: &Action) -> bool {
        self.id == other.id && self.tm_execute == other.tm_execute
    }

    pub fn decode_option<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if self.option.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.option.clone())
            .with_context(|| format!("invalid {:?} option on action {}", self.r#type, self.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TalkOption {
    pub text: String,
    pub language: String,
    pub voice: Option<String>,
    /// Advance right after issuing playback instead of waiting for the
    /// playback-finished event.
    pub r#async: bool,
}

impl Default for TalkOption {
    fn default() -> Self {
        Self {
            text: String::new(),
            language: "en-US".to_string(),
            voice: None,
            r#async: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayOption {
    pub stream_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordingStartOption {
    pub format: String,
    /// Seconds of silence ending the recording.
    pub end_of_silence: u32,
    /// DTMF digit ending the recording.
    pub end_of_key: String,
    /// Max duration in seconds.
    pub duration: u32,
    pub on_end_flow_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DigitsReceiveOption {
    /// Collection is complete once this many digits have accumulated.
    pub length: usize,
    /// Finish key. Only a single-character key can ever match.
    pub key: String,
    /// Milliseconds to wait before re-evaluating.
    pub duration: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DigitsSendOption {
    pub digits: String,
    /// Per-digit tone duration in milliseconds.
    pub duration: u64,
    /// Gap between digits in milliseconds.
    pub interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalMediaStartOption {
    pub external_host: String,
    pub encapsulation: String,
    pub transport: String,
    pub connection_type: String,
    pub format: String,
    pub direction: String,
}

impl Default for ExternalMediaStartOption {
    fn default() -> Self {
        Self {
            external_host: String::new(),
            encapsulation: "rtp".to_string(),
            transport: "udp".to_string(),
            connection_type: "client".to_string(),
            format: "ulaw".to_string(),
            direction: "both".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfbridgeJoinOption {
    pub confbridge_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamEchoOption {
    /// Milliseconds to keep echoing before the timeout advances the call.
    pub duration: u64,
}

/// Policy applied when the detector decides a machine answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineHandle {
    #[default]
    Continue,
    Hangup,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AmdOption {
    pub machine_handle: MachineHandle,
    /// When true, advancement is deferred to the detection result.
    pub sync: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HangupOption {
    pub reason: Option<HangupReason>,
    /// Another call whose channel's recorded hangup cause should be adopted.
    pub reference_id: Option<Uuid>,
}
