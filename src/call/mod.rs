use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

pub mod action;
pub mod channel;

pub use action::{Action, ActionType};
pub use channel::{Cause, Channel};

/// Lifecycle status of a call. Progression is forward-only: once a call
/// reaches `Hangup` the record is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Dialing,
    Ringing,
    Progressing,
    Terminating,
    Canceling,
    Hangup,
}

impl CallStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, CallStatus::Hangup)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HangupReason {
    Normal,
    Busy,
    Failed,
    NoAnswer,
    Cancel,
    Timeout,
    Amd,
}

/// Result of an answering machine detection watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmdStatus {
    Human,
    Machine,
    NotSure,
}

/// A telephony session under flow control.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// The media server channel owning this call's leg.
    pub channel_id: String,
    pub flow_id: Uuid,
    pub activeflow_id: Uuid,
    pub status: CallStatus,
    /// The currently assigned action. Exactly one active action per call.
    pub action: Action,
    /// Persisted advancement slot: while true, no other trigger may advance
    /// this call.
    #[serde(default)]
    pub action_next_hold: bool,
    pub recording_id: Option<Uuid>,
    #[serde(default)]
    pub recording_ids: Vec<Uuid>,
    pub external_media_id: Option<Uuid>,
    pub confbridge_id: Option<Uuid>,
    pub amd_status: Option<AmdStatus>,
    /// Set once at hangup, never overwritten.
    pub hangup_reason: Option<HangupReason>,
    pub tm_create: DateTime<Utc>,
    pub tm_update: DateTime<Utc>,
    pub tm_hangup: Option<DateTime<Utc>>,
}

impl Call {
    pub fn new(customer_id: Uuid, channel_id: &str, flow_id: Uuid, activeflow_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            channel_id: channel_id.to_string(),
            flow_id,
            activeflow_id,
            status: CallStatus::Dialing,
            // a fresh call starts on a no-op action so the first advancement
            // has nothing to tear down
            action: Action::new(ActionType::Sleep, serde_json::Value::Null),
            action_next_hold: false,
            recording_id: None,
            recording_ids: Vec::new(),
            external_media_id: None,
            confbridge_id: None,
            amd_status: None,
            hangup_reason: None,
            tm_create: now,
            tm_update: now,
            tm_hangup: None,
        }
    }
}
