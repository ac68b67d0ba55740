use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::fmt;

/// Q.850-style release cause carried on a channel, wire format is the bare
/// numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cause(pub u32);

impl Cause {
    pub const NONE: Cause = Cause(0);
    pub const NO_ROUTE_DESTINATION: Cause = Cause(3);
    pub const NORMAL_CLEARING: Cause = Cause(16);
    pub const USER_BUSY: Cause = Cause(17);
    pub const NO_USER_RESPONSE: Cause = Cause(18);
    pub const NO_ANSWER: Cause = Cause(19);
    pub const CALL_REJECTED: Cause = Cause(21);
    pub const NORMAL_UNSPECIFIED: Cause = Cause(31);
    pub const NETWORK_OUT_OF_ORDER: Cause = Cause(38);
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The media server's view of one leg of a call.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// Non-empty while a playback is running on the channel.
    pub playback_id: Option<String>,
    #[serde(default)]
    pub hangup_cause: Cause,
    pub tm_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl Channel {
    pub fn playback_active(&self) -> bool {
        self.playback_id.as_deref().map(|p| !p.is_empty()).unwrap_or(false)
    }
}
