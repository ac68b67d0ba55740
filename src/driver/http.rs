use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use super::{
    AmdDetector, ChannelDriver, ConfbridgeDriver, ExternalMedia, ExternalMediaRequest, Recording,
    RecordingDriver, RecordingRequest, SnoopDirection,
};
use crate::call::action::MachineHandle;
use crate::call::{Cause, Channel};

/// Media server channel driver speaking the control plane's JSON/HTTP
/// contract.
pub struct HttpChannelDriver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChannelDriver {
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChannelDriver for HttpChannelDriver {
    async fn answer(&self, channel_id: &str) -> Result<()> {
        self.client
            .post(self.url(&format!("/channels/{}/answer", channel_id)))
            .send()
            .await
            .with_context(|| format!("answer request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("answer rejected for channel {}", channel_id))?;
        Ok(())
    }

    async fn play(&self, channel_id: &str, media: &[String], correlation_id: &str) -> Result<()> {
        self.client
            .post(self.url(&format!("/channels/{}/play", channel_id)))
            .json(&json!({ "media": media, "playback_id": correlation_id }))
            .send()
            .await
            .with_context(|| format!("play request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("play rejected for channel {}", channel_id))?;
        Ok(())
    }

    async fn stop_playback(&self, channel_id: &str) -> Result<()> {
        self.client
            .delete(self.url(&format!("/channels/{}/playback", channel_id)))
            .send()
            .await
            .with_context(|| format!("stop playback request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("stop playback rejected for channel {}", channel_id))?;
        Ok(())
    }

    async fn send_dtmf(
        &self,
        channel_id: &str,
        digits: &str,
        duration: Duration,
        interval: Duration,
    ) -> Result<()> {
        self.client
            .post(self.url(&format!("/channels/{}/dtmf", channel_id)))
            .json(&json!({
                "digits": digits,
                "duration": duration.as_millis() as u64,
                "interval": interval.as_millis() as u64,
            }))
            .send()
            .await
            .with_context(|| format!("dtmf request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("dtmf rejected for channel {}", channel_id))?;
        Ok(())
    }

    async fn echo(&self, channel_id: &str) -> Result<()> {
        self.client
            .post(self.url(&format!("/channels/{}/echo", channel_id)))
            .send()
            .await
            .with_context(|| format!("echo request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("echo rejected for channel {}", channel_id))?;
        Ok(())
    }

    async fn start_snoop(
        &self,
        channel_id: &str,
        snoop_id: Uuid,
        spy: SnoopDirection,
        whisper: SnoopDirection,
    ) -> Result<Channel> {
        let channel = self
            .client
            .post(self.url(&format!("/channels/{}/snoop", channel_id)))
            .json(&json!({ "snoop_id": snoop_id, "spy": spy, "whisper": whisper }))
            .send()
            .await
            .with_context(|| format!("snoop request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("snoop rejected for channel {}", channel_id))?
            .json()
            .await
            .context("decoding snoop channel")?;
        Ok(channel)
    }

    async fn start_external_media(&self, request: &ExternalMediaRequest) -> Result<ExternalMedia> {
        let media = self
            .client
            .post(self.url("/external-media"))
            .json(request)
            .send()
            .await
            .with_context(|| format!("external media request for channel {}", request.channel_id))?
            .error_for_status()
            .with_context(|| format!("external media rejected for channel {}", request.channel_id))?
            .json()
            .await
            .context("decoding external media")?;
        Ok(media)
    }

    async fn stop_external_media(&self, id: Uuid) -> Result<ExternalMedia> {
        let media = self
            .client
            .delete(self.url(&format!("/external-media/{}", id)))
            .send()
            .await
            .with_context(|| format!("stop external media request {}", id))?
            .error_for_status()
            .with_context(|| format!("stop external media rejected {}", id))?
            .json()
            .await
            .context("decoding external media")?;
        Ok(media)
    }

    async fn get(&self, channel_id: &str) -> Result<Channel> {
        let channel = self
            .client
            .get(self.url(&format!("/channels/{}", channel_id)))
            .send()
            .await
            .with_context(|| format!("get request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("channel {} not found", channel_id))?
            .json()
            .await
            .context("decoding channel")?;
        Ok(channel)
    }

    async fn hangup(&self, channel_id: &str, cause: Cause) -> Result<Channel> {
        let channel = self
            .client
            .post(self.url(&format!("/channels/{}/hangup", channel_id)))
            .json(&json!({ "cause": cause }))
            .send()
            .await
            .with_context(|| format!("hangup request for channel {}", channel_id))?
            .error_for_status()
            .with_context(|| format!("hangup rejected for channel {}", channel_id))?
            .json()
            .await
            .context("decoding channel")?;
        Ok(channel)
    }
}

pub struct HttpConfbridgeDriver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpConfbridgeDriver {
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl ConfbridgeDriver for HttpConfbridgeDriver {
    async fn join(&self, confbridge_id: Uuid, call_id: Uuid) -> Result<()> {
        self.client
            .post(format!(
                "{}/confbridges/{}/calls/{}",
                self.base_url, confbridge_id, call_id
            ))
            .send()
            .await
            .with_context(|| format!("join request for confbridge {}", confbridge_id))?
            .error_for_status()
            .with_context(|| format!("join rejected for confbridge {}", confbridge_id))?;
        Ok(())
    }

    async fn kick(&self, confbridge_id: Uuid, call_id: Uuid) -> Result<()> {
        self.client
            .delete(format!(
                "{}/confbridges/{}/calls/{}",
                self.base_url, confbridge_id, call_id
            ))
            .send()
            .await
            .with_context(|| format!("kick request for confbridge {}", confbridge_id))?
            .error_for_status()
            .with_context(|| format!("kick rejected for confbridge {}", confbridge_id))?;
        Ok(())
    }
}

pub struct HttpRecordingDriver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRecordingDriver {
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl RecordingDriver for HttpRecordingDriver {
    async fn start(&self, request: &RecordingRequest) -> Result<Recording> {
        let recording = self
            .client
            .post(format!("{}/recordings", self.base_url))
            .json(request)
            .send()
            .await
            .with_context(|| format!("recording start request for {}", request.reference_id))?
            .error_for_status()
            .with_context(|| format!("recording start rejected for {}", request.reference_id))?
            .json()
            .await
            .context("decoding recording")?;
        Ok(recording)
    }

    async fn stop(&self, recording_id: Uuid) -> Result<Recording> {
        let recording = self
            .client
            .post(format!("{}/recordings/{}/stop", self.base_url, recording_id))
            .send()
            .await
            .with_context(|| format!("recording stop request {}", recording_id))?
            .error_for_status()
            .with_context(|| format!("recording stop rejected {}", recording_id))?
            .json()
            .await
            .context("decoding recording")?;
        Ok(recording)
    }
}

pub struct HttpAmdDetector {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAmdDetector {
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl AmdDetector for HttpAmdDetector {
    async fn watch(
        &self,
        call_id: Uuid,
        snoop_id: Uuid,
        machine_handle: MachineHandle,
        sync: bool,
    ) -> Result<()> {
        self.client
            .post(format!("{}/watches", self.base_url))
            .json(&json!({
                "call_id": call_id,
                "snoop_id": snoop_id,
                "machine_handle": machine_handle,
                "sync": sync,
            }))
            .send()
            .await
            .with_context(|| format!("amd watch request for call {}", call_id))?
            .error_for_status()
            .with_context(|| format!("amd watch rejected for call {}", call_id))?;
        Ok(())
    }
}
