use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Text-to-speech synthesis. Returns a media reference the channel driver
/// can play.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    media_uri: String,
}

pub struct HttpSynthesisClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSynthesisClient {
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl SynthesisClient for HttpSynthesisClient {
    async fn synthesize(&self, text: &str, language: &str) -> Result<String> {
        let response: SpeechResponse = self
            .client
            .post(format!("{}/speeches", self.base_url))
            .json(&json!({ "text": text, "language": language }))
            .send()
            .await
            .context("speech synthesis request")?
            .error_for_status()
            .context("speech synthesis rejected")?
            .json()
            .await
            .context("decoding speech synthesis response")?;
        Ok(response.media_uri)
    }
}
