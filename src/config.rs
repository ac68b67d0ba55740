use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    #[clap(long, default_value = "callflow.toml")]
    pub conf: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    /// Base URL of the media server channel API.
    pub media_server_url: String,
    pub confbridge_url: String,
    pub recording_url: String,
    pub amd_url: String,
    pub flow_url: String,
    pub synthesis_url: String,
    /// Call events are POSTed here when set.
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            log_level: None,
            log_file: None,
            media_server_url: "http://127.0.0.1:9060".to_string(),
            confbridge_url: "http://127.0.0.1:9061".to_string(),
            recording_url: "http://127.0.0.1:9062".to_string(),
            amd_url: "http://127.0.0.1:9063".to_string(),
            flow_url: "http://127.0.0.1:9064".to_string(),
            synthesis_url: "http://127.0.0.1:9065".to_string(),
            webhook_url: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config file {}", path))
    }
}
