use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::driver::{
    HttpAmdDetector, HttpChannelDriver, HttpConfbridgeDriver, HttpRecordingDriver,
};
use crate::engine::queue::{self, JobReceiver, QueuedJobs};
use crate::engine::ActionEngine;
use crate::event::{Notifier, NullNotifier, WebhookNotifier};
use crate::flow::HttpFlowClient;
use crate::handler;
use crate::store::{CallStore, MemoryCallStore};
use crate::synthesis::HttpSynthesisClient;

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub engine: Arc<ActionEngine>,
    pub store: Arc<dyn CallStore>,
    pub token: CancellationToken,
}

pub type AppState = Arc<AppStateInner>;

pub struct AppBuilder {
    config: Config,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<App> {
        let config = Arc::new(self.config);
        let client = reqwest::Client::new();
        let token = CancellationToken::new();

        let store: Arc<dyn CallStore> = Arc::new(MemoryCallStore::new());
        let notifier: Arc<dyn Notifier> = match &config.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), client.clone())),
            None => Arc::new(NullNotifier),
        };

        let (job_sender, job_receiver) = queue::job_channel();
        let engine = Arc::new(ActionEngine::new(
            Arc::new(HttpChannelDriver::new(
                config.media_server_url.clone(),
                client.clone(),
            )),
            Arc::new(HttpConfbridgeDriver::new(
                config.confbridge_url.clone(),
                client.clone(),
            )),
            Arc::new(HttpRecordingDriver::new(
                config.recording_url.clone(),
                client.clone(),
            )),
            Arc::new(HttpAmdDetector::new(config.amd_url.clone(), client.clone())),
            Arc::new(HttpSynthesisClient::new(
                config.synthesis_url.clone(),
                client.clone(),
            )),
            Arc::new(HttpFlowClient::new(config.flow_url.clone(), client)),
            store.clone(),
            notifier,
            Arc::new(QueuedJobs::new(job_sender)),
        ));

        let state = Arc::new(AppStateInner {
            config: config.clone(),
            engine,
            store,
            token,
        });

        Ok(App {
            config,
            state,
            job_receiver,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct App {
    pub config: Arc<Config>,
    state: AppState,
    job_receiver: JobReceiver,
}

impl App {
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.http_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.http_addr))?;
        info!("listening on {}", self.config.http_addr);

        let token = self.state.token.clone();
        let engine = self.state.engine.clone();
        let router = handler::router(self.state.clone());

        let job_loop = queue::run_jobs(engine, self.job_receiver, token.clone());

        select! {
            result = axum::serve(listener, router) => {
                result.context("http server error")?;
            }
            _ = job_loop => {
                info!("engine job loop finished");
            }
            _ = token.cancelled() => {
                info!("shutting down");
            }
        }
        Ok(())
    }
}
