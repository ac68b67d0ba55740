use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::ActionEngine;
use crate::call::Action;

/// Self-directed continuations. Advancement never runs the next execution
/// inline: it enqueues a request instead, which bounds call stack depth and
/// lets any instance pick the work up.
#[async_trait]
pub trait EngineQueue: Send + Sync {
    async fn queue_execute(&self, call_id: Uuid) -> Result<()>;

    /// Arm a timer that fires `on_action_timeout` with the exact action it
    /// was scheduled for.
    async fn arm_timeout(&self, call_id: Uuid, action: Action, after: Duration) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum EngineJob {
    Execute {
        call_id: Uuid,
    },
    Timeout {
        call_id: Uuid,
        action: Action,
        after: Duration,
    },
}

pub type JobSender = mpsc::UnboundedSender<EngineJob>;
pub type JobReceiver = mpsc::UnboundedReceiver<EngineJob>;

pub fn job_channel() -> (JobSender, JobReceiver) {
    mpsc::unbounded_channel()
}

/// `EngineQueue` backed by the in-process job channel.
pub struct QueuedJobs {
    sender: JobSender,
}

impl QueuedJobs {
    pub fn new(sender: JobSender) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EngineQueue for QueuedJobs {
    async fn queue_execute(&self, call_id: Uuid) -> Result<()> {
        self.sender
            .send(EngineJob::Execute { call_id })
            .map_err(|_| anyhow!("engine job queue closed"))
    }

    async fn arm_timeout(&self, call_id: Uuid, action: Action, after: Duration) -> Result<()> {
        self.sender
            .send(EngineJob::Timeout {
                call_id,
                action,
                after,
            })
            .map_err(|_| anyhow!("engine job queue closed"))
    }
}

/// Drain the job queue until shutdown. Each job runs on its own task so a
/// slow call never blocks another call's trigger.
pub async fn run_jobs(engine: Arc<ActionEngine>, mut receiver: JobReceiver, token: CancellationToken) {
    loop {
        select! {
            _ = token.cancelled() => {
                info!("engine job loop shutting down");
                break;
            }
            job = receiver.recv() => {
                let Some(job) = job else {
                    info!("engine job queue closed");
                    break;
                };
                match job {
                    EngineJob::Execute { call_id } => {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            if let Err(e) = engine.execute_current_action(call_id).await {
                                warn!(call_id = %call_id, "action execution failed: {:?}", e);
                            }
                        });
                    }
                    EngineJob::Timeout { call_id, action, after } => {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            sleep(after).await;
                            if let Err(e) = engine.on_action_timeout(call_id, action).await {
                                warn!(call_id = %call_id, "action timeout handling failed: {:?}", e);
                            }
                        });
                    }
                }
            }
        }
    }
}
