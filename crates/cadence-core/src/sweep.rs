//! Periodic due-review sweep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::processor::{AttemptProcessor, SweepSummary};

#[derive(Debug, Clone)]
pub struct DueSweeperConfig {
    /// Seconds between sweeps.
    pub interval_seconds: u64,
    pub enabled: bool,
}

impl Default for DueSweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            enabled: true,
        }
    }
}

/// Work done around every sweep cycle, such as refreshing shared state
/// before the sweep and persisting it afterwards.
#[async_trait]
pub trait SweepHooks: Send + Sync {
    async fn before_cycle(&self) -> Result<(), EngineError>;

    /// Runs only when the sweep itself succeeded.
    async fn after_cycle(&self, summary: &SweepSummary) -> Result<(), EngineError>;
}

/// Background task promoting due sessions to `ready` until cancelled.
pub struct DueSweeper {
    processor: Arc<AttemptProcessor>,
    config: DueSweeperConfig,
    hooks: Option<Arc<dyn SweepHooks>>,
    shutdown_token: CancellationToken,
}

impl DueSweeper {
    pub fn new(processor: Arc<AttemptProcessor>, config: DueSweeperConfig) -> Self {
        Self {
            processor,
            config,
            hooks: None,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SweepHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Cancelling this token stops the loop after the current cycle.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    pub async fn run(&self) {
        if !self.config.enabled {
            tracing::info!("due sweeper is disabled");
            return;
        }

        tracing::info!(
            interval_seconds = self.config.interval_seconds,
            "starting due sweeper"
        );
        let mut tick = tokio::time::interval(Duration::from_secs(self.config.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.sweep_cycle().await {
                        Ok(summary) => tracing::debug!(
                            promoted = summary.promoted,
                            skipped = summary.skipped,
                            "sweep cycle completed"
                        ),
                        Err(e) => tracing::warn!(error = %e, "sweep cycle failed"),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("shutdown requested, stopping due sweeper");
                    break;
                }
            }
        }
    }

    pub async fn sweep_cycle(&self) -> Result<SweepSummary, EngineError> {
        if let Some(hooks) = &self.hooks {
            hooks.before_cycle().await?;
        }
        let summary = self.processor.sweep_due().await?;
        if let Some(hooks) = &self.hooks {
            hooks.after_cycle(&summary).await?;
        }
        Ok(summary)
    }
}
