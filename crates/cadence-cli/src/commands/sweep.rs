//! The `cadence sweep` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use cadence_core::error::EngineError;
use cadence_core::processor::SweepSummary;
use cadence_core::sweep::{DueSweeper, SweepHooks};
use cadence_store::MemoryStore;

use super::{commit, print_json, Workspace};

/// Keeps a long-running sweeper in step with other `cadence` processes:
/// the snapshot is reread before every cycle and written after any cycle
/// that promoted something.
struct SnapshotSync {
    store: Arc<MemoryStore>,
    path: PathBuf,
}

#[async_trait]
impl SweepHooks for SnapshotSync {
    async fn before_cycle(&self) -> Result<(), EngineError> {
        self.store.reload(&self.path).await?;
        Ok(())
    }

    async fn after_cycle(&self, summary: &SweepSummary) -> Result<(), EngineError> {
        if summary.promoted == 0 {
            return Ok(());
        }
        match self.store.save_json(&self.path).await {
            Ok(()) => {
                tracing::info!(promoted = summary.promoted, "state saved");
                Ok(())
            }
            // the next cycle reloads and promotes the same sessions again
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "state changed during sweep, retrying next cycle");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn execute(watch: bool, config: Option<&Path>, json: bool) -> Result<()> {
    if !watch {
        let summary = commit(config, |ws| async move { Ok(ws.processor.sweep_due().await?) }).await?;
        if json {
            return print_json(&summary);
        }
        println!(
            "Promoted {} session(s), skipped {}.",
            summary.promoted, summary.skipped
        );
        return Ok(());
    }

    let ws = Workspace::open(config)?;
    let sync = Arc::new(SnapshotSync {
        store: Arc::clone(&ws.store),
        path: ws.config.state_path.clone(),
    });
    let sweeper = Arc::new(
        DueSweeper::new(Arc::clone(&ws.processor), ws.config.sweeper_config()).with_hooks(sync),
    );
    let token = sweeper.shutdown_token();
    let mut handle = Arc::clone(&sweeper).start();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl-C")?;
            tracing::info!("interrupted, stopping sweeper");
            token.cancel();
            handle.await.context("sweeper task panicked")?;
        }
        // returns on its own when sweeping is disabled
        res = &mut handle => {
            res.context("sweeper task panicked")?;
        }
    }
    println!("Sweeper stopped.");
    Ok(())
}
