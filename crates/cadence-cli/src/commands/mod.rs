pub mod adjust;
pub mod analyze;
pub mod batch;
pub mod due;
pub mod init;
pub mod postpone;
pub mod profile;
pub mod record_module;
pub mod review;
pub mod submit;
pub mod sweep;
pub mod validate;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use cadence_core::model::Challenge;
use cadence_core::parser::{find_challenge, load_catalogs};
use cadence_core::traits::{Clock, SystemClock};
use cadence_core::AttemptProcessor;
use cadence_store::{load_config_from, CadenceConfig, MemoryStore, TemplateContentGenerator};

/// Config, state snapshot, and a processor wired to both.
pub struct Workspace {
    pub config: CadenceConfig,
    pub store: Arc<MemoryStore>,
    pub processor: Arc<AttemptProcessor>,
}

impl Workspace {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(
            MemoryStore::load_json(&config.state_path, clock.clone())
                .context("failed to load state snapshot")?,
        );
        let processor = AttemptProcessor::new(
            store.clone(),
            store.clone(),
            clock,
            config.engine_config(),
        )
        .with_content_generator(Arc::new(TemplateContentGenerator::default()));

        Ok(Self {
            config,
            store,
            processor: Arc::new(processor),
        })
    }

    /// Look up a challenge in the catalog, carrying over attempt counts
    /// recorded by earlier submissions.
    pub async fn challenge(&self, challenge_id: &str) -> Result<Challenge> {
        let catalogs = load_catalogs(&self.config.catalog_path).with_context(|| {
            format!(
                "failed to load catalog from {}",
                self.config.catalog_path.display()
            )
        })?;
        let mut challenge = find_challenge(&catalogs, challenge_id)
            .cloned()
            .with_context(|| format!("challenge not found in catalog: {challenge_id}"))?;

        if let Some(stored) = self.store.challenge(challenge_id).await {
            challenge.total_attempts = stored.total_attempts;
            challenge.successful_attempts = stored.successful_attempts;
        }
        Ok(challenge)
    }
}

/// Open the workspace, run `op` against it, and save the snapshot.
///
/// When another `cadence` process saved in between, the workspace is
/// reopened from disk and `op` runs again, up to `max_conflict_retries`
/// times. `op` must not print; callers report the returned value.
pub async fn commit<T, F, Fut>(config_path: Option<&Path>, mut op: F) -> Result<T>
where
    F: FnMut(Arc<Workspace>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        let ws = Arc::new(Workspace::open(config_path)?);
        let value = op(Arc::clone(&ws)).await?;
        match ws.store.save_json(&ws.config.state_path).await {
            Ok(()) => {
                tracing::debug!(path = %ws.config.state_path.display(), "state saved");
                return Ok(value);
            }
            Err(e) if e.is_retryable() && retries < ws.config.max_conflict_retries => {
                retries += 1;
                tracing::warn!(retries, error = %e, "state changed by another process, re-applying");
            }
            Err(e) => return Err(e).context("failed to save state snapshot"),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}
