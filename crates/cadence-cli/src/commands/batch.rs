//! The `cadence batch` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use cadence_core::model::{AttemptStatus, Response};
use cadence_core::AttemptInput;

use super::submit::print_result;
use super::{commit, print_json};

/// One entry of the batch file.
#[derive(Debug, Clone, Deserialize)]
struct BatchEntry {
    user: String,
    challenge: String,
    #[serde(default)]
    answers: Vec<String>,
    #[serde(default)]
    time_spent: u32,
}

pub async fn execute(file: PathBuf, config: Option<&Path>, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read batch file: {}", file.display()))?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse batch file: {}", file.display()))?;

    let outcomes = commit(config, |ws| {
        let entries = entries.clone();
        async move {
            let mut inputs = Vec::with_capacity(entries.len());
            for entry in entries {
                let challenge = ws.challenge(&entry.challenge).await?;
                let responses = entry.answers.into_iter().map(Response::new).collect();
                inputs.push(
                    AttemptInput::new(entry.user, challenge, responses)
                        .with_time_spent(entry.time_spent),
                );
            }

            tracing::info!(attempts = inputs.len(), "processing batch");
            let results = ws.processor.process_batch(inputs).await;

            // Several entries may share a challenge; count each against the stored totals.
            for r in results.iter().flatten() {
                let mut stored = ws.challenge(&r.challenge_id).await?;
                stored.record_outcome(r.status == AttemptStatus::Completed);
                ws.store.save_challenge(&stored).await;
            }
            Ok(results)
        }
    })
    .await?;

    let mut failures = 0;
    let mut reports = Vec::with_capacity(outcomes.len());
    for (i, result) in outcomes.into_iter().enumerate() {
        match result {
            Ok(r) => {
                reports.push(serde_json::to_value(&r)?);
                if !json {
                    print_result(&r);
                }
            }
            Err(e) => {
                failures += 1;
                reports.push(serde_json::json!({ "index": i, "error": e.to_string() }));
                if !json {
                    println!("entry {i}: ERROR: {e}");
                }
            }
        }
    }

    if json {
        print_json(&reports)?;
    } else if failures > 0 {
        println!("\n{failures} attempt(s) failed.");
    }
    Ok(())
}
