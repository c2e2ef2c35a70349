//! The `cadence postpone` command.

use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use super::{commit, format_time, print_json};

pub async fn execute(session: Uuid, days: u32, config: Option<&Path>, json: bool) -> Result<()> {
    let scheduled_for = commit(config, |ws| async move {
        Ok(ws.processor.postpone(session, days).await?)
    })
    .await?;

    if json {
        print_json(&serde_json::json!({ "session_id": session, "scheduled_for": scheduled_for }))
    } else {
        println!("Postponed {session} to {}", format_time(scheduled_for));
        Ok(())
    }
}
