//! The `cadence review` command.

use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use super::{commit, format_time, print_json};

pub async fn execute(session: Uuid, quality: u8, config: Option<&Path>, json: bool) -> Result<()> {
    let next = commit(config, |ws| async move {
        Ok(ws.processor.complete_review(session, quality).await?)
    })
    .await?;

    if json {
        print_json(&serde_json::json!({ "session_id": session, "next_review": next }))
    } else {
        println!("Reviewed {session} (quality {quality}). Next review: {}", format_time(next));
        Ok(())
    }
}
