//! The `cadence adjust` command.

use std::path::Path;

use anyhow::Result;

use cadence_core::profile::AdjustmentDirection;

use super::{commit, print_json};

pub async fn execute(
    user: String,
    direction: AdjustmentDirection,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let outcome = commit(config, |ws| {
        let user = user.clone();
        async move { Ok(ws.processor.apply_adjustment(&user, direction).await?) }
    })
    .await?;

    if json {
        return print_json(&outcome);
    }
    if outcome.level_changed() {
        println!("{user}: {} -> {}", outcome.previous, outcome.current);
    } else {
        println!("{user}: stays at {}", outcome.current);
    }
    Ok(())
}
