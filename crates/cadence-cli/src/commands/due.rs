//! The `cadence due` command.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{commit, format_time, print_json};

pub async fn execute(user: String, config: Option<&Path>, json: bool) -> Result<()> {
    let due = commit(config, |ws| {
        let user = user.clone();
        async move {
            // Promote anything whose time has come before listing.
            ws.processor.sweep_due().await?;
            Ok(ws.processor.due_reviews(&user).await?)
        }
    })
    .await?;

    if json {
        return print_json(&due);
    }
    if due.is_empty() {
        println!("No reviews due for {user}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Session", "Challenge", "Stage", "Ease", "Due"]);
    for s in &due {
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(&s.challenge_id),
            Cell::new(s.review_stage),
            Cell::new(format!("{:.2}", s.ease_factor)),
            Cell::new(format_time(s.scheduled_for)),
        ]);
    }
    println!("{table}");
    Ok(())
}
