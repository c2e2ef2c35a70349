//! The `cadence analyze` command.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{print_json, Workspace};

pub async fn execute(
    user: String,
    window_days: Option<u32>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let ws = Workspace::open(config)?;
    let advice = ws.processor.recommend_adjustment(&user, window_days).await?;

    if json {
        return print_json(&advice);
    }

    let window = window_days.unwrap_or(ws.config.analysis_window_days);
    let s = &advice.snapshot;
    println!("Performance of {user} over {window} day(s)");

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    let rows = [
        ("Success rate", format!("{:.2}", s.success_rate)),
        ("Average score", format!("{:.2}", s.average_score)),
        ("Consistency", format!("{:.2}", s.consistency)),
        ("Engagement", format!("{:.2}", s.engagement)),
        ("Learning velocity", format!("{:.2}/day", s.learning_velocity)),
        ("Retention", format!("{:.2}", s.retention_rate)),
        ("Trend", s.trend.to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    println!("{table}");

    let r = &advice.recommendation;
    println!(
        "Recommendation: {} ({} -> {}), confidence {:.2}, {} priority",
        r.direction, r.current, r.suggested, r.confidence, r.priority
    );
    println!("  {}", r.reason);
    if r.current != r.suggested {
        println!("  Apply with: cadence adjust --user {user} --direction {}", r.direction);
    }
    Ok(())
}
