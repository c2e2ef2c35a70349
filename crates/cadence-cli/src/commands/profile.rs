//! The `cadence profile` command.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{format_time, print_json, Workspace};

pub async fn execute(user: String, config: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::open(config)?;
    let profile = ws.processor.profile(&user).await?;
    let sessions = ws.processor.sessions(&user).await?;

    if json {
        return print_json(&serde_json::json!({ "profile": profile, "sessions": sessions }));
    }

    println!("Profile: {}", profile.user_id());
    println!("  Difficulty:      {}", profile.current_difficulty());
    println!("  Recent accuracy: {:.2}", profile.recent_accuracy());
    println!("  Success streak:  {}", profile.success_streak());
    if let Some(changed) = profile.last_difficulty_change() {
        println!("  Last change:     {}", format_time(changed));
    }

    let mut skills = Table::new();
    skills.set_header(vec!["Skill", "Level"]);
    for (dim, level) in profile.skill_levels().iter() {
        skills.add_row(vec![Cell::new(dim), Cell::new(level)]);
    }
    println!("{skills}");

    if !sessions.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Session", "Challenge", "Status", "Stage", "Interval", "Next"]);
        for s in &sessions {
            table.add_row(vec![
                Cell::new(s.id),
                Cell::new(&s.challenge_id),
                Cell::new(s.status),
                Cell::new(s.review_stage),
                Cell::new(format!("{}d", s.interval_days)),
                Cell::new(format_time(s.scheduled_for)),
            ]);
        }
        println!("{table}");
    }
    Ok(())
}
