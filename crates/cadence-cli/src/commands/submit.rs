//! The `cadence submit` command.

use std::path::Path;

use anyhow::Result;

use cadence_core::model::Response;
use cadence_core::processor::{ProcessingResult, SchedulingOutcome};
use cadence_core::AttemptInput;

use super::{commit, format_time, print_json};

pub async fn execute(
    user: String,
    challenge_id: String,
    answers: Vec<String>,
    time_spent: u32,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let result = commit(config, |ws| {
        let user = user.clone();
        let challenge_id = challenge_id.clone();
        let responses: Vec<Response> = answers.iter().map(Response::new).collect();
        async move {
            let challenge = ws.challenge(&challenge_id).await?;
            let input = AttemptInput::new(user, challenge, responses).with_time_spent(time_spent);
            let result = ws.processor.process(input).await?;
            ws.store.save_challenge(&result.updated_challenge).await;
            Ok(result)
        }
    })
    .await?;

    if json {
        print_json(&result)
    } else {
        print_result(&result);
        Ok(())
    }
}

pub(crate) fn print_result(result: &ProcessingResult) {
    println!(
        "{} on {}: score {:.2} ({}, {} scorer)",
        result.user_id, result.challenge_id, result.score, result.status, result.scorer
    );

    let adj = &result.adjustment;
    if adj.level_changed() {
        println!("  Difficulty: {} -> {}", adj.previous, adj.current);
    } else {
        println!("  Difficulty: {} (unchanged)", adj.current);
    }

    match &result.scheduling {
        SchedulingOutcome::Created {
            session_id,
            scheduled_for,
        } => println!(
            "  Review: session {session_id} scheduled for {}",
            format_time(*scheduled_for)
        ),
        SchedulingOutcome::MarkedReady { session_id } => {
            println!("  Review: session {session_id} is ready now")
        }
        SchedulingOutcome::Unchanged { session_id } => {
            println!("  Review: session {session_id} unchanged")
        }
        SchedulingOutcome::NotEligible => println!("  Review: none (attempt not successful)"),
    }

    let next = &result.next;
    let dims: Vec<String> = next
        .targeted_dimensions
        .iter()
        .map(ToString::to_string)
        .collect();
    println!(
        "  Next: {} at {} targeting {}",
        next.challenge_type,
        next.difficulty_level,
        dims.join(", ")
    );
    if let Some(content) = &next.content {
        println!("    {}: {}", content.title, content.body);
    }

    for e in &result.errors {
        println!("  WARNING: {e}");
    }
}
