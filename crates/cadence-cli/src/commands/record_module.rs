//! The `cadence record-module` command.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;

use cadence_core::model::ModuleEvent;

use super::commit;

pub async fn execute(user: String, module: String, config: Option<&Path>) -> Result<()> {
    if user.trim().is_empty() || module.trim().is_empty() {
        anyhow::bail!("user and module must not be empty");
    }
    let occurred_at = Utc::now();
    commit(config, |ws| {
        let event = ModuleEvent {
            user_id: user.clone(),
            module_id: module.clone(),
            occurred_at,
        };
        async move {
            ws.store.add_module_event(event).await;
            Ok(())
        }
    })
    .await?;

    println!("Recorded module {module} for {user}");
    Ok(())
}
