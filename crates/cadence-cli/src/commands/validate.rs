//! The `cadence validate` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use cadence_core::parser::{load_catalogs, validate_catalog};
use cadence_store::load_config_from;

pub fn execute(catalog_path: Option<PathBuf>, config: Option<&Path>) -> Result<()> {
    let catalog_path = match catalog_path {
        Some(p) => p,
        None => load_config_from(config)?.catalog_path,
    };
    let catalogs = load_catalogs(&catalog_path)?;
    if catalogs.is_empty() {
        anyhow::bail!("no catalogs found in {}", catalog_path.display());
    }

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!(
            "Catalog: {} ({} challenges)",
            catalog.name,
            catalog.challenges.len()
        );

        let warnings = validate_catalog(catalog);
        for w in &warnings {
            let prefix = w
                .challenge_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
