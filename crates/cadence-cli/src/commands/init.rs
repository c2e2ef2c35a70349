//! The `cadence init` command.

use std::path::Path;

use anyhow::{Context, Result};

use cadence_store::CadenceConfig;

pub fn execute() -> Result<()> {
    if Path::new("cadence.toml").exists() {
        println!("cadence.toml already exists, skipping.");
    } else {
        let body = toml::to_string_pretty(&CadenceConfig::default())
            .context("failed to render default config")?;
        std::fs::write("cadence.toml", format!("# cadence configuration\n\n{body}"))?;
        println!("Created cadence.toml");
    }

    std::fs::create_dir_all("catalog")?;
    let example_path = Path::new("catalog/example.toml");
    if example_path.exists() {
        println!("catalog/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalog/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: cadence validate --catalog catalog");
    println!(
        "  2. Run: cadence submit --user alice --challenge walkers-quiz \
         --answer walker --answer node --answer edge"
    );
    println!("  3. Run: cadence profile --user alice");

    Ok(())
}

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example catalog"
description = "A few starter challenges"
default_difficulty = "beginner"

[[challenges]]
id = "walkers-quiz"
title = "Walkers, nodes and edges"
type = "quiz"
skills = ["jac_knowledge"]
answer_key = ["walker", "node", "edge"]

[[challenges]]
id = "sum-list"
title = "Sum a list"
type = "coding"
difficulty = "intermediate"
skills = ["coding_skill", "problem_solving"]

[[challenges]]
id = "off-by-one"
title = "Find the off-by-one"
type = "debug"
skills = ["coding_skill"]

[[challenges]]
id = "graph-design"
title = "Model a social graph"
type = "scenario"
difficulty = "advanced"
skills = ["problem_solving", "jac_knowledge"]
"#;
