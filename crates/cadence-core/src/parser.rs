//! TOML challenge catalog parser.
//!
//! Loads catalogs from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Catalog, Challenge, ChallengeType, DifficultyLevel, SkillDimension};

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    challenges: Vec<TomlChallenge>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_difficulty_str")]
    default_difficulty: String,
}

fn default_difficulty_str() -> String {
    "beginner".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlChallenge {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "type")]
    challenge_type: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    answer_key: Vec<String>,
    #[serde(default)]
    total_attempts: u32,
    #[serde(default)]
    successful_attempts: u32,
}

/// Parse a single TOML file into a `Catalog`.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a `Catalog`.
///
/// Unknown challenge types are kept as [`ChallengeType::Other`] and reported
/// by [`validate_catalog`]; bad difficulty or skill names are errors.
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let default_difficulty: DifficultyLevel = parsed
        .catalog
        .default_difficulty
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    let challenges = parsed
        .challenges
        .into_iter()
        .map(|c| {
            let difficulty_level = c
                .difficulty
                .map(|d| d.parse().map_err(|e: String| anyhow::anyhow!("{}", e)))
                .transpose()?
                .unwrap_or(default_difficulty);

            let skill_dimensions_targeted = c
                .skills
                .iter()
                .map(|s| {
                    s.parse::<SkillDimension>()
                        .map_err(|e| anyhow::anyhow!("challenge {}: {}", c.id, e))
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Challenge {
                id: c.id,
                title: c.title,
                challenge_type: ChallengeType::from(c.challenge_type),
                difficulty_level,
                skill_dimensions_targeted,
                answer_key: c.answer_key,
                total_attempts: c.total_attempts,
                successful_attempts: c.successful_attempts,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
        challenges,
    })
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a catalog file, or every catalog under a directory.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

/// Find a challenge by id across catalogs.
pub fn find_challenge<'a>(catalogs: &'a [Catalog], challenge_id: &str) -> Option<&'a Challenge> {
    catalogs.iter().find_map(|c| c.get(challenge_id))
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The challenge ID (if applicable).
    pub challenge_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a catalog for common issues.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for challenge in &catalog.challenges {
        if !seen_ids.insert(&challenge.id) {
            warnings.push(ValidationWarning {
                challenge_id: Some(challenge.id.clone()),
                message: format!("duplicate challenge ID: {}", challenge.id),
            });
        }
    }

    for challenge in &catalog.challenges {
        let warn = |message: String| ValidationWarning {
            challenge_id: Some(challenge.id.clone()),
            message,
        };

        if !challenge.challenge_type.is_known() {
            warnings.push(warn(format!(
                "unknown challenge type '{}', the general scorer will be used",
                challenge.challenge_type
            )));
        }
        if challenge.skill_dimensions_targeted.is_empty() {
            warnings.push(warn("no skill dimensions targeted".into()));
        }
        if challenge.successful_attempts > challenge.total_attempts {
            warnings.push(warn(format!(
                "successful_attempts ({}) exceeds total_attempts ({})",
                challenge.successful_attempts, challenge.total_attempts
            )));
        }
        if challenge.challenge_type == ChallengeType::Quiz && challenge.answer_key.is_empty() {
            warnings.push(warn(
                "quiz has no answer_key; responses must carry expected answers".into(),
            ));
        }
    }

    warnings
}
