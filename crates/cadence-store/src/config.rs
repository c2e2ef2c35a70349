//! Configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cadence_core::processor::EngineConfig;
use cadence_core::sweep::DueSweeperConfig;

/// Due sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweeps in watch mode.
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
            enabled: true,
        }
    }
}

/// Top-level cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// JSON snapshot holding profiles, sessions, and history.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Catalog file or directory of catalog files.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    /// History window for analysis, in days.
    #[serde(default = "default_window")]
    pub analysis_window_days: u32,
    /// Extra attempts after a profile write conflict.
    #[serde(default = "default_retries")]
    pub max_conflict_retries: u32,
    /// Max concurrent attempts in a batch.
    #[serde(default = "default_parallelism")]
    pub batch_parallelism: usize,
    #[serde(default)]
    pub sweep: SweepConfig,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./cadence-state.json")
}
fn default_catalog_path() -> PathBuf {
    PathBuf::from("./catalog")
}
fn default_window() -> u32 {
    30
}
fn default_retries() -> u32 {
    3
}
fn default_parallelism() -> usize {
    4
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            catalog_path: default_catalog_path(),
            analysis_window_days: default_window(),
            max_conflict_retries: default_retries(),
            batch_parallelism: default_parallelism(),
            sweep: SweepConfig::default(),
        }
    }
}

impl CadenceConfig {
    /// Engine settings derived from this configuration. Score thresholds
    /// keep their built-in values.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_conflict_retries: self.max_conflict_retries,
            analysis_window_days: self.analysis_window_days,
            batch_parallelism: self.batch_parallelism,
            ..EngineConfig::default()
        }
    }

    pub fn sweeper_config(&self) -> DueSweeperConfig {
        DueSweeperConfig {
            interval_seconds: self.sweep.interval_seconds,
            enabled: self.sweep.enabled,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(p: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&p.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without an explicit path:
/// 1. `cadence.toml` in the current directory
/// 2. `~/.config/cadence/config.toml`
///
/// Environment variable overrides: `CADENCE_STATE_PATH`, `CADENCE_CATALOG_PATH`.
pub fn load_config_from(path: Option<&Path>) -> Result<CadenceConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("cadence.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<CadenceConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => CadenceConfig::default(),
    };

    if let Ok(state) = std::env::var("CADENCE_STATE_PATH") {
        config.state_path = PathBuf::from(state);
    }
    if let Ok(catalog) = std::env::var("CADENCE_CATALOG_PATH") {
        config.catalog_path = PathBuf::from(catalog);
    }

    config.state_path = resolve_path(&config.state_path);
    config.catalog_path = resolve_path(&config.catalog_path);

    if config.analysis_window_days == 0 {
        anyhow::bail!("analysis_window_days must be at least 1");
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("cadence"))
}
