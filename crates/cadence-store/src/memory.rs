//! In-memory repository with JSON snapshot persistence.
//!
//! Profiles are versioned: a save succeeds only when the caller's version
//! matches the stored one. Snapshots let the CLI keep state between runs;
//! each carries a generation, and a save against a generation that moved
//! on disk is refused so concurrent processes never overwrite each other.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use cadence_core::error::EngineError;
use cadence_core::model::{Attempt, Challenge, ModuleEvent, RepetitionSession, SessionStatus};
use cadence_core::profile::DifficultyProfile;
use cadence_core::traits::{AttemptHistory, Clock, ProfileRepository, SessionFilter, SystemClock};

use crate::error::StoreError;

/// Snapshot format written by this build.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// How long a save waits for another process to finish its commit.
const COMMIT_LOCK_WAIT: StdDuration = StdDuration::from_secs(5);
const COMMIT_LOCK_POLL: StdDuration = StdDuration::from_millis(20);
/// A lock file older than this was left behind by a crashed writer.
const ABANDONED_LOCK_AGE: StdDuration = StdDuration::from_secs(30);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    format: u32,
    /// Bumped on every save; a writer whose copy is older is refused.
    #[serde(default)]
    generation: u64,
    #[serde(default)]
    profiles: BTreeMap<String, DifficultyProfile>,
    #[serde(default)]
    sessions: BTreeMap<Uuid, RepetitionSession>,
    #[serde(default)]
    attempts: Vec<Attempt>,
    #[serde(default)]
    module_events: Vec<ModuleEvent>,
    /// Challenge statistics, keyed by challenge id.
    #[serde(default)]
    challenges: BTreeMap<String, Challenge>,
}

/// A [`ProfileRepository`] and [`AttemptHistory`] held in memory.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use `clock` to evaluate history windows.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                format: SNAPSHOT_FORMAT,
                ..StoreState::default()
            }),
            clock,
        }
    }

    /// Load a snapshot. A missing file yields an empty store.
    pub fn load_json(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let Some(state) = read_state(path)? else {
            tracing::debug!(path = %path.display(), "no snapshot, starting empty");
            return Ok(Self::with_clock(clock));
        };
        Ok(Self {
            state: RwLock::new(state),
            clock,
        })
    }

    /// Replace the in-memory state with the snapshot at `path`.
    pub async fn reload(&self, path: &Path) -> Result<(), StoreError> {
        let state = read_state(path)?.unwrap_or_else(|| StoreState {
            format: SNAPSHOT_FORMAT,
            ..StoreState::default()
        });
        *self.state.write().await = state;
        Ok(())
    }

    /// Snapshot generation this store last loaded or saved.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Write the whole state as pretty JSON, replacing the file atomically.
    ///
    /// Fails with [`StoreError::Stale`] when another process saved the file
    /// since this store loaded it. Nothing is written in that case; the
    /// caller reloads and re-applies its change.
    pub async fn save_json(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let _lock = CommitLock::acquire(path).await?;
        let mut state = self.state.write().await;
        let found = read_state(path)?.map_or(0, |on_disk| on_disk.generation);
        if found != state.generation {
            return Err(StoreError::Stale {
                path: path.to_path_buf(),
                expected: state.generation,
                found,
            });
        }

        let mut next = state.clone();
        next.format = SNAPSHOT_FORMAT;
        next.generation = found + 1;
        let json = serde_json::to_string_pretty(&next).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = sibling(path, ".tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        state.generation = next.generation;
        tracing::debug!(path = %path.display(), generation = state.generation, "snapshot saved");
        Ok(())
    }

    /// Record non-attempt activity such as a finished learning module.
    pub async fn add_module_event(&self, event: ModuleEvent) {
        self.state.write().await.module_events.push(event);
    }

    /// Stored statistics for a challenge, if any attempt was recorded.
    pub async fn challenge(&self, challenge_id: &str) -> Option<Challenge> {
        self.state.read().await.challenges.get(challenge_id).cloned()
    }

    /// Store a challenge with its updated attempt statistics.
    pub async fn save_challenge(&self, challenge: &Challenge) {
        self.state
            .write()
            .await
            .challenges
            .insert(challenge.id.clone(), challenge.clone());
    }

    /// Every user with a stored profile.
    pub async fn user_ids(&self) -> Vec<String> {
        self.state.read().await.profiles.keys().cloned().collect()
    }
}

fn read_state(path: &Path) -> Result<Option<StoreState>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let state: StoreState =
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    if state.format > SNAPSHOT_FORMAT {
        return Err(StoreError::UnsupportedFormat {
            path: path.to_path_buf(),
            found: state.format,
            supported: SNAPSHOT_FORMAT,
        });
    }
    tracing::debug!(
        path = %path.display(),
        generation = state.generation,
        profiles = state.profiles.len(),
        sessions = state.sessions.len(),
        "snapshot read"
    );
    Ok(Some(state))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Lock file held while a save checks the generation and replaces the
/// snapshot, so two processes cannot both pass the check.
struct CommitLock {
    path: PathBuf,
}

impl CommitLock {
    async fn acquire(snapshot: &Path) -> Result<Self, StoreError> {
        let path = sibling(snapshot, ".lock");
        let deadline = Instant::now() + COMMIT_LOCK_WAIT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_age(&path).is_some_and(|age| age > ABANDONED_LOCK_AGE) {
                        tracing::warn!(path = %path.display(), "removing abandoned commit lock");
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(StoreError::Locked { path });
                    }
                    tokio::time::sleep(COMMIT_LOCK_POLL).await;
                }
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_age(path: &Path) -> Option<StdDuration> {
    std::fs::metadata(path).ok()?.modified().ok()?.elapsed().ok()
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn load_profile(&self, user_id: &str) -> Result<Option<DifficultyProfile>, EngineError> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn save_profile(&self, profile: &DifficultyProfile) -> Result<u64, EngineError> {
        let mut state = self.state.write().await;
        let found = state
            .profiles
            .get(profile.user_id())
            .map_or(0, DifficultyProfile::version);
        if found != profile.version() {
            return Err(EngineError::Conflict {
                user_id: profile.user_id().to_string(),
                expected: profile.version(),
                found,
            });
        }
        let version = found + 1;
        let mut stored = profile.clone();
        stored.set_version(version);
        state.profiles.insert(profile.user_id().to_string(), stored);
        Ok(version)
    }

    async fn load_sessions(
        &self,
        user_id: &str,
        filter: &SessionFilter,
    ) -> Result<Vec<RepetitionSession>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && filter.matches(s))
            .cloned()
            .collect())
    }

    async fn load_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<RepetitionSession>, EngineError> {
        Ok(self.state.read().await.sessions.get(&session_id).cloned())
    }

    async fn save_session(&self, session: &RepetitionSession) -> Result<(), EngineError> {
        self.state
            .write()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn query_due_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RepetitionSession>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .sessions
            .values()
            .filter(|s| {
                matches!(s.status, SessionStatus::Scheduled | SessionStatus::Delayed)
                    && s.scheduled_for <= now
            })
            .cloned()
            .collect())
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), EngineError> {
        self.state.write().await.attempts.push(attempt.clone());
        Ok(())
    }
}

#[async_trait]
impl AttemptHistory for MemoryStore {
    async fn load_attempts(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<Vec<Attempt>, EngineError> {
        let since = self.clock.now() - Duration::days(i64::from(window_days));
        Ok(self
            .state
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.started_at >= since)
            .cloned()
            .collect())
    }

    async fn load_module_events(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<Vec<ModuleEvent>, EngineError> {
        let since = self.clock.now() - Duration::days(i64::from(window_days));
        Ok(self
            .state
            .read()
            .await
            .module_events
            .iter()
            .filter(|e| e.user_id == user_id && e.occurred_at >= since)
            .cloned()
            .collect())
    }
}
