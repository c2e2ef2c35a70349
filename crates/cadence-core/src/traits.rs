//! Collaborator traits consumed by the engine.
//!
//! Persistence, attempt history, content generation, and wall-clock time are
//! external concerns. The `cadence-store` crate ships implementations; the
//! engine only talks to these narrow interfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{
    Attempt, ChallengeId, ChallengeType, DifficultyLevel, ModuleEvent, RepetitionSession,
    SessionStatus, SkillDimension, UserId,
};
use crate::profile::DifficultyProfile;

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Durable store for profiles, review sessions, and graded attempts.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Load a profile, or `None` if the user has never submitted an attempt.
    async fn load_profile(&self, user_id: &str) -> Result<Option<DifficultyProfile>, EngineError>;

    /// Save a profile whose `version` is the version it was loaded at.
    ///
    /// Returns the new version. Fails with [`EngineError::Conflict`] if the
    /// stored version moved in the meantime.
    async fn save_profile(&self, profile: &DifficultyProfile) -> Result<u64, EngineError>;

    /// Sessions for a user matching `filter`.
    async fn load_sessions(
        &self,
        user_id: &str,
        filter: &SessionFilter,
    ) -> Result<Vec<RepetitionSession>, EngineError>;

    /// A single session by id.
    async fn load_session(&self, session_id: Uuid)
        -> Result<Option<RepetitionSession>, EngineError>;

    /// Insert or replace a session.
    async fn save_session(&self, session: &RepetitionSession) -> Result<(), EngineError>;

    /// Sessions of any user that are waiting (`scheduled` or `delayed`) and
    /// whose `scheduled_for` is at or before `now`.
    async fn query_due_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RepetitionSession>, EngineError>;

    /// Record a graded attempt.
    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), EngineError>;
}

/// Which sessions to return from [`ProfileRepository::load_sessions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub challenge_id: Option<ChallengeId>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

impl SessionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_challenge(challenge_id: impl Into<ChallengeId>) -> Self {
        Self {
            challenge_id: Some(challenge_id.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, session: &RepetitionSession) -> bool {
        self.challenge_id
            .as_ref()
            .map_or(true, |id| *id == session.challenge_id)
            && self.status.map_or(true, |s| s == session.status)
    }
}

// ---------------------------------------------------------------------------
// Attempt history
// ---------------------------------------------------------------------------

/// Read-only source of past activity, used for performance analysis.
#[async_trait]
pub trait AttemptHistory: Send + Sync {
    /// Attempts started within the last `window_days` days.
    async fn load_attempts(&self, user_id: &str, window_days: u32)
        -> Result<Vec<Attempt>, EngineError>;

    /// Non-attempt activity within the last `window_days` days.
    async fn load_module_events(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<Vec<ModuleEvent>, EngineError>;
}

// ---------------------------------------------------------------------------
// Content generation
// ---------------------------------------------------------------------------

/// What kind of challenge to produce next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequest {
    pub user_id: UserId,
    pub challenge_type: ChallengeType,
    pub skill_dimensions: Vec<SkillDimension>,
    pub difficulty_level: DifficultyLevel,
}

/// Generated challenge content. The engine treats it as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeContent {
    pub title: String,
    pub body: String,
}

/// Produces challenge wording/code for a requested challenge kind.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Human-readable generator name.
    fn name(&self) -> &str;

    async fn generate(&self, request: &ContentRequest) -> anyhow::Result<ChallengeContent>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that returns a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
