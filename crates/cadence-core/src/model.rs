//! Core data model types for cadence.
//!
//! These are the plain data structures the engine reads and writes:
//! difficulty levels, skill dimensions, challenges, attempts, review
//! sessions, and the derived performance snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a learner, owned by the surrounding application.
pub type UserId = String;

/// Identifier of a challenge, owned by the surrounding application.
pub type ChallengeId = String;

/// Ordinal difficulty level of a learner profile or a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    VeryBeginner = 1,
    Beginner = 2,
    Intermediate = 3,
    Advanced = 4,
    Expert = 5,
}

impl DifficultyLevel {
    /// All levels in ascending order.
    pub const ALL: [DifficultyLevel; 5] = [
        DifficultyLevel::VeryBeginner,
        DifficultyLevel::Beginner,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Advanced,
        DifficultyLevel::Expert,
    ];

    /// Ordinal value in `1..=5`.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Level for an ordinal, or `None` outside `1..=5`.
    pub fn from_ordinal(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    /// One level harder, saturating at `Expert`.
    pub fn harder(self) -> Self {
        Self::from_ordinal(self.ordinal() + 1).unwrap_or(DifficultyLevel::Expert)
    }

    /// One level easier, saturating at `VeryBeginner`.
    pub fn easier(self) -> Self {
        Self::from_ordinal(self.ordinal() - 1).unwrap_or(DifficultyLevel::VeryBeginner)
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DifficultyLevel::VeryBeginner => "very_beginner",
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
            DifficultyLevel::Expert => "expert",
        };
        f.write_str(s)
    }
}

impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "very_beginner" | "very-beginner" | "1" => Ok(DifficultyLevel::VeryBeginner),
            "beginner" | "2" => Ok(DifficultyLevel::Beginner),
            "intermediate" | "3" => Ok(DifficultyLevel::Intermediate),
            "advanced" | "4" => Ok(DifficultyLevel::Advanced),
            "expert" | "5" => Ok(DifficultyLevel::Expert),
            other => Err(format!("unknown difficulty level: {other}")),
        }
    }
}

/// An independently tracked competence axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillDimension {
    JacKnowledge,
    ProblemSolving,
    CodingSkill,
}

impl SkillDimension {
    /// Every dimension, in the fixed tie-break order.
    pub const ALL: [SkillDimension; 3] = [
        SkillDimension::JacKnowledge,
        SkillDimension::ProblemSolving,
        SkillDimension::CodingSkill,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkillDimension::JacKnowledge => "jac_knowledge",
            SkillDimension::ProblemSolving => "problem_solving",
            SkillDimension::CodingSkill => "coding_skill",
        }
    }
}

impl fmt::Display for SkillDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jac_knowledge" => Ok(SkillDimension::JacKnowledge),
            "problem_solving" => Ok(SkillDimension::ProblemSolving),
            "coding_skill" => Ok(SkillDimension::CodingSkill),
            other => Err(format!("unknown skill dimension: {other}")),
        }
    }
}

/// Kind of challenge; selects the scoring function.
///
/// Unrecognized names deserialize into `Other` so that a bad type name is
/// reported as a validation problem instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChallengeType {
    Quiz,
    Coding,
    Debug,
    Scenario,
    General,
    Other(String),
}

impl ChallengeType {
    pub fn as_str(&self) -> &str {
        match self {
            ChallengeType::Quiz => "quiz",
            ChallengeType::Coding => "coding",
            ChallengeType::Debug => "debug",
            ChallengeType::Scenario => "scenario",
            ChallengeType::General => "general",
            ChallengeType::Other(name) => name,
        }
    }

    /// Whether this is one of the built-in types.
    pub fn is_known(&self) -> bool {
        !matches!(self, ChallengeType::Other(_))
    }
}

impl From<String> for ChallengeType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "quiz" => ChallengeType::Quiz,
            "coding" => ChallengeType::Coding,
            "debug" => ChallengeType::Debug,
            "scenario" => ChallengeType::Scenario,
            "general" => ChallengeType::General,
            _ => ChallengeType::Other(s),
        }
    }
}

impl From<&str> for ChallengeType {
    fn from(s: &str) -> Self {
        ChallengeType::from(s.to_string())
    }
}

impl From<ChallengeType> for String {
    fn from(t: ChallengeType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A challenge the learner can attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    #[serde(default)]
    pub title: String,
    pub challenge_type: ChallengeType,
    pub difficulty_level: DifficultyLevel,
    /// Targeted dimensions, weakest first.
    #[serde(default)]
    pub skill_dimensions_targeted: Vec<SkillDimension>,
    /// Expected answers for quiz questions, by position.
    #[serde(default)]
    pub answer_key: Vec<String>,
    #[serde(default)]
    pub total_attempts: u32,
    #[serde(default)]
    pub successful_attempts: u32,
}

impl Challenge {
    pub fn new(
        id: impl Into<ChallengeId>,
        challenge_type: ChallengeType,
        difficulty_level: DifficultyLevel,
    ) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            challenge_type,
            difficulty_level,
            skill_dimensions_targeted: Vec::new(),
            answer_key: Vec::new(),
            total_attempts: 0,
            successful_attempts: 0,
        }
    }

    /// `successful_attempts / total_attempts`, or 0 without attempts.
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        f64::from(self.successful_attempts) / f64::from(self.total_attempts)
    }

    /// Count one more attempt against this challenge.
    pub fn record_outcome(&mut self, successful: bool) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        if successful {
            self.successful_attempts = self.successful_attempts.saturating_add(1);
        }
    }
}

/// A named collection of challenges loaded from a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub challenges: Vec<Challenge>,
}

impl Catalog {
    pub fn get(&self, challenge_id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == challenge_id)
    }
}

/// One raw answer submitted as part of an attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// What the learner answered (option text, code, or prose).
    pub answer: String,
    /// Expected answer, when known by the caller. Falls back to the
    /// challenge's `answer_key` for quizzes.
    #[serde(default)]
    pub expected: Option<String>,
}

impl Response {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            expected: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Abandoned,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptStatus::Started => "started",
            AttemptStatus::InProgress => "in progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// A learner's attempt at a challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub challenge_type: ChallengeType,
    pub status: AttemptStatus,
    /// Score in `[0, 1]`, once graded.
    #[serde(default)]
    pub score: Option<f64>,
    /// Minutes spent on the attempt.
    #[serde(default)]
    pub time_spent: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Status of a spaced-repetition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Ready,
    Completed,
    Delayed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ready => "ready",
            SessionStatus::Completed => "completed",
            SessionStatus::Delayed => "delayed",
        };
        f.write_str(s)
    }
}

/// SM-2 review state for one (user, challenge) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    /// 1-based count of successful reviews in the current run.
    pub review_stage: u32,
    /// Never below 1.3.
    pub ease_factor: f64,
    /// Never below 1.
    pub interval_days: u32,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub quality_rating: Option<u8>,
    pub status: SessionStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A non-attempt learning activity (e.g. a module page view), used for
/// engagement and velocity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEvent {
    pub user_id: UserId,
    pub module_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Direction of a performance trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient_data",
        };
        f.write_str(s)
    }
}

/// Aggregated view of a learner's recent performance. Derived, not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub success_rate: f64,
    pub average_score: f64,
    pub consistency: f64,
    pub engagement: f64,
    /// Activities per day over the analysis window.
    pub learning_velocity: f64,
    pub trend: Trend,
    pub retention_rate: f64,
}
