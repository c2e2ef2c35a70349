//! Engine error types.
//!
//! Validation failures are rejected locally and never mutate state. Storage
//! failures come from the repository. Write conflicts are the only errors the
//! engine retries on its own.

use thiserror::Error;

/// Input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// SM-2 recall quality must be in `0..=5`.
    #[error("quality rating {0} is outside 0..=5")]
    QualityOutOfRange(u8),

    /// No scorer is registered for this challenge type.
    #[error("unknown challenge type: {0}")]
    UnknownChallengeType(String),

    /// A required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A score outside `[0, 1]` or not a number.
    #[error("score {0} is outside [0, 1]")]
    InvalidScore(f64),

    /// An analysis window of zero days.
    #[error("analysis window must be at least one day, got {0}")]
    InvalidWindow(u32),

    /// A postponement of zero days.
    #[error("postponement must be at least one day, got {0}")]
    InvalidDelay(u32),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A concurrent writer saved the profile first.
    #[error("write conflict on profile of {user_id}: expected version {expected}, found {found}")]
    Conflict {
        user_id: String,
        expected: u64,
        found: u64,
    },

    /// The repository failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Returns `true` if repeating the operation against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
