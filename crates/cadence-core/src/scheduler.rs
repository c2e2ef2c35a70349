//! SM-2 spaced-repetition scheduling.
//!
//! A session is opened after a successful attempt and re-scheduled after
//! every review. Intervals grow with an ease factor that is adjusted by the
//! 0–5 recall quality and floored at 1.3.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::model::{RepetitionSession, SessionStatus};

/// Ease factor of a new session.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;
/// Lowest ease factor a session can reach.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Highest recall quality.
pub const MAX_QUALITY: u8 = 5;
/// Lowest recall quality that counts as a successful review.
pub const PASSING_QUALITY: u8 = 3;
/// Interval after the second successful review.
const SECOND_INTERVAL_DAYS: u32 = 6;

/// Score thresholds for opening and fast-tracking sessions.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum attempt score that opens a session.
    pub session_threshold: f64,
    /// Minimum attempt score that makes an existing session ready now.
    pub ready_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            session_threshold: 0.6,
            ready_threshold: 0.8,
        }
    }
}

/// What [`SpacedRepetitionScheduler::ensure_session`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsureOutcome {
    /// A new session was opened.
    Created(RepetitionSession),
    /// An existing session was pulled forward to `ready`.
    MarkedReady(RepetitionSession),
    /// An existing session was left as is.
    Unchanged(RepetitionSession),
    /// No session exists and the score is too low to open one.
    NotEligible,
}

impl EnsureOutcome {
    /// The session after the call, if any. `Unchanged` sessions need no save.
    pub fn session_to_save(&self) -> Option<&RepetitionSession> {
        match self {
            EnsureOutcome::Created(s) | EnsureOutcome::MarkedReady(s) => Some(s),
            EnsureOutcome::Unchanged(_) | EnsureOutcome::NotEligible => None,
        }
    }

    pub fn session(&self) -> Option<&RepetitionSession> {
        match self {
            EnsureOutcome::Created(s)
            | EnsureOutcome::MarkedReady(s)
            | EnsureOutcome::Unchanged(s) => Some(s),
            EnsureOutcome::NotEligible => None,
        }
    }
}

/// Stateless SM-2 scheduler.
#[derive(Debug, Clone, Default)]
pub struct SpacedRepetitionScheduler {
    config: SchedulerConfig,
}

impl SpacedRepetitionScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// A fresh session due one day from `now`.
    pub fn new_session(
        &self,
        user_id: &str,
        challenge_id: &str,
        now: DateTime<Utc>,
    ) -> RepetitionSession {
        RepetitionSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
            review_stage: 1,
            ease_factor: INITIAL_EASE_FACTOR,
            interval_days: 1,
            scheduled_for: now + Duration::days(1),
            quality_rating: None,
            status: SessionStatus::Scheduled,
            completed_at: None,
            created_at: now,
        }
    }

    /// Open a session after a successful attempt, or fast-track an existing
    /// one after a strong attempt.
    pub fn ensure_session(
        &self,
        existing: Option<RepetitionSession>,
        user_id: &str,
        challenge_id: &str,
        score: f64,
        now: DateTime<Utc>,
    ) -> EnsureOutcome {
        match existing {
            None if score >= self.config.session_threshold => {
                let session = self.new_session(user_id, challenge_id, now);
                tracing::info!(
                    user_id,
                    challenge_id,
                    session_id = %session.id,
                    scheduled_for = %session.scheduled_for,
                    "review session created"
                );
                EnsureOutcome::Created(session)
            }
            None => EnsureOutcome::NotEligible,
            Some(mut session)
                if score >= self.config.ready_threshold
                    && session.status != SessionStatus::Completed =>
            {
                session.status = SessionStatus::Ready;
                session.scheduled_for = session.scheduled_for.min(now);
                tracing::debug!(session_id = %session.id, "review session marked ready");
                EnsureOutcome::MarkedReady(session)
            }
            Some(session) => EnsureOutcome::Unchanged(session),
        }
    }

    /// Record a review and schedule the next one.
    ///
    /// Quality 3 or more advances the stage (intervals 1, 6, then
    /// `round(interval * ease)`); anything lower restarts at stage 1. The
    /// ease factor is updated afterwards and floored at 1.3.
    pub fn complete_review(
        &self,
        session: &mut RepetitionSession,
        quality: u8,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        if quality > MAX_QUALITY {
            return Err(ValidationError::QualityOutOfRange(quality));
        }

        if quality >= PASSING_QUALITY {
            session.interval_days = match session.review_stage {
                0 | 1 => 1,
                2 => SECOND_INTERVAL_DAYS,
                _ => next_interval(session.interval_days, session.ease_factor),
            };
            session.review_stage += 1;
        } else {
            session.review_stage = 1;
            session.interval_days = 1;
        }
        session.ease_factor = next_ease_factor(session.ease_factor, quality);

        session.scheduled_for = now + Duration::days(i64::from(session.interval_days));
        session.status = SessionStatus::Scheduled;
        session.quality_rating = Some(quality);
        session.completed_at = Some(now);

        tracing::debug!(
            session_id = %session.id,
            quality,
            review_stage = session.review_stage,
            interval_days = session.interval_days,
            ease_factor = session.ease_factor,
            "review completed"
        );
        Ok(session.scheduled_for)
    }

    /// Push a session back by `days`, counted from now or from its current
    /// due time, whichever is later.
    pub fn postpone(
        &self,
        session: &mut RepetitionSession,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        if days == 0 {
            return Err(ValidationError::InvalidDelay(days));
        }
        session.scheduled_for = session.scheduled_for.max(now) + Duration::days(i64::from(days));
        session.status = SessionStatus::Delayed;
        Ok(session.scheduled_for)
    }

    /// Move a waiting session whose time has come to `ready`.
    ///
    /// Returns `true` if the status changed.
    pub fn promote_if_due(&self, session: &mut RepetitionSession, now: DateTime<Utc>) -> bool {
        let waiting = matches!(
            session.status,
            SessionStatus::Scheduled | SessionStatus::Delayed
        );
        if waiting && session.scheduled_for <= now {
            session.status = SessionStatus::Ready;
            true
        } else {
            false
        }
    }
}

/// `status == ready && scheduled_for <= now`.
pub fn is_due(session: &RepetitionSession, now: DateTime<Utc>) -> bool {
    session.status == SessionStatus::Ready && session.scheduled_for <= now
}

/// `EF + 0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)`, floored at 1.3.
pub fn next_ease_factor(ease_factor: f64, quality: u8) -> f64 {
    let miss = f64::from(MAX_QUALITY - quality.min(MAX_QUALITY));
    (ease_factor + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASE_FACTOR)
}

fn next_interval(interval_days: u32, ease_factor: f64) -> u32 {
    let next = (f64::from(interval_days) * ease_factor).round();
    if next >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (next as u32).max(1)
    }
}
