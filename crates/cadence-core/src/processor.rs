//! Attempt processing and the engine's service surface.
//!
//! [`AttemptProcessor`] ties the components together: it scores a submitted
//! attempt, steps the learner's difficulty profile, opens or fast-tracks a
//! review session, and picks the next challenge. It also serves reviews,
//! postponements, analysis, manual adjustments, and the due sweep.
//!
//! All writes for one user run under that user's lock, and profile saves are
//! retried on version conflicts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::analyzer::{AnalysisInput, PerformanceAnalyzer};
use crate::error::{EngineError, ValidationError};
use crate::locks::UserLocks;
use crate::model::{
    Attempt, AttemptStatus, Challenge, ChallengeType, DifficultyLevel, PerformanceSnapshot,
    RepetitionSession, Response, SessionStatus, SkillDimension, UserId,
};
use crate::profile::{
    AdjustmentDirection, AdjustmentOutcome, DifficultyProfile, DifficultyRecommendation,
};
use crate::scheduler::{
    is_due, EnsureOutcome, SchedulerConfig, SpacedRepetitionScheduler, MAX_QUALITY,
};
use crate::scoring::ScorerRegistry;
use crate::selector::ChallengeSelector;
use crate::traits::{
    AttemptHistory, ChallengeContent, Clock, ContentGenerator, ContentRequest, ProfileRepository,
    SessionFilter,
};

/// Configuration for the attempt processor.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Score at or above which an attempt is successful and opens a session.
    pub success_threshold: f64,
    /// Score at or above which an existing session becomes ready at once.
    pub ready_threshold: f64,
    /// Extra load-mutate-save cycles after a profile write conflict.
    pub max_conflict_retries: u32,
    /// Default history window for analysis.
    pub analysis_window_days: u32,
    /// Maximum attempts processed at once by `process_batch`.
    pub batch_parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            success_threshold: 0.6,
            ready_threshold: 0.8,
            max_conflict_retries: 3,
            analysis_window_days: 30,
            batch_parallelism: 4,
        }
    }
}

/// A submitted attempt.
#[derive(Debug, Clone)]
pub struct AttemptInput {
    pub user_id: UserId,
    pub challenge: Challenge,
    pub responses: Vec<Response>,
    /// Minutes.
    pub time_spent: u32,
    /// Defaults to the processing time.
    pub started_at: Option<DateTime<Utc>>,
}

impl AttemptInput {
    pub fn new(user_id: impl Into<UserId>, challenge: Challenge, responses: Vec<Response>) -> Self {
        Self {
            user_id: user_id.into(),
            challenge,
            responses,
            time_spent: 0,
            started_at: None,
        }
    }

    pub fn with_time_spent(mut self, minutes: u32) -> Self {
        self.time_spent = minutes;
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// What happened to the review session of the attempted challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SchedulingOutcome {
    Created {
        session_id: Uuid,
        scheduled_for: DateTime<Utc>,
    },
    MarkedReady {
        session_id: Uuid,
    },
    Unchanged {
        session_id: Uuid,
    },
    /// The attempt was not successful and no session exists.
    NotEligible,
}

impl From<&EnsureOutcome> for SchedulingOutcome {
    fn from(outcome: &EnsureOutcome) -> Self {
        match outcome {
            EnsureOutcome::Created(s) => SchedulingOutcome::Created {
                session_id: s.id,
                scheduled_for: s.scheduled_for,
            },
            EnsureOutcome::MarkedReady(s) => SchedulingOutcome::MarkedReady { session_id: s.id },
            EnsureOutcome::Unchanged(s) => SchedulingOutcome::Unchanged { session_id: s.id },
            EnsureOutcome::NotEligible => SchedulingOutcome::NotEligible,
        }
    }
}

/// Suggested next challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStep {
    pub challenge_type: ChallengeType,
    pub targeted_dimensions: Vec<SkillDimension>,
    pub difficulty_level: DifficultyLevel,
    /// Present when a content generator is configured and succeeded.
    pub content: Option<ChallengeContent>,
}

/// Outcome of processing one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub attempt_id: Uuid,
    pub user_id: UserId,
    pub challenge_id: String,
    pub score: f64,
    /// Name of the scorer used.
    pub scorer: String,
    pub status: AttemptStatus,
    pub adjustment: AdjustmentOutcome,
    /// The challenge with its attempt statistics updated.
    pub updated_challenge: Challenge,
    pub scheduling: SchedulingOutcome,
    pub next: NextStep,
    /// Validation problems that did not stop processing.
    pub errors: Vec<String>,
}

impl ProcessingResult {
    /// The new difficulty level, if this attempt changed it.
    pub fn updated_difficulty(&self) -> Option<DifficultyLevel> {
        self.adjustment
            .level_changed()
            .then_some(self.adjustment.current)
    }
}

/// A snapshot and the recommendation derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentAdvice {
    pub snapshot: PerformanceSnapshot,
    pub recommendation: DifficultyRecommendation,
}

/// Counts from one due sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Sessions moved to `ready`.
    pub promoted: usize,
    /// Candidates that changed before they could be promoted.
    pub skipped: usize,
}

/// The engine's orchestrator.
pub struct AttemptProcessor {
    repo: Arc<dyn ProfileRepository>,
    history: Arc<dyn AttemptHistory>,
    clock: Arc<dyn Clock>,
    content: Option<Arc<dyn ContentGenerator>>,
    scorers: ScorerRegistry,
    scheduler: SpacedRepetitionScheduler,
    analyzer: PerformanceAnalyzer,
    selector: ChallengeSelector,
    locks: UserLocks,
    config: EngineConfig,
}

impl AttemptProcessor {
    pub fn new(
        repo: Arc<dyn ProfileRepository>,
        history: Arc<dyn AttemptHistory>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let scheduler = SpacedRepetitionScheduler::new(SchedulerConfig {
            session_threshold: config.success_threshold,
            ready_threshold: config.ready_threshold,
        });
        Self {
            repo,
            history,
            clock,
            content: None,
            scorers: ScorerRegistry::default(),
            scheduler,
            analyzer: PerformanceAnalyzer::new(),
            selector: ChallengeSelector::new(),
            locks: UserLocks::new(),
            config,
        }
    }

    pub fn with_content_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.content = Some(generator);
        self
    }

    pub fn with_scorers(mut self, scorers: ScorerRegistry) -> Self {
        self.scorers = scorers;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score an attempt and apply its effects.
    ///
    /// Under the user's lock the profile is adjusted and the attempt is
    /// recorded, then a review session is opened or fast-tracked when the
    /// attempt succeeded. The next challenge is chosen after the lock is
    /// released. An unknown challenge type is reported in `errors` and scored
    /// by the general scorer.
    ///
    /// The attempt is saved only after the profile commit, so an attempt whose
    /// profile update ran out of conflict retries leaves no history behind.
    pub async fn process(&self, input: AttemptInput) -> Result<ProcessingResult, EngineError> {
        if input.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id").into());
        }
        if input.challenge.id.trim().is_empty() {
            return Err(ValidationError::MissingField("challenge_id").into());
        }

        let mut errors = Vec::new();
        let outcome = self.scorers.score(&input.challenge, &input.responses);
        if let Some(fallback) = &outcome.fallback {
            errors.push(fallback.to_string());
        }
        let score = outcome.score;
        let successful = score >= self.config.success_threshold;

        let guard = self.locks.acquire(&input.user_id).await;
        let now = self.clock.now();

        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: input.user_id.clone(),
            challenge_id: input.challenge.id.clone(),
            challenge_type: input.challenge.challenge_type.clone(),
            status: if successful {
                AttemptStatus::Completed
            } else {
                AttemptStatus::Failed
            },
            score: Some(score),
            time_spent: input.time_spent,
            started_at: input.started_at.unwrap_or(now),
            completed_at: Some(now),
        };
        let (profile, adjustment) = self
            .update_profile(&input.user_id, |profile| {
                Ok(profile.adjust_difficulty(score, now)?)
            })
            .await?;
        self.repo.save_attempt(&attempt).await?;

        let scheduling = if successful {
            let existing = self
                .repo
                .load_sessions(&input.user_id, &SessionFilter::for_challenge(&input.challenge.id))
                .await?
                .into_iter()
                .find(|s| s.status != SessionStatus::Completed);
            let ensured = self.scheduler.ensure_session(
                existing,
                &input.user_id,
                &input.challenge.id,
                score,
                now,
            );
            if let Some(session) = ensured.session_to_save() {
                self.repo.save_session(session).await?;
            }
            SchedulingOutcome::from(&ensured)
        } else {
            SchedulingOutcome::NotEligible
        };

        drop(guard);
        self.locks.prune();

        let mut updated_challenge = input.challenge;
        updated_challenge.record_outcome(successful);

        let next = self.next_step(&profile).await;

        tracing::info!(
            user_id = %attempt.user_id,
            challenge_id = %attempt.challenge_id,
            score,
            scorer = %outcome.scorer,
            difficulty = %profile.current_difficulty(),
            next = %next.challenge_type,
            "attempt processed"
        );

        Ok(ProcessingResult {
            attempt_id: attempt.id,
            user_id: attempt.user_id,
            challenge_id: attempt.challenge_id,
            score,
            scorer: outcome.scorer,
            status: attempt.status,
            adjustment,
            updated_challenge,
            scheduling,
            next,
            errors,
        })
    }

    /// Process many attempts concurrently. Results are in input order.
    pub async fn process_batch(
        &self,
        inputs: Vec<AttemptInput>,
    ) -> Vec<Result<ProcessingResult, EngineError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.batch_parallelism.max(1)));
        let total = inputs.len();
        let mut futures = FuturesUnordered::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => self.process(input).await,
                    Err(_) => Err(EngineError::Storage("batch semaphore closed".into())),
                };
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(item) = futures.next().await {
            if let (_, Err(e)) = &item {
                tracing::warn!(error = %e, "batch attempt failed");
            }
            results.push(item);
        }
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Record a review of a session and return when it is next due.
    pub async fn complete_review(
        &self,
        session_id: Uuid,
        quality: u8,
    ) -> Result<DateTime<Utc>, EngineError> {
        if quality > MAX_QUALITY {
            return Err(ValidationError::QualityOutOfRange(quality).into());
        }
        self.modify_session(session_id, |scheduler, session, now| {
            scheduler.complete_review(session, quality, now)
        })
        .await
    }

    /// Push a session back by `days`.
    pub async fn postpone(&self, session_id: Uuid, days: u32) -> Result<DateTime<Utc>, EngineError> {
        if days == 0 {
            return Err(ValidationError::InvalidDelay(days).into());
        }
        self.modify_session(session_id, |scheduler, session, now| {
            scheduler.postpone(session, days, now)
        })
        .await
    }

    /// Sessions of a user that are ready and due, earliest first.
    pub async fn due_reviews(&self, user_id: &str) -> Result<Vec<RepetitionSession>, EngineError> {
        let now = self.clock.now();
        let mut due: Vec<RepetitionSession> = self
            .repo
            .load_sessions(user_id, &SessionFilter::all().with_status(SessionStatus::Ready))
            .await?
            .into_iter()
            .filter(|s| is_due(s, now))
            .collect();
        due.sort_by_key(|s| s.scheduled_for);
        Ok(due)
    }

    /// All sessions of a user, earliest due first.
    pub async fn sessions(&self, user_id: &str) -> Result<Vec<RepetitionSession>, EngineError> {
        let mut sessions = self.repo.load_sessions(user_id, &SessionFilter::all()).await?;
        sessions.sort_by_key(|s| s.scheduled_for);
        Ok(sessions)
    }

    /// The stored profile, or the default one for a user without attempts.
    pub async fn profile(&self, user_id: &str) -> Result<DifficultyProfile, EngineError> {
        Ok(self
            .repo
            .load_profile(user_id)
            .await?
            .unwrap_or_else(|| DifficultyProfile::new(user_id)))
    }

    /// Performance over the last `window_days` (the configured window when `None`).
    pub async fn analyze(
        &self,
        user_id: &str,
        window_days: Option<u32>,
    ) -> Result<PerformanceSnapshot, EngineError> {
        let window = window_days.unwrap_or(self.config.analysis_window_days);
        if window == 0 {
            return Err(ValidationError::InvalidWindow(window).into());
        }
        let attempts = self.history.load_attempts(user_id, window).await?;
        let events = self.history.load_module_events(user_id, window).await?;
        let sessions = self.repo.load_sessions(user_id, &SessionFilter::all()).await?;

        let input = AnalysisInput::attempts(&attempts)
            .with_sessions(&sessions)
            .with_module_events(&events);
        Ok(self.analyzer.analyze(&input, window, self.clock.now())?)
    }

    /// Advisory window-based recommendation. Changes nothing.
    pub async fn recommend_adjustment(
        &self,
        user_id: &str,
        window_days: Option<u32>,
    ) -> Result<AdjustmentAdvice, EngineError> {
        let snapshot = self.analyze(user_id, window_days).await?;
        let profile = self.profile(user_id).await?;
        let recommendation = profile.recommend(&snapshot);
        tracing::debug!(
            user_id,
            direction = %recommendation.direction,
            confidence = recommendation.confidence,
            "difficulty recommendation"
        );
        Ok(AdjustmentAdvice {
            snapshot,
            recommendation,
        })
    }

    /// Step a profile by hand or from a reviewed recommendation.
    pub async fn apply_adjustment(
        &self,
        user_id: &str,
        direction: AdjustmentDirection,
    ) -> Result<AdjustmentOutcome, EngineError> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id").into());
        }
        let guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        let updated = self
            .update_profile(user_id, |profile| Ok(profile.apply_adjustment(direction, now)))
            .await;
        drop(guard);
        self.locks.prune();
        let (_, outcome) = updated?;
        Ok(outcome)
    }

    /// Move every waiting session whose time has come to `ready`.
    pub async fn sweep_due(&self) -> Result<SweepSummary, EngineError> {
        let now = self.clock.now();
        let candidates = self.repo.query_due_sessions(now).await?;

        let mut by_user: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();
        for session in candidates {
            by_user.entry(session.user_id).or_default().push(session.id);
        }

        let mut summary = SweepSummary::default();
        for (user_id, ids) in by_user {
            let _guard = self.locks.acquire(&user_id).await;
            for id in ids {
                // re-read under the lock; a review may have landed meanwhile
                let Some(mut session) = self.repo.load_session(id).await? else {
                    summary.skipped += 1;
                    continue;
                };
                if self.scheduler.promote_if_due(&mut session, now) {
                    self.repo.save_session(&session).await?;
                    summary.promoted += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }
        self.locks.prune();

        if summary.promoted > 0 {
            tracing::info!(promoted = summary.promoted, "due sessions promoted");
        }
        Ok(summary)
    }

    /// Load, mutate, and save a profile, retrying on version conflicts.
    /// Callers hold the user's lock.
    async fn update_profile<T, F>(
        &self,
        user_id: &str,
        mut mutate: F,
    ) -> Result<(DifficultyProfile, T), EngineError>
    where
        F: FnMut(&mut DifficultyProfile) -> Result<T, EngineError>,
    {
        let mut retries = 0;
        loop {
            let mut profile = self
                .repo
                .load_profile(user_id)
                .await?
                .unwrap_or_else(|| DifficultyProfile::new(user_id));
            let value = mutate(&mut profile)?;
            match self.repo.save_profile(&profile).await {
                Ok(version) => {
                    profile.set_version(version);
                    return Ok((profile, value));
                }
                Err(e) if e.is_retryable() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    tracing::warn!(user_id, retries, error = %e, "profile write conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn modify_session<F>(&self, session_id: Uuid, change: F) -> Result<DateTime<Utc>, EngineError>
    where
        F: FnOnce(
            &SpacedRepetitionScheduler,
            &mut RepetitionSession,
            DateTime<Utc>,
        ) -> Result<DateTime<Utc>, ValidationError>,
    {
        let owner = self
            .repo
            .load_session(session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("session", session_id.to_string()))?
            .user_id;

        let guard = self.locks.acquire(&owner).await;
        let changed = self.change_session(session_id, change).await;
        drop(guard);
        self.locks.prune();
        changed
    }

    /// Reload, change, and save one session. Callers hold the owner's lock.
    async fn change_session<F>(&self, session_id: Uuid, change: F) -> Result<DateTime<Utc>, EngineError>
    where
        F: FnOnce(
            &SpacedRepetitionScheduler,
            &mut RepetitionSession,
            DateTime<Utc>,
        ) -> Result<DateTime<Utc>, ValidationError>,
    {
        let mut session = self
            .repo
            .load_session(session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("session", session_id.to_string()))?;
        let next = change(&self.scheduler, &mut session, self.clock.now())?;
        self.repo.save_session(&session).await?;
        Ok(next)
    }

    async fn next_step(&self, profile: &DifficultyProfile) -> NextStep {
        let choice = self.selector.recommend(profile);
        let difficulty_level = profile.current_difficulty();

        let content = match &self.content {
            Some(generator) => {
                let request = ContentRequest {
                    user_id: profile.user_id().to_string(),
                    challenge_type: choice.challenge_type.clone(),
                    skill_dimensions: choice.targeted_dimensions.clone(),
                    difficulty_level,
                };
                match generator.generate(&request).await {
                    Ok(content) => Some(content),
                    Err(e) => {
                        tracing::warn!(
                            generator = generator.name(),
                            error = %e,
                            "content generation failed"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        NextStep {
            challenge_type: choice.challenge_type,
            targeted_dimensions: choice.targeted_dimensions,
            difficulty_level,
            content,
        }
    }
}
