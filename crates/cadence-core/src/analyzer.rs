//! Window-based performance aggregation.
//!
//! Pure functions over literal history: nothing here touches a repository,
//! so the analyzer can run beside writers and be fed fixtures in tests.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::model::{Attempt, ModuleEvent, PerformanceSnapshot, RepetitionSession, Trend};
use crate::statistics::{consistency, mean, ratio_or, unit_clamp};

/// Score at or above which an attempt counts as a success.
pub const SUCCESS_THRESHOLD: f64 = 0.6;
/// Scored attempts needed before a trend is reported.
pub const MIN_ATTEMPTS_FOR_TREND: usize = 5;
/// Half-mean difference that counts as movement.
pub const TREND_DELTA: f64 = 0.1;
/// Stage count that maps to full retention.
pub const RETENTION_STAGE_CEILING: f64 = 10.0;

const RECENT_ACTIVITY_DAYS: i64 = 7;
const RECENT_ACTIVITY_TARGET: f64 = 10.0;
const TOTAL_ACTIVITY_TARGET: f64 = 20.0;
const CHALLENGE_TYPE_TARGET: f64 = 3.0;

/// History a snapshot is computed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisInput<'a> {
    pub attempts: &'a [Attempt],
    pub sessions: &'a [RepetitionSession],
    pub module_events: &'a [ModuleEvent],
}

impl<'a> AnalysisInput<'a> {
    pub fn attempts(attempts: &'a [Attempt]) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    pub fn with_sessions(mut self, sessions: &'a [RepetitionSession]) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_module_events(mut self, module_events: &'a [ModuleEvent]) -> Self {
        self.module_events = module_events;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceAnalyzer;

impl PerformanceAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate a window of history into a [`PerformanceSnapshot`].
    ///
    /// `window_days` only scales learning velocity; the caller is expected to
    /// have loaded history for the same window.
    pub fn analyze(
        &self,
        input: &AnalysisInput<'_>,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<PerformanceSnapshot, ValidationError> {
        if window_days == 0 {
            return Err(ValidationError::InvalidWindow(window_days));
        }

        let scores = chronological_scores(input.attempts);
        let successes = input
            .attempts
            .iter()
            .filter(|a| a.score.is_some_and(|s| s >= SUCCESS_THRESHOLD))
            .count();

        let snapshot = PerformanceSnapshot {
            success_rate: ratio_or(successes as f64, input.attempts.len() as f64, 0.0),
            average_score: mean(&scores).unwrap_or(0.0),
            consistency: consistency(&scores),
            engagement: engagement(input, now),
            learning_velocity: learning_velocity(input, window_days),
            trend: trend(&scores),
            retention_rate: retention_rate(input.sessions),
        };

        tracing::debug!(
            attempts = input.attempts.len(),
            sessions = input.sessions.len(),
            success_rate = snapshot.success_rate,
            trend = %snapshot.trend,
            "performance analyzed"
        );
        Ok(snapshot)
    }
}

/// Non-null scores ordered by completion time (start time when unfinished).
fn chronological_scores(attempts: &[Attempt]) -> Vec<f64> {
    let mut scored: Vec<(DateTime<Utc>, f64)> = attempts
        .iter()
        .filter_map(|a| a.score.map(|s| (a.completed_at.unwrap_or(a.started_at), s)))
        .collect();
    scored.sort_by_key(|(at, _)| *at);
    scored.into_iter().map(|(_, s)| s).collect()
}

/// Compare the mean of the later half of scores against the earlier half.
pub fn trend(scores: &[f64]) -> Trend {
    if scores.len() < MIN_ATTEMPTS_FOR_TREND {
        return Trend::InsufficientData;
    }
    let (early, late) = scores.split_at(scores.len() / 2);
    let (Some(early), Some(late)) = (mean(early), mean(late)) else {
        return Trend::InsufficientData;
    };
    let delta = late - early;
    if delta > TREND_DELTA {
        Trend::Improving
    } else if delta < -TREND_DELTA {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn engagement(input: &AnalysisInput<'_>, now: DateTime<Utc>) -> f64 {
    let since = now - Duration::days(RECENT_ACTIVITY_DAYS);
    let recent = input.attempts.iter().filter(|a| a.started_at >= since).count()
        + input
            .module_events
            .iter()
            .filter(|e| e.occurred_at >= since)
            .count();
    let total = input.attempts.len() + input.module_events.len();
    let types: HashSet<&str> = input
        .attempts
        .iter()
        .map(|a| a.challenge_type.as_str())
        .collect();
    let completed_reviews = input
        .sessions
        .iter()
        .filter(|s| s.completed_at.is_some())
        .count();

    let value = 0.4 * (recent as f64 / RECENT_ACTIVITY_TARGET).min(1.0)
        + 0.3 * (total as f64 / TOTAL_ACTIVITY_TARGET).min(1.0)
        + 0.2 * (types.len() as f64 / CHALLENGE_TYPE_TARGET).min(1.0)
        + 0.1 * ratio_or(completed_reviews as f64, input.sessions.len() as f64, 0.0);
    unit_clamp(value)
}

fn learning_velocity(input: &AnalysisInput<'_>, window_days: u32) -> f64 {
    let activities = input.attempts.len() + input.module_events.len() + input.sessions.len();
    activities as f64 / f64::from(window_days)
}

fn retention_rate(sessions: &[RepetitionSession]) -> f64 {
    let stages: f64 = sessions.iter().map(|s| f64::from(s.review_stage)).sum();
    unit_clamp(ratio_or(
        stages,
        RETENTION_STAGE_CEILING * sessions.len() as f64,
        0.0,
    ))
}
