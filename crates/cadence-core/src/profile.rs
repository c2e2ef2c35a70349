//! Per-user difficulty profile and its bounded control loop.
//!
//! The profile moves at most one difficulty level and one skill point per
//! dimension on each adjustment. Fields are private so that every mutation
//! goes through [`DifficultyProfile::adjust_difficulty`] or
//! [`DifficultyProfile::apply_adjustment`].

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{DifficultyLevel, PerformanceSnapshot, SkillDimension, Trend, UserId};

/// Lowest skill level.
pub const SKILL_MIN: u8 = 1;
/// Highest skill level.
pub const SKILL_MAX: u8 = 10;

/// Score at or above which the profile steps up.
pub const INCREASE_THRESHOLD: f64 = 0.8;
/// Score at or below which the profile steps down.
pub const DECREASE_THRESHOLD: f64 = 0.4;
/// Score at or above which an attempt extends the success streak.
pub const STREAK_THRESHOLD: f64 = 0.7;
/// Weight kept from the previous accuracy in the EWMA.
const ACCURACY_RETAIN: f64 = 0.7;
/// Weight of the new score in the EWMA.
const ACCURACY_WEIGHT: f64 = 0.3;
/// Number of recent scores kept for challenge selection.
pub const RECENT_SCORE_WINDOW: usize = 5;

/// Skill level per dimension, each in `SKILL_MIN..=SKILL_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevels {
    jac_knowledge: u8,
    problem_solving: u8,
    coding_skill: u8,
}

impl Default for SkillLevels {
    fn default() -> Self {
        Self::uniform(SKILL_MIN)
    }
}

impl SkillLevels {
    /// Every dimension at `level`, clamped into range.
    pub fn uniform(level: u8) -> Self {
        let level = clamp_skill(level);
        Self {
            jac_knowledge: level,
            problem_solving: level,
            coding_skill: level,
        }
    }

    pub fn get(&self, dim: SkillDimension) -> u8 {
        match dim {
            SkillDimension::JacKnowledge => self.jac_knowledge,
            SkillDimension::ProblemSolving => self.problem_solving,
            SkillDimension::CodingSkill => self.coding_skill,
        }
    }

    /// Set one dimension, clamped into range.
    pub fn with(mut self, dim: SkillDimension, level: u8) -> Self {
        *self.slot(dim) = clamp_skill(level);
        self
    }

    /// `(dimension, level)` pairs in the fixed dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (SkillDimension, u8)> + '_ {
        SkillDimension::ALL.iter().map(move |&d| (d, self.get(d)))
    }

    fn slot(&mut self, dim: SkillDimension) -> &mut u8 {
        match dim {
            SkillDimension::JacKnowledge => &mut self.jac_knowledge,
            SkillDimension::ProblemSolving => &mut self.problem_solving,
            SkillDimension::CodingSkill => &mut self.coding_skill,
        }
    }

    fn step_all(&mut self, direction: AdjustmentDirection) {
        for dim in SkillDimension::ALL {
            let slot = self.slot(dim);
            *slot = match direction {
                AdjustmentDirection::Increase => slot.saturating_add(1).min(SKILL_MAX),
                AdjustmentDirection::Decrease => slot.saturating_sub(1).max(SKILL_MIN),
                AdjustmentDirection::Maintain => *slot,
            };
        }
    }
}

fn clamp_skill(level: u8) -> u8 {
    level.clamp(SKILL_MIN, SKILL_MAX)
}

/// Which way to move a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
    Maintain,
}

impl fmt::Display for AdjustmentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdjustmentDirection::Increase => "increase",
            AdjustmentDirection::Decrease => "decrease",
            AdjustmentDirection::Maintain => "maintain",
        };
        f.write_str(s)
    }
}

impl FromStr for AdjustmentDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "increase" | "up" => Ok(AdjustmentDirection::Increase),
            "decrease" | "down" => Ok(AdjustmentDirection::Decrease),
            "maintain" | "keep" => Ok(AdjustmentDirection::Maintain),
            other => Err(format!("unknown adjustment direction: {other}")),
        }
    }
}

/// What an adjustment did to the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub direction: AdjustmentDirection,
    pub previous: DifficultyLevel,
    pub current: DifficultyLevel,
}

impl AdjustmentOutcome {
    /// Whether the difficulty level moved.
    pub fn level_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// How urgently a recommendation should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

/// Advisory, window-based difficulty recommendation. Never applied
/// automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyRecommendation {
    pub direction: AdjustmentDirection,
    pub confidence: f64,
    pub priority: Priority,
    pub current: DifficultyLevel,
    pub suggested: DifficultyLevel,
    pub reason: String,
}

/// One learner's difficulty state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    user_id: UserId,
    current_difficulty: DifficultyLevel,
    skill_levels: SkillLevels,
    recent_accuracy: f64,
    success_streak: u32,
    last_difficulty_change: Option<DateTime<Utc>>,
    #[serde(default)]
    recent_scores: VecDeque<f64>,
    #[serde(default)]
    version: u64,
}

impl DifficultyProfile {
    /// A fresh profile: beginner, every skill at 1, no accuracy history.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            current_difficulty: DifficultyLevel::Beginner,
            skill_levels: SkillLevels::default(),
            recent_accuracy: 0.0,
            success_streak: 0,
            last_difficulty_change: None,
            recent_scores: VecDeque::with_capacity(RECENT_SCORE_WINDOW),
            version: 0,
        }
    }

    pub fn with_difficulty(mut self, level: DifficultyLevel) -> Self {
        self.current_difficulty = level;
        self
    }

    pub fn with_skill_levels(mut self, levels: SkillLevels) -> Self {
        self.skill_levels = levels;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn current_difficulty(&self) -> DifficultyLevel {
        self.current_difficulty
    }

    pub fn skill_levels(&self) -> &SkillLevels {
        &self.skill_levels
    }

    pub fn skill_level(&self, dim: SkillDimension) -> u8 {
        self.skill_levels.get(dim)
    }

    /// EWMA of attempt scores, in `[0, 1]`.
    pub fn recent_accuracy(&self) -> f64 {
        self.recent_accuracy
    }

    pub fn success_streak(&self) -> u32 {
        self.success_streak
    }

    pub fn last_difficulty_change(&self) -> Option<DateTime<Utc>> {
        self.last_difficulty_change
    }

    /// Up to the last five scores, oldest first.
    pub fn recent_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.recent_scores.iter().copied()
    }

    /// Storage version this profile was loaded at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set by repositories after a successful save.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Per-attempt control step.
    ///
    /// Steps level and skills up on `score >= 0.8`, down on `score <= 0.4`,
    /// then folds the score into the accuracy EWMA and the success streak.
    pub fn adjust_difficulty(
        &mut self,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentOutcome, ValidationError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::InvalidScore(score));
        }

        let direction = if score >= INCREASE_THRESHOLD {
            AdjustmentDirection::Increase
        } else if score <= DECREASE_THRESHOLD {
            AdjustmentDirection::Decrease
        } else {
            AdjustmentDirection::Maintain
        };
        let outcome = self.step(direction, now);

        self.recent_accuracy =
            self.recent_accuracy * ACCURACY_RETAIN + score * ACCURACY_WEIGHT;
        if score >= STREAK_THRESHOLD {
            self.success_streak += 1;
        } else {
            self.success_streak = 0;
        }
        if self.recent_scores.len() == RECENT_SCORE_WINDOW {
            self.recent_scores.pop_front();
        }
        self.recent_scores.push_back(score);

        tracing::debug!(
            user_id = %self.user_id,
            score,
            %direction,
            recent_accuracy = self.recent_accuracy,
            success_streak = self.success_streak,
            "profile adjusted"
        );
        Ok(outcome)
    }

    /// Apply a batch/manual adjustment using the same clamped step as
    /// [`adjust_difficulty`](Self::adjust_difficulty), without touching
    /// accuracy or streak.
    pub fn apply_adjustment(
        &mut self,
        direction: AdjustmentDirection,
        now: DateTime<Utc>,
    ) -> AdjustmentOutcome {
        self.step(direction, now)
    }

    /// Window-based recommendation from a performance snapshot. Does not
    /// mutate the profile.
    pub fn recommend(&self, snapshot: &PerformanceSnapshot) -> DifficultyRecommendation {
        let (direction, mut confidence, reason) = if snapshot.success_rate >= 0.8
            && snapshot.consistency >= 0.7
        {
            (
                AdjustmentDirection::Increase,
                (snapshot.success_rate + snapshot.consistency) / 2.0,
                format!(
                    "success rate {:.0}% with consistency {:.2}",
                    snapshot.success_rate * 100.0,
                    snapshot.consistency
                ),
            )
        } else if snapshot.success_rate < 0.4 {
            (
                AdjustmentDirection::Decrease,
                1.0 - snapshot.success_rate,
                format!("success rate {:.0}% is below 40%", snapshot.success_rate * 100.0),
            )
        } else if snapshot.trend == Trend::Declining {
            (
                AdjustmentDirection::Decrease,
                0.6,
                "scores are declining".to_string(),
            )
        } else {
            (
                AdjustmentDirection::Maintain,
                0.5,
                "performance is within the target band".to_string(),
            )
        };

        if snapshot.trend == Trend::InsufficientData {
            confidence /= 2.0;
        }
        let confidence = crate::statistics::unit_clamp(confidence);
        let priority = if confidence >= 0.8 {
            Priority::High
        } else if confidence >= 0.6 {
            Priority::Medium
        } else {
            Priority::Low
        };

        DifficultyRecommendation {
            direction,
            confidence,
            priority,
            current: self.current_difficulty,
            suggested: stepped(self.current_difficulty, direction),
            reason,
        }
    }

    fn step(&mut self, direction: AdjustmentDirection, now: DateTime<Utc>) -> AdjustmentOutcome {
        let previous = self.current_difficulty;
        self.current_difficulty = stepped(previous, direction);
        self.skill_levels.step_all(direction);

        let outcome = AdjustmentOutcome {
            direction,
            previous,
            current: self.current_difficulty,
        };
        if outcome.level_changed() {
            self.last_difficulty_change = Some(now);
            tracing::info!(
                user_id = %self.user_id,
                from = %previous,
                to = %self.current_difficulty,
                "difficulty level changed"
            );
        }
        outcome
    }
}

fn stepped(level: DifficultyLevel, direction: AdjustmentDirection) -> DifficultyLevel {
    match direction {
        AdjustmentDirection::Increase => level.harder(),
        AdjustmentDirection::Decrease => level.easier(),
        AdjustmentDirection::Maintain => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap()
    }

    fn snapshot(success_rate: f64, consistency: f64, trend: Trend) -> PerformanceSnapshot {
        PerformanceSnapshot {
            success_rate,
            average_score: success_rate,
            consistency,
            engagement: 0.5,
            learning_velocity: 1.0,
            trend,
            retention_rate: 0.0,
        }
    }

    #[test]
    fn defaults() {
        let p = DifficultyProfile::new("u1");
        assert_eq!(p.current_difficulty(), DifficultyLevel::Beginner);
        assert!(p.skill_levels().iter().all(|(_, l)| l == 1));
        assert_eq!(p.recent_accuracy(), 0.0);
        assert_eq!(p.success_streak(), 0);
        assert!(p.last_difficulty_change().is_none());
    }

    #[test]
    fn high_then_low_score_round_trips() {
        let mut p = DifficultyProfile::new("u1")
            .with_difficulty(DifficultyLevel::Intermediate)
            .with_skill_levels(SkillLevels::uniform(5));

        let up = p.adjust_difficulty(0.85, now()).unwrap();
        assert!(up.level_changed());
        assert_eq!(p.current_difficulty(), DifficultyLevel::Advanced);
        assert!(p.skill_levels().iter().all(|(_, l)| l == 6));
        assert_eq!(p.last_difficulty_change(), Some(now()));

        p.adjust_difficulty(0.2, now()).unwrap();
        assert_eq!(p.current_difficulty(), DifficultyLevel::Intermediate);
        assert!(p.skill_levels().iter().all(|(_, l)| l == 5));
    }

    #[test]
    fn middle_band_keeps_level() {
        let mut p = DifficultyProfile::new("u1");
        let outcome = p.adjust_difficulty(0.6, now()).unwrap();
        assert_eq!(outcome.direction, AdjustmentDirection::Maintain);
        assert!(!outcome.level_changed());
        assert!(p.last_difficulty_change().is_none());
        assert!((p.recent_accuracy() - 0.18).abs() < 1e-12);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let mut p = DifficultyProfile::new("u1").with_skill_levels(SkillLevels::uniform(5));
        assert_eq!(
            p.adjust_difficulty(0.8, now()).unwrap().direction,
            AdjustmentDirection::Increase
        );
        assert_eq!(
            p.adjust_difficulty(0.4, now()).unwrap().direction,
            AdjustmentDirection::Decrease
        );
    }

    #[test]
    fn bounds_hold_under_long_sequences() {
        let mut p = DifficultyProfile::new("u1");
        for _ in 0..50 {
            p.adjust_difficulty(1.0, now()).unwrap();
        }
        assert_eq!(p.current_difficulty(), DifficultyLevel::Expert);
        assert!(p.skill_levels().iter().all(|(_, l)| l == SKILL_MAX));
        assert_eq!(p.success_streak(), 50);

        for _ in 0..50 {
            p.adjust_difficulty(0.0, now()).unwrap();
        }
        assert_eq!(p.current_difficulty(), DifficultyLevel::VeryBeginner);
        assert!(p.skill_levels().iter().all(|(_, l)| l == SKILL_MIN));
        assert_eq!(p.success_streak(), 0);
    }

    #[test]
    fn level_clamp_still_steps_skills() {
        let mut p = DifficultyProfile::new("u1")
            .with_difficulty(DifficultyLevel::Expert)
            .with_skill_levels(SkillLevels::uniform(4));
        let outcome = p.adjust_difficulty(0.95, now()).unwrap();
        assert!(!outcome.level_changed());
        assert!(p.last_difficulty_change().is_none());
        assert!(p.skill_levels().iter().all(|(_, l)| l == 5));
    }

    #[test]
    fn streak_resets_below_threshold() {
        let mut p = DifficultyProfile::new("u1");
        p.adjust_difficulty(0.7, now()).unwrap();
        p.adjust_difficulty(0.75, now()).unwrap();
        assert_eq!(p.success_streak(), 2);
        p.adjust_difficulty(0.69, now()).unwrap();
        assert_eq!(p.success_streak(), 0);
    }

    #[test]
    fn recent_scores_keep_last_five() {
        let mut p = DifficultyProfile::new("u1");
        for s in [0.1, 0.2, 0.3, 0.5, 0.6, 0.7, 0.75] {
            p.adjust_difficulty(s, now()).unwrap();
        }
        let recent: Vec<f64> = p.recent_scores().collect();
        assert_eq!(recent, vec![0.3, 0.5, 0.6, 0.7, 0.75]);
    }

    #[test]
    fn rejects_out_of_range_score() {
        let mut p = DifficultyProfile::new("u1");
        assert_eq!(
            p.adjust_difficulty(1.2, now()),
            Err(ValidationError::InvalidScore(1.2))
        );
        assert!(p.adjust_difficulty(f64::NAN, now()).is_err());
        assert_eq!(p, DifficultyProfile::new("u1"));
    }

    #[test]
    fn apply_adjustment_leaves_accuracy_alone() {
        let mut p = DifficultyProfile::new("u1").with_skill_levels(SkillLevels::uniform(3));
        let outcome = p.apply_adjustment(AdjustmentDirection::Decrease, now());
        assert_eq!(outcome.current, DifficultyLevel::VeryBeginner);
        assert!(p.skill_levels().iter().all(|(_, l)| l == 2));
        assert_eq!(p.recent_accuracy(), 0.0);
        assert_eq!(p.recent_scores().count(), 0);
    }

    #[test]
    fn recommend_increase_on_strong_consistent_window() {
        let p = DifficultyProfile::new("u1");
        let rec = p.recommend(&snapshot(0.9, 0.8, Trend::Stable));
        assert_eq!(rec.direction, AdjustmentDirection::Increase);
        assert!((rec.confidence - 0.85).abs() < 1e-12);
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(rec.suggested, DifficultyLevel::Intermediate);
        assert_eq!(p.current_difficulty(), DifficultyLevel::Beginner);
    }

    #[test]
    fn recommend_decrease_on_low_success_or_decline() {
        let p = DifficultyProfile::new("u1");
        let low = p.recommend(&snapshot(0.1, 0.9, Trend::Stable));
        assert_eq!(low.direction, AdjustmentDirection::Decrease);
        assert_eq!(low.priority, Priority::High);

        let declining = p.recommend(&snapshot(0.6, 0.5, Trend::Declining));
        assert_eq!(declining.direction, AdjustmentDirection::Decrease);
        assert_eq!(declining.priority, Priority::Medium);
    }

    #[test]
    fn recommend_maintain_and_low_confidence_without_data() {
        let p = DifficultyProfile::new("u1");
        let rec = p.recommend(&snapshot(0.9, 0.5, Trend::InsufficientData));
        assert_eq!(rec.direction, AdjustmentDirection::Maintain);
        assert!((rec.confidence - 0.25).abs() < 1e-12);
        assert_eq!(rec.priority, Priority::Low);
    }

    #[test]
    fn direction_parse() {
        assert_eq!(
            "Increase".parse::<AdjustmentDirection>().unwrap(),
            AdjustmentDirection::Increase
        );
        assert!("sideways".parse::<AdjustmentDirection>().is_err());
    }
}
