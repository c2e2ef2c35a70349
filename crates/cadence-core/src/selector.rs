//! Next-challenge selection.

use serde::{Deserialize, Serialize};

use crate::model::{ChallengeType, SkillDimension};
use crate::profile::DifficultyProfile;
use crate::statistics::mean;

/// Coding skill below which learners get quizzes only.
pub const QUIZ_ONLY_BELOW: u8 = 3;
/// Recent average above which coding challenges are offered.
pub const CODING_ABOVE: f64 = 0.8;
/// Recent average below which scenarios are offered.
pub const SCENARIO_BELOW: f64 = 0.4;

/// What kind of challenge to request next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextChallenge {
    pub challenge_type: ChallengeType,
    /// Weakest dimension first.
    pub targeted_dimensions: Vec<SkillDimension>,
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeSelector;

impl ChallengeSelector {
    pub fn new() -> Self {
        Self
    }

    pub fn recommend(&self, profile: &DifficultyProfile) -> NextChallenge {
        let challenge_type = if profile.skill_level(SkillDimension::CodingSkill) < QUIZ_ONLY_BELOW {
            ChallengeType::Quiz
        } else {
            let recent = recent_performance(profile);
            if recent > CODING_ABOVE {
                ChallengeType::Coding
            } else if recent < SCENARIO_BELOW {
                ChallengeType::Scenario
            } else {
                ChallengeType::Debug
            }
        };

        NextChallenge {
            challenge_type,
            targeted_dimensions: weakest_first(profile),
        }
    }
}

/// Mean of the last scores, or the accuracy EWMA before any attempt.
pub fn recent_performance(profile: &DifficultyProfile) -> f64 {
    let scores: Vec<f64> = profile.recent_scores().collect();
    mean(&scores).unwrap_or_else(|| profile.recent_accuracy())
}

/// Dimensions sorted by level ascending. The sort is stable over
/// [`SkillDimension::ALL`], which fixes the order of ties.
pub fn weakest_first(profile: &DifficultyProfile) -> Vec<SkillDimension> {
    let mut dims = SkillDimension::ALL.to_vec();
    dims.sort_by_key(|d| profile.skill_level(*d));
    dims
}
