//! Challenge-type-keyed scoring functions.
//!
//! Each scorer maps raw responses to a score in `[0, 1]`. The registry picks
//! a scorer by [`ChallengeType`] and falls back to the general scorer for
//! types it does not know.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::model::{Challenge, ChallengeType, Response};

/// A pluggable scoring function.
pub trait Scorer: Send + Sync {
    /// Short name used in logs and results.
    fn name(&self) -> &str;

    /// Score the responses. Must return a value in `[0, 1]`.
    fn score(&self, challenge: &Challenge, responses: &[Response]) -> f64;
}

/// Fraction of responses matching their expected answer.
pub struct QuizScorer;

impl Scorer for QuizScorer {
    fn name(&self) -> &str {
        "quiz"
    }

    fn score(&self, challenge: &Challenge, responses: &[Response]) -> f64 {
        if responses.is_empty() {
            return 0.0;
        }
        let correct = responses
            .iter()
            .enumerate()
            .filter(|(i, r)| {
                let expected = r
                    .expected
                    .as_deref()
                    .or_else(|| challenge.answer_key.get(*i).map(String::as_str));
                expected.is_some_and(|e| normalize_answer(e) == normalize_answer(&r.answer))
            })
            .count();
        correct as f64 / responses.len() as f64
    }
}

/// Structural heuristic for submitted code, averaged over responses.
pub struct CodingScorer;

impl Scorer for CodingScorer {
    fn name(&self) -> &str {
        "coding"
    }

    fn score(&self, _challenge: &Challenge, responses: &[Response]) -> f64 {
        mean_code_score(responses)
    }
}

/// The coding heuristic, discounted to 0.9.
pub struct DebugScorer;

impl Scorer for DebugScorer {
    fn name(&self) -> &str {
        "debug"
    }

    fn score(&self, _challenge: &Challenge, responses: &[Response]) -> f64 {
        mean_code_score(responses) * DEBUG_DISCOUNT
    }
}

/// Fraction of meaningful responses plus a participation bonus.
///
/// Used for scenarios and as the fallback for anything unrecognized.
pub struct ParticipationScorer {
    name: &'static str,
}

impl ParticipationScorer {
    pub fn scenario() -> Self {
        Self { name: "scenario" }
    }

    pub fn general() -> Self {
        Self { name: "general" }
    }
}

impl Scorer for ParticipationScorer {
    fn name(&self) -> &str {
        self.name
    }

    fn score(&self, _challenge: &Challenge, responses: &[Response]) -> f64 {
        if responses.is_empty() {
            return 0.0;
        }
        let meaningful = responses
            .iter()
            .filter(|r| is_meaningful(&r.answer))
            .count();
        let bonus = if responses.iter().any(|r| !r.answer.trim().is_empty()) {
            PARTICIPATION_BONUS
        } else {
            0.0
        };
        (meaningful as f64 / responses.len() as f64 + bonus).min(1.0)
    }
}

const DEBUG_DISCOUNT: f64 = 0.9;
const PARTICIPATION_BONUS: f64 = 0.1;
const MEANINGFUL_MIN_CHARS: usize = 10;
const MEANINGFUL_MIN_WORDS: usize = 3;
const CODE_MIN_CHARS: usize = 20;

const DEFINITION_KEYWORDS: &[&str] = &[
    "def", "fn", "can", "walker", "node", "obj", "class", "function",
];
const CONTROL_KEYWORDS: &[&str] = &["return", "if", "for", "while", "match", "loop"];

/// Result of scoring an attempt through the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    /// Name of the scorer that produced `score`.
    pub scorer: String,
    /// Set when the requested type had no scorer and the general one was used.
    pub fallback: Option<ValidationError>,
}

/// Scorers keyed by challenge type.
#[derive(Clone)]
pub struct ScorerRegistry {
    scorers: HashMap<ChallengeType, Arc<dyn Scorer>>,
    general: Arc<dyn Scorer>,
}

impl Default for ScorerRegistry {
    fn default() -> Self {
        let mut scorers: HashMap<ChallengeType, Arc<dyn Scorer>> = HashMap::new();
        scorers.insert(ChallengeType::Quiz, Arc::new(QuizScorer));
        scorers.insert(ChallengeType::Coding, Arc::new(CodingScorer));
        scorers.insert(ChallengeType::Debug, Arc::new(DebugScorer));
        scorers.insert(
            ChallengeType::Scenario,
            Arc::new(ParticipationScorer::scenario()),
        );
        let general: Arc<dyn Scorer> = Arc::new(ParticipationScorer::general());
        scorers.insert(ChallengeType::General, Arc::clone(&general));
        Self { scorers, general }
    }
}

impl ScorerRegistry {
    /// Register or replace the scorer for a challenge type.
    pub fn register(&mut self, challenge_type: ChallengeType, scorer: Arc<dyn Scorer>) {
        self.scorers.insert(challenge_type, scorer);
    }

    /// Score responses with the scorer for the challenge's type.
    pub fn score(&self, challenge: &Challenge, responses: &[Response]) -> ScoreOutcome {
        let (scorer, fallback) = match self.scorers.get(&challenge.challenge_type) {
            Some(s) => (s, None),
            None => {
                tracing::warn!(
                    challenge_id = %challenge.id,
                    challenge_type = %challenge.challenge_type,
                    "no scorer for challenge type, using general scorer"
                );
                (
                    &self.general,
                    Some(ValidationError::UnknownChallengeType(
                        challenge.challenge_type.to_string(),
                    )),
                )
            }
        };
        let raw = scorer.score(challenge, responses);
        let score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };
        ScoreOutcome {
            score,
            scorer: scorer.name().to_string(),
            fallback,
        }
    }
}

fn normalize_answer(s: &str) -> String {
    s.trim().to_lowercase()
}

fn is_meaningful(answer: &str) -> bool {
    let chars = answer.chars().filter(|c| !c.is_whitespace()).count();
    chars >= MEANINGFUL_MIN_CHARS && answer.split_whitespace().count() >= MEANINGFUL_MIN_WORDS
}

fn mean_code_score(responses: &[Response]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    responses.iter().map(|r| code_structure_score(&r.answer)).sum::<f64>() / responses.len() as f64
}

/// Five equally weighted structural checks on a piece of code.
pub fn code_structure_score(code: &str) -> f64 {
    if code.trim().is_empty() {
        return 0.0;
    }
    let tokens: Vec<&str> = code
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();

    let checks = [
        true,
        code.chars().filter(|c| !c.is_whitespace()).count() >= CODE_MIN_CHARS,
        delimiters_balanced(code),
        tokens.iter().any(|t| DEFINITION_KEYWORDS.contains(t)),
        tokens.iter().any(|t| CONTROL_KEYWORDS.contains(t)),
    ];
    checks.iter().filter(|&&ok| ok).count() as f64 / checks.len() as f64
}

fn delimiters_balanced(code: &str) -> bool {
    let mut stack = Vec::new();
    for c in code.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}
