//! Template-based content generator.
//!
//! Fills a per-type text template with the requested difficulty and skill
//! targets. Stands in for an external generator in the CLI and in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cadence_core::model::ChallengeType;
use cadence_core::traits::{ChallengeContent, ContentGenerator, ContentRequest};

const DEFAULT_TEMPLATE: &str =
    "A {difficulty} {type} challenge focusing on {skills}.";

/// Produces challenge text from templates keyed by challenge type.
///
/// Templates may use `{type}`, `{difficulty}`, and `{skills}`.
pub struct TemplateContentGenerator {
    templates: HashMap<ChallengeType, String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ContentRequest>>,
}

impl Default for TemplateContentGenerator {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            ChallengeType::Quiz,
            "Answer a {difficulty} quiz on {skills}.".to_string(),
        );
        templates.insert(
            ChallengeType::Coding,
            "Write a {difficulty} program exercising {skills}.".to_string(),
        );
        templates.insert(
            ChallengeType::Debug,
            "Find and fix the bug in a {difficulty} snippet. Skills: {skills}.".to_string(),
        );
        templates.insert(
            ChallengeType::Scenario,
            "Talk through a {difficulty} design scenario involving {skills}.".to_string(),
        );
        Self::new(templates)
    }
}

impl TemplateContentGenerator {
    pub fn new(templates: HashMap<ChallengeType, String>) -> Self {
        Self {
            templates,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Number of requests served.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<ContentRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContentGenerator for TemplateContentGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, request: &ContentRequest) -> anyhow::Result<ChallengeContent> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        let skills = if request.skill_dimensions.is_empty() {
            "general skills".to_string()
        } else {
            request
                .skill_dimensions
                .iter()
                .map(|d| d.as_str().replace('_', " "))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let difficulty = request.difficulty_level.to_string().replace('_', " ");
        let template = self
            .templates
            .get(&request.challenge_type)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TEMPLATE);

        let body = template
            .replace("{type}", request.challenge_type.as_str())
            .replace("{difficulty}", &difficulty)
            .replace("{skills}", &skills);
        let title = format!("{} ({})", request.challenge_type, difficulty);

        Ok(ChallengeContent { title, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::model::{DifficultyLevel, SkillDimension};

    fn request(t: ChallengeType, dims: Vec<SkillDimension>) -> ContentRequest {
        ContentRequest {
            user_id: "u1".into(),
            challenge_type: t,
            skill_dimensions: dims,
            difficulty_level: DifficultyLevel::VeryBeginner,
        }
    }

    #[tokio::test]
    async fn fills_type_template() {
        let generator = TemplateContentGenerator::default();
        let content = generator
            .generate(&request(
                ChallengeType::Coding,
                vec![SkillDimension::CodingSkill, SkillDimension::JacKnowledge],
            ))
            .await
            .unwrap();
        assert_eq!(content.title, "coding (very beginner)");
        assert_eq!(
            content.body,
            "Write a very beginner program exercising coding skill, jac knowledge."
        );
        assert_eq!(generator.call_count(), 1);
        assert_eq!(
            generator.last_request().unwrap().challenge_type,
            ChallengeType::Coding
        );
    }

    #[tokio::test]
    async fn unknown_type_uses_default_template() {
        let generator = TemplateContentGenerator::new(HashMap::new());
        let content = generator
            .generate(&request(ChallengeType::General, vec![]))
            .await
            .unwrap();
        assert_eq!(
            content.body,
            "A very beginner general challenge focusing on general skills."
        );
    }
}
