//! Full attempt-to-review flows against an in-memory repository.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use cadence_core::model::{
    Attempt, Challenge, ChallengeType, DifficultyLevel, ModuleEvent, RepetitionSession, Response,
    SessionStatus, SkillDimension,
};
use cadence_core::processor::SchedulingOutcome;
use cadence_core::profile::DifficultyProfile;
use cadence_core::traits::{AttemptHistory, Clock, FixedClock, ProfileRepository, SessionFilter};
use cadence_core::{AttemptInput, AttemptProcessor, EngineConfig, EngineError};

#[derive(Default)]
struct InMemory {
    profiles: Mutex<HashMap<String, DifficultyProfile>>,
    sessions: Mutex<HashMap<Uuid, RepetitionSession>>,
    attempts: Mutex<Vec<Attempt>>,
}

#[async_trait]
impl ProfileRepository for InMemory {
    async fn load_profile(&self, user_id: &str) -> Result<Option<DifficultyProfile>, EngineError> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn save_profile(&self, profile: &DifficultyProfile) -> Result<u64, EngineError> {
        let mut profiles = self.profiles.lock().unwrap();
        let found = profiles.get(profile.user_id()).map_or(0, |p| p.version());
        if found != profile.version() {
            return Err(EngineError::Conflict {
                user_id: profile.user_id().into(),
                expected: profile.version(),
                found,
            });
        }
        let mut stored = profile.clone();
        stored.set_version(found + 1);
        profiles.insert(profile.user_id().into(), stored);
        Ok(found + 1)
    }

    async fn load_sessions(
        &self,
        user_id: &str,
        filter: &SessionFilter,
    ) -> Result<Vec<RepetitionSession>, EngineError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && filter.matches(s))
            .cloned()
            .collect())
    }

    async fn load_session(&self, id: Uuid) -> Result<Option<RepetitionSession>, EngineError> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn save_session(&self, session: &RepetitionSession) -> Result<(), EngineError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn query_due_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RepetitionSession>, EngineError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                matches!(s.status, SessionStatus::Scheduled | SessionStatus::Delayed)
                    && s.scheduled_for <= now
            })
            .cloned()
            .collect())
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), EngineError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }
}

#[async_trait]
impl AttemptHistory for InMemory {
    async fn load_attempts(&self, user_id: &str, _: u32) -> Result<Vec<Attempt>, EngineError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn load_module_events(&self, _: &str, _: u32) -> Result<Vec<ModuleEvent>, EngineError> {
        Ok(vec![])
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
}

fn twenty_question_quiz() -> Challenge {
    let mut c = Challenge::new("quiz-20", ChallengeType::Quiz, DifficultyLevel::Beginner);
    c.answer_key = (0..20).map(|i| format!("a{i}")).collect();
    c.skill_dimensions_targeted = vec![SkillDimension::JacKnowledge];
    c
}

/// `correct` right answers out of twenty.
fn responses(correct: usize) -> Vec<Response> {
    (0..20)
        .map(|i| {
            if i < correct {
                Response::new(format!("A{i}"))
            } else {
                Response::new("wrong")
            }
        })
        .collect()
}

fn processor(repo: Arc<InMemory>, clock: Arc<FixedClock>) -> AttemptProcessor {
    AttemptProcessor::new(repo.clone(), repo, clock, EngineConfig::default())
}

#[tokio::test]
async fn five_attempts_match_hand_stepped_profile() {
    let repo = Arc::new(InMemory::default());
    let clock = Arc::new(FixedClock::new(start()));
    let processor = processor(repo.clone(), clock.clone());
    let challenge = twenty_question_quiz();

    // 0.9, 0.85, 0.3, 0.95, 0.8
    let mut challenge_state = challenge.clone();
    let mut scores = Vec::new();
    for correct in [18, 17, 6, 19, 16] {
        let result = processor
            .process(AttemptInput::new("learner", challenge_state.clone(), responses(correct)))
            .await
            .unwrap();
        challenge_state = result.updated_challenge.clone();
        scores.push(result.score);
        clock.advance(Duration::hours(1));
    }
    assert_eq!(scores, vec![0.9, 0.85, 0.3, 0.95, 0.8]);

    let mut accuracy = 0.0;
    let mut streak = 0;
    let mut level = 2i32;
    for s in &scores {
        if *s >= 0.8 {
            level = (level + 1).min(5);
        } else if *s <= 0.4 {
            level = (level - 1).max(1);
        }
        accuracy = accuracy * 0.7 + s * 0.3;
        streak = if *s >= 0.7 { streak + 1 } else { 0 };
    }

    let profile = processor.profile("learner").await.unwrap();
    assert_eq!(profile.success_streak(), streak);
    assert_eq!(profile.success_streak(), 2);
    assert!((profile.recent_accuracy() - accuracy).abs() < 1e-12);
    assert_eq!(i32::from(profile.current_difficulty().ordinal()), level);
    assert_eq!(profile.current_difficulty(), DifficultyLevel::Expert);
    for dim in SkillDimension::ALL {
        assert_eq!(profile.skill_level(dim), 4);
    }
    assert_eq!(profile.version(), 5);

    assert_eq!(challenge_state.total_attempts, 5);
    assert_eq!(challenge_state.successful_attempts, 4);

    let sessions = repo.sessions.lock().unwrap();
    assert_eq!(sessions.len(), 1, "one session per user and challenge");
    assert_eq!(
        sessions.values().next().map(|s| s.status),
        Some(SessionStatus::Ready)
    );
}

#[tokio::test]
async fn review_cycle_follows_sm2_intervals() {
    let repo = Arc::new(InMemory::default());
    let clock = Arc::new(FixedClock::new(start()));
    let processor = processor(repo.clone(), clock.clone());

    let result = processor
        .process(AttemptInput::new("learner", twenty_question_quiz(), responses(14)))
        .await
        .unwrap();
    let SchedulingOutcome::Created { session_id, scheduled_for } = result.scheduling else {
        panic!("expected a new session, got {:?}", result.scheduling);
    };
    assert_eq!(scheduled_for, start() + Duration::days(1));
    assert!(processor.due_reviews("learner").await.unwrap().is_empty());

    let mut expected_intervals = vec![1, 6, 15].into_iter();
    clock.set(scheduled_for);
    for _ in 0..3 {
        processor.sweep_due().await.unwrap();
        let due = processor.due_reviews("learner").await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, session_id);

        let next = processor.complete_review(session_id, 4).await.unwrap();
        let interval = expected_intervals.next().unwrap();
        assert_eq!(next, clock.now() + Duration::days(interval));
        clock.set(next);
    }

    // a lapse resets to stage one
    processor.sweep_due().await.unwrap();
    let next = processor.complete_review(session_id, 1).await.unwrap();
    assert_eq!(next, clock.now() + Duration::days(1));
    let session = repo.sessions.lock().unwrap()[&session_id].clone();
    assert_eq!(session.review_stage, 1);
    assert!(session.ease_factor >= 1.3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_attempts_for_one_user_are_serialized() {
    let repo = Arc::new(InMemory::default());
    let clock = Arc::new(FixedClock::new(start()));
    let processor = Arc::new(processor(repo.clone(), clock));

    let mut handles = Vec::new();
    for i in 0..12 {
        let processor = Arc::clone(&processor);
        let mut challenge = twenty_question_quiz();
        challenge.id = format!("quiz-{i}");
        handles.push(tokio::spawn(async move {
            processor
                .process(AttemptInput::new("busy", challenge, responses(15)))
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let profile = processor.profile("busy").await.unwrap();
    assert_eq!(profile.success_streak(), 12, "no update was lost");
    assert_eq!(profile.version(), 12);
    assert_eq!(repo.attempts.lock().unwrap().len(), 12);
    assert_eq!(repo.sessions.lock().unwrap().len(), 12);
}

#[tokio::test]
async fn batch_across_users_keeps_input_order() {
    let repo = Arc::new(InMemory::default());
    let clock = Arc::new(FixedClock::new(start()));
    let processor = processor(repo, clock);

    let inputs: Vec<AttemptInput> = (0..9)
        .map(|i| {
            AttemptInput::new(
                format!("user-{}", i % 3),
                twenty_question_quiz(),
                responses(if i % 2 == 0 { 20 } else { 2 }),
            )
        })
        .collect();
    let results = processor.process_batch(inputs).await;
    let scores: Vec<f64> = results.iter().map(|r| r.as_ref().unwrap().score).collect();
    assert_eq!(scores, vec![1.0, 0.1, 1.0, 0.1, 1.0, 0.1, 1.0, 0.1, 1.0]);
}
