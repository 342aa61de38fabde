use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;

use lingua_core::model::{
    LearnerId, LearnerProfile, Lesson, LessonId, LessonProgress, LessonStatus, ProgressStatus,
    StepKey, StepStatus,
};
use lingua_core::time::fixed_now;
use services::{Clock, LessonFlowError, LessonProgressEngine};
use storage::repository::{
    InMemoryRepository, LearnerProfileRepository, LessonRepository, ProgressRepository,
    StorageError,
};

const LEARNER: LearnerId = LearnerId::new(1);

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    let lessons = [
        (1, "Greetings", LessonStatus::Published),
        (2, "At the café", LessonStatus::Published),
        (3, "Numbers", LessonStatus::Draft),
    ];
    for (id, title, status) in lessons {
        let lesson = Lesson::new(
            LessonId::new(id),
            title,
            None,
            "es",
            status,
            u32::try_from(id).unwrap(),
            fixed_now(),
        )
        .unwrap();
        repo.upsert_lesson(&lesson).await.unwrap();
    }
    repo.upsert_profile(&LearnerProfile::new(LEARNER, "es").unwrap())
        .await
        .unwrap();
    repo
}

fn engine_over(repo: &InMemoryRepository) -> LessonProgressEngine {
    LessonProgressEngine::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

#[tokio::test]
async fn vocabulary_completion_matches_wire_shape() {
    let repo = seeded_repo().await;
    let engine = engine_over(&repo);

    let done = engine
        .complete_step(LEARNER, LessonId::new(1), "vocabulary", Some(90))
        .await
        .unwrap();
    let value = serde_json::to_value(&done).unwrap();

    assert_eq!(value["progressPercent"], json!(25));
    assert_eq!(value["status"], json!("in_progress"));
    let steps: Vec<(String, String)> = value["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| {
            (
                s["key"].as_str().unwrap().to_owned(),
                s["status"].as_str().unwrap().to_owned(),
            )
        })
        .collect();
    assert_eq!(
        steps,
        [
            ("vocabulary".to_owned(), "completed".to_owned()),
            ("practice".to_owned(), "available".to_owned()),
            ("listening".to_owned(), "available".to_owned()),
            ("review".to_owned(), "locked".to_owned()),
        ]
    );
    assert_eq!(value["steps"][0]["score"], json!(90));
}

#[tokio::test]
async fn percent_tracks_each_completed_step() {
    let repo = seeded_repo().await;
    let engine = engine_over(&repo);
    let mut seen = Vec::new();
    for key in ["vocabulary", "practice", "listening", "review"] {
        let done = engine
            .complete_step(LEARNER, LessonId::new(1), key, None)
            .await
            .unwrap();
        seen.push((done.progress_percent, done.status));
    }
    assert_eq!(
        seen,
        [
            (25, ProgressStatus::InProgress),
            (50, ProgressStatus::InProgress),
            (75, ProgressStatus::InProgress),
            (100, ProgressStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn draft_lessons_are_not_found_everywhere() {
    let repo = seeded_repo().await;
    let engine = engine_over(&repo);
    let draft = LessonId::new(3);

    let steps = engine.get_lesson_steps(LEARNER, draft).await.unwrap_err();
    let step = engine
        .complete_step(LEARNER, draft, "vocabulary", None)
        .await
        .unwrap_err();
    let lesson = engine
        .complete_lesson(LEARNER, draft, None, None)
        .await
        .unwrap_err();
    for err in [steps, step, lesson] {
        assert!(matches!(err, LessonFlowError::LessonNotFound));
    }
    assert!(repo.find_progress(LEARNER, draft).await.unwrap().is_none());
}

#[tokio::test]
async fn lesson_completion_is_credited_once_and_xp_never_drops() {
    let repo = seeded_repo().await;
    let engine = engine_over(&repo);

    let first = engine
        .complete_lesson(LEARNER, LessonId::new(1), Some(80), Some(12))
        .await
        .unwrap();
    let second = engine
        .complete_lesson(LEARNER, LessonId::new(1), Some(30), Some(12))
        .await
        .unwrap();
    assert_eq!(first.xp_earned, 80);
    assert_eq!(second.xp_earned, 80);
    assert_eq!(second.status, ProgressStatus::Completed);

    let profile = repo.get_profile(LEARNER).await.unwrap().unwrap();
    assert_eq!(profile.total_xp(), 80);
    assert_eq!(profile.completed_lessons_count(), 1);
    assert_eq!(profile.achievements(), ["First Step"]);
    assert_eq!(profile.weekly_activity().len(), 1);
    assert_eq!(profile.weekly_activity()[0].minutes, 12);
}

#[tokio::test]
async fn same_day_completions_share_one_activity_entry() {
    let repo = seeded_repo().await;
    let engine = engine_over(&repo);

    engine
        .complete_lesson(LEARNER, LessonId::new(1), None, Some(10))
        .await
        .unwrap();
    engine
        .complete_lesson(LEARNER, LessonId::new(2), None, None)
        .await
        .unwrap();

    let profile = repo.get_profile(LEARNER).await.unwrap().unwrap();
    assert_eq!(profile.total_xp(), 100);
    assert_eq!(profile.completed_lessons_count(), 2);
    assert_eq!(profile.weekly_activity().len(), 1);
    assert_eq!(profile.weekly_activity()[0].minutes, 20);
    assert_eq!(profile.current_streak_days(fixed_now().date_naive()), 1);
}

/// Progress store that lets a competing writer finish a step right before
/// the first update it sees.
#[derive(Clone)]
struct RacingProgress {
    inner: InMemoryRepository,
    raced: Arc<AtomicBool>,
    rival_step: StepKey,
}

#[async_trait]
impl ProgressRepository for RacingProgress {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        self.inner.find_progress(learner_id, lesson_id).await
    }

    async fn insert_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        self.inner.insert_progress(progress).await
    }

    async fn update_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let mut rival = self
                .inner
                .find_progress(progress.learner_id(), progress.lesson_id())
                .await?
                .ok_or(StorageError::NotFound)?;
            rival
                .complete_step(self.rival_step, Some(60), fixed_now())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.inner.update_progress(&rival).await?;
        }
        self.inner.update_progress(progress).await
    }

    async fn list_progress(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError> {
        self.inner.list_progress(learner_id, lesson_ids).await
    }
}

#[tokio::test]
async fn concurrent_step_completions_both_survive() {
    let repo = seeded_repo().await;
    let racing = RacingProgress {
        inner: repo.clone(),
        raced: Arc::new(AtomicBool::new(false)),
        rival_step: StepKey::Practice,
    };
    let engine = LessonProgressEngine::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(racing),
        Arc::new(repo.clone()),
    );

    let done = engine
        .complete_step(LEARNER, LessonId::new(1), "vocabulary", Some(90))
        .await
        .unwrap();

    assert_eq!(done.progress_percent, 50);
    assert_eq!(done.steps[0].status, StepStatus::Completed);
    assert_eq!(done.steps[0].score, 90);
    assert_eq!(done.steps[1].status, StepStatus::Completed);
    assert_eq!(done.steps[1].score, 60);
}

#[tokio::test]
async fn racing_lesson_completion_credits_profile_once() {
    let repo = seeded_repo().await;
    let racing = RacingProgress {
        inner: repo.clone(),
        raced: Arc::new(AtomicBool::new(false)),
        rival_step: StepKey::Review,
    };
    // The rival finishes the whole lesson first, so the retried write
    // sees an already completed record.
    let mut rival = LessonProgress::new(LEARNER, LessonId::new(1));
    rival.complete_step(StepKey::Vocabulary, None, fixed_now()).unwrap();
    rival.complete_step(StepKey::Practice, None, fixed_now()).unwrap();
    rival.complete_step(StepKey::Listening, None, fixed_now()).unwrap();
    repo.insert_progress(&rival).await.unwrap();

    let engine = LessonProgressEngine::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(racing),
        Arc::new(repo.clone()),
    );
    let done = engine
        .complete_lesson(LEARNER, LessonId::new(1), Some(70), None)
        .await
        .unwrap();

    assert_eq!(done.status, ProgressStatus::Completed);
    let profile = repo.get_profile(LEARNER).await.unwrap().unwrap();
    assert_eq!(profile.completed_lessons_count(), 0);
    assert_eq!(profile.total_xp(), 0);
}

/// Profile store that yields after every read, so concurrent credits
/// interleave between read and write.
#[derive(Clone)]
struct SlowProfiles {
    inner: InMemoryRepository,
}

#[async_trait]
impl LearnerProfileRepository for SlowProfiles {
    async fn get_profile(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<LearnerProfile>, StorageError> {
        let profile = self.inner.get_profile(learner_id).await?;
        tokio::task::yield_now().await;
        Ok(profile)
    }

    async fn upsert_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError> {
        self.inner.upsert_profile(profile).await
    }

    async fn update_profile(
        &self,
        profile: &LearnerProfile,
    ) -> Result<LearnerProfile, StorageError> {
        self.inner.update_profile(profile).await
    }
}

#[tokio::test]
async fn concurrent_lesson_completions_credit_both_lessons() {
    let repo = seeded_repo().await;
    let engine = LessonProgressEngine::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(SlowProfiles {
            inner: repo.clone(),
        }),
    );

    let (first, second) = tokio::join!(
        engine.complete_lesson(LEARNER, LessonId::new(1), None, None),
        engine.complete_lesson(LEARNER, LessonId::new(2), None, None),
    );
    first.unwrap();
    second.unwrap();

    let profile = repo.get_profile(LEARNER).await.unwrap().unwrap();
    assert_eq!(profile.total_xp(), 100);
    assert_eq!(profile.completed_lessons_count(), 2);
    assert_eq!(profile.weekly_activity()[0].minutes, 20);
}
