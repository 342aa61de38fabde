use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use lingua_core::Clock;
use lingua_core::model::{LearnerId, Lesson, LessonId, LessonProgress, StepKey};
use storage::repository::{
    LearnerProfileRepository, LessonRepository, ProgressRepository, Storage, StorageError,
};

use super::view::{LessonCompletion, LessonStepsView, StepCompletion, step_views};
use crate::error::LessonFlowError;

/// Attempts made at a read-modify-write before giving up on a busy record.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Tracks each learner's passage through the four lesson steps.
///
/// Every write is a read-modify-write against a revisioned record; when
/// another writer got there first the whole cycle is replayed on the fresh
/// record, so concurrent completions merge instead of overwriting.
#[derive(Clone)]
pub struct LessonProgressEngine {
    clock: Clock,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
    profiles: Arc<dyn LearnerProfileRepository>,
}

impl LessonProgressEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
        profiles: Arc<dyn LearnerProfileRepository>,
    ) -> Self {
        Self {
            clock,
            lessons,
            progress,
            profiles,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.profiles),
        )
    }

    /// Loads a lesson a learner is allowed to work on.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::LessonNotFound` when the lesson is absent
    /// or not published.
    pub async fn published_lesson(&self, lesson_id: LessonId) -> Result<Lesson, LessonFlowError> {
        match self.lessons.get_lesson(lesson_id).await? {
            Some(lesson) if lesson.is_published() => Ok(lesson),
            Some(_) => {
                debug!(lesson_id = %lesson_id, "lesson exists but is not published");
                Err(LessonFlowError::LessonNotFound)
            }
            None => Err(LessonFlowError::LessonNotFound),
        }
    }

    /// Returns the learner's record for `lesson`, creating a fresh one if needed.
    ///
    /// Two callers racing to create the same record both end up with the
    /// single stored row.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::Storage` if storage fails.
    pub async fn ensure_progress(
        &self,
        learner_id: LearnerId,
        lesson: &Lesson,
    ) -> Result<LessonProgress, LessonFlowError> {
        if let Some(existing) = self.progress.find_progress(learner_id, lesson.id()).await? {
            return Ok(existing);
        }

        let fresh = LessonProgress::new(learner_id, lesson.id());
        match self.progress.insert_progress(&fresh).await {
            Ok(created) => {
                debug!(learner_id = %learner_id, lesson_id = %lesson.id(), "progress record created");
                Ok(created)
            }
            Err(StorageError::Conflict) => {
                debug!(learner_id = %learner_id, lesson_id = %lesson.id(), "progress created concurrently; re-reading");
                self.progress
                    .find_progress(learner_id, lesson.id())
                    .await?
                    .ok_or_else(|| LessonFlowError::Storage(StorageError::NotFound))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Lists the four steps of a lesson with the learner's state merged in.
    ///
    /// Viewing a lesson starts tracking it, so a record is created on first view.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::LessonNotFound` for a missing or unpublished
    /// lesson, or `LessonFlowError::Storage` if storage fails.
    pub async fn get_lesson_steps(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<LessonStepsView, LessonFlowError> {
        let lesson = self.published_lesson(lesson_id).await?;
        let progress = self.ensure_progress(learner_id, &lesson).await?;
        Ok(LessonStepsView {
            lesson_id,
            steps: step_views(&progress),
            progress_percent: progress.progress_percent(),
        })
    }

    /// Marks one step completed and unlocks the next one.
    ///
    /// A `score` of `None` or zero keeps whatever score was saved before.
    ///
    /// # Errors
    ///
    /// Checked in order: `LessonNotFound`, `InvalidStepKey`, `StepNotFound`.
    /// `Contended` if the record kept changing underneath every attempt.
    pub async fn complete_step(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        step_key: &str,
        score: Option<u32>,
    ) -> Result<StepCompletion, LessonFlowError> {
        let lesson = self.published_lesson(lesson_id).await?;
        let key: StepKey = step_key.parse()?;
        let now = self.clock.now();

        let (saved, ()) = self
            .update_with_retry(learner_id, &lesson, |progress| {
                progress.complete_step(key, score, now)?;
                Ok(())
            })
            .await?;

        info!(
            learner_id = %learner_id,
            lesson_id = %lesson_id,
            step = key.as_str(),
            percent = saved.progress_percent(),
            "step completed"
        );
        Ok(StepCompletion::from_progress(&saved))
    }

    /// Completes every step of a lesson at once and credits the learner.
    ///
    /// The profile is credited only on the call that moves the lesson into
    /// `completed`; repeats return the stored result without touching it.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` for a missing or unpublished lesson,
    /// `Contended` if the record kept changing, or `Storage`.
    pub async fn complete_lesson(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        xp: Option<u32>,
        minutes_spent: Option<u32>,
    ) -> Result<LessonCompletion, LessonFlowError> {
        let lesson = self.published_lesson(lesson_id).await?;
        let now = self.clock.now();

        let (saved, first_completion) = self
            .update_with_retry(learner_id, &lesson, |progress| {
                Ok(progress.complete_all(xp, now))
            })
            .await?;

        if first_completion {
            self.credit_profile(learner_id, saved.xp_earned(), minutes_spent, now)
                .await?;
            info!(
                learner_id = %learner_id,
                lesson_id = %lesson_id,
                xp = saved.xp_earned(),
                "lesson completed"
            );
        } else {
            debug!(learner_id = %learner_id, lesson_id = %lesson_id, "lesson already completed");
        }

        Ok(LessonCompletion::from_progress(&saved))
    }

    async fn update_with_retry<T, F>(
        &self,
        learner_id: LearnerId,
        lesson: &Lesson,
        mut apply: F,
    ) -> Result<(LessonProgress, T), LessonFlowError>
    where
        F: FnMut(&mut LessonProgress) -> Result<T, LessonFlowError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut progress = self.ensure_progress(learner_id, lesson).await?;
            let outcome = apply(&mut progress)?;
            match self.progress.update_progress(&progress).await {
                Ok(saved) => return Ok((saved, outcome)),
                Err(StorageError::Conflict) => {
                    warn!(
                        learner_id = %learner_id,
                        lesson_id = %lesson.id(),
                        attempt,
                        "progress changed concurrently; retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LessonFlowError::Contended {
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn credit_profile(
        &self,
        learner_id: LearnerId,
        xp: u32,
        minutes_spent: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), LessonFlowError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(mut profile) = self.profiles.get_profile(learner_id).await? else {
                warn!(learner_id = %learner_id, "no learner profile; skipping xp credit");
                return Ok(());
            };
            profile.record_lesson_completion(xp, minutes_spent, now);
            match self.profiles.update_profile(&profile).await {
                Ok(saved) => {
                    info!(
                        learner_id = %learner_id,
                        total_xp = saved.total_xp(),
                        lessons = saved.completed_lessons_count(),
                        "profile credited"
                    );
                    return Ok(());
                }
                Err(StorageError::Conflict) => {
                    warn!(learner_id = %learner_id, attempt, "profile changed concurrently; retrying");
                }
                Err(StorageError::NotFound) => {
                    warn!(learner_id = %learner_id, "profile removed before credit; skipping");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LessonFlowError::Contended {
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::model::{LearnerProfile, LessonStatus, ProgressStatus, StepStatus};
    use lingua_core::time::{fixed_clock, fixed_now};

    async fn setup(status: LessonStatus) -> (LessonProgressEngine, Storage) {
        let storage = Storage::in_memory();
        let lesson = Lesson::new(
            LessonId::new(1),
            "Greetings",
            None,
            "es",
            status,
            0,
            fixed_now(),
        )
        .unwrap();
        storage.lessons.upsert_lesson(&lesson).await.unwrap();
        (LessonProgressEngine::from_storage(fixed_clock(), &storage), storage)
    }

    #[tokio::test]
    async fn first_view_creates_one_record() {
        let (engine, storage) = setup(LessonStatus::Published).await;
        let learner = LearnerId::new(7);

        let view = engine.get_lesson_steps(learner, LessonId::new(1)).await.unwrap();
        assert_eq!(view.progress_percent, 0);
        assert_eq!(view.steps.len(), 4);
        assert_eq!(view.steps[3].status, StepStatus::Locked);

        engine.get_lesson_steps(learner, LessonId::new(1)).await.unwrap();
        let listed = storage
            .progress
            .list_progress(learner, &[LessonId::new(1)])
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status(), ProgressStatus::NotStarted);
    }

    #[tokio::test]
    async fn unpublished_lessons_are_hidden() {
        let (engine, _storage) = setup(LessonStatus::Draft).await;
        let err = engine
            .get_lesson_steps(LearnerId::new(1), LessonId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LessonFlowError::LessonNotFound));

        let err = engine
            .complete_step(LearnerId::new(1), LessonId::new(1), "grammar", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LessonFlowError::LessonNotFound));
    }

    #[tokio::test]
    async fn unknown_step_key_is_rejected_without_writing() {
        let (engine, storage) = setup(LessonStatus::Published).await;
        let err = engine
            .complete_step(LearnerId::new(1), LessonId::new(1), "grammar", Some(10))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_step_key");
        let found = storage
            .progress
            .find_progress(LearnerId::new(1), LessonId::new(1))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn completing_listening_unlocks_review() {
        let (engine, _storage) = setup(LessonStatus::Published).await;
        let learner = LearnerId::new(1);
        let done = engine
            .complete_step(learner, LessonId::new(1), "listening", Some(70))
            .await
            .unwrap();
        assert_eq!(done.progress_percent, 25);
        assert_eq!(done.status, ProgressStatus::InProgress);
        assert_eq!(done.steps[2].status, StepStatus::Completed);
        assert_eq!(done.steps[3].status, StepStatus::Available);
    }

    #[tokio::test]
    async fn second_lesson_completion_does_not_credit_twice() {
        let (engine, storage) = setup(LessonStatus::Published).await;
        let learner = LearnerId::new(3);
        storage
            .profiles
            .upsert_profile(&LearnerProfile::new(learner, "es").unwrap())
            .await
            .unwrap();

        let first = engine
            .complete_lesson(learner, LessonId::new(1), Some(80), Some(15))
            .await
            .unwrap();
        let again = engine
            .complete_lesson(learner, LessonId::new(1), Some(20), None)
            .await
            .unwrap();
        assert_eq!(first.xp_earned, 80);
        assert_eq!(again.xp_earned, 80);

        let profile = storage.profiles.get_profile(learner).await.unwrap().unwrap();
        assert_eq!(profile.total_xp(), 80);
        assert_eq!(profile.completed_lessons_count(), 1);
        assert_eq!(profile.weekly_activity()[0].minutes, 15);
    }

    #[tokio::test]
    async fn missing_profile_does_not_block_completion() {
        let (engine, _storage) = setup(LessonStatus::Published).await;
        let done = engine
            .complete_lesson(LearnerId::new(9), LessonId::new(1), None, None)
            .await
            .unwrap();
        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.xp_earned, 50);
    }
}
