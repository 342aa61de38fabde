use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use lingua_core::Clock;
use lingua_core::model::{
    DailyActivity, LearnerId, LearnerProfile, LessonFilter, LessonId, LessonProgress,
    ProgressStatus,
};
use storage::repository::{
    LearnerProfileRepository, LessonRepository, ProgressRepository, Storage,
};

use crate::error::LessonFlowError;

/// A published lesson as it appears in the learner's course list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub lesson_id: LessonId,
    pub title: String,
    pub description: Option<String>,
    pub order_index: u32,
    pub status: ProgressStatus,
    pub progress_percent: u8,
    pub xp_earned: u32,
}

/// Learner totals for a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverview {
    pub learner_id: LearnerId,
    pub current_language: String,
    pub total_xp: u64,
    pub completed_lessons_count: u32,
    pub streak_days: u32,
    pub weekly_activity: Vec<DailyActivity>,
    pub achievements: Vec<String>,
}

impl ProfileOverview {
    fn new(profile: &LearnerProfile, clock: Clock) -> Self {
        Self {
            learner_id: profile.learner_id(),
            current_language: profile.current_language().to_owned(),
            total_xp: profile.total_xp(),
            completed_lessons_count: profile.completed_lessons_count(),
            streak_days: profile.current_streak_days(clock.today()),
            weekly_activity: profile.weekly_activity().to_vec(),
            achievements: profile.achievements().to_vec(),
        }
    }
}

/// Read side of the course: what a learner can study and how far they got.
#[derive(Clone)]
pub struct LearnerCatalogService {
    clock: Clock,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
    profiles: Arc<dyn LearnerProfileRepository>,
}

impl LearnerCatalogService {
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

    async fn profile(&self, learner_id: LearnerId) -> Result<LearnerProfile, LessonFlowError> {
        self.profiles
            .get_profile(learner_id)
            .await?
            .ok_or(LessonFlowError::ProfileNotFound)
    }

    /// Published lessons in the learner's current language, in course order.
    ///
    /// Lessons the learner has never opened show as `not_started` at 0%.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::ProfileNotFound` if the learner has no
    /// profile, or `LessonFlowError::Storage` if storage fails.
    pub async fn list_lessons(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<LessonSummary>, LessonFlowError> {
        let profile = self.profile(learner_id).await?;
        let lessons = self
            .lessons
            .list_lessons(&LessonFilter::published_in(profile.current_language()))
            .await?;

        let ids: Vec<LessonId> = lessons.iter().map(|l| l.id()).collect();
        let mut saved: HashMap<LessonId, LessonProgress> = self
            .progress
            .list_progress(learner_id, &ids)
            .await?
            .into_iter()
            .map(|p| (p.lesson_id(), p))
            .collect();
        debug!(learner_id = %learner_id, lessons = lessons.len(), tracked = saved.len(), "catalog loaded");

        Ok(lessons
            .into_iter()
            .map(|lesson| {
                let progress = saved.remove(&lesson.id());
                LessonSummary {
                    lesson_id: lesson.id(),
                    title: lesson.title().to_owned(),
                    description: lesson.description().map(str::to_owned),
                    order_index: lesson.order_index(),
                    status: progress
                        .as_ref()
                        .map_or(ProgressStatus::NotStarted, LessonProgress::status),
                    progress_percent: progress.as_ref().map_or(0, LessonProgress::progress_percent),
                    xp_earned: progress.as_ref().map_or(0, LessonProgress::xp_earned),
                }
            })
            .collect())
    }

    /// The first lesson in course order the learner has not completed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_lessons`].
    pub async fn next_lesson(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<LessonSummary>, LessonFlowError> {
        Ok(self
            .list_lessons(learner_id)
            .await?
            .into_iter()
            .find(|summary| summary.status != ProgressStatus::Completed))
    }

    /// # Errors
    ///
    /// Returns `LessonFlowError::ProfileNotFound` if the learner has no profile.
    pub async fn profile_overview(
        &self,
        learner_id: LearnerId,
    ) -> Result<ProfileOverview, LessonFlowError> {
        let profile = self.profile(learner_id).await?;
        Ok(ProfileOverview::new(&profile, self.clock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::model::{Lesson, LessonStatus};
    use lingua_core::time::{fixed_clock, fixed_now};

    async fn seed(storage: &Storage) {
        let lessons = [
            (1, "Numbers", "es", LessonStatus::Published, 2),
            (2, "Greetings", "es", LessonStatus::Published, 1),
            (3, "Colours", "es", LessonStatus::Draft, 0),
            (4, "Bonjour", "fr", LessonStatus::Published, 0),
        ];
        for (id, title, lang, status, order) in lessons {
            let lesson =
                Lesson::new(LessonId::new(id), title, None, lang, status, order, fixed_now())
                    .unwrap();
            storage.lessons.upsert_lesson(&lesson).await.unwrap();
        }
        storage
            .profiles
            .upsert_profile(&LearnerProfile::new(LearnerId::new(1), "es").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn lists_published_lessons_in_profile_language() {
        let storage = Storage::in_memory();
        seed(&storage).await;
        let mut progress = LessonProgress::new(LearnerId::new(1), LessonId::new(2));
        progress.complete_all(Some(40), fixed_now());
        storage.progress.insert_progress(&progress).await.unwrap();

        let catalog = LearnerCatalogService::from_storage(fixed_clock(), &storage);
        let lessons = catalog.list_lessons(LearnerId::new(1)).await.unwrap();

        let titles: Vec<&str> = lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["Greetings", "Numbers"]);
        assert_eq!(lessons[0].status, ProgressStatus::Completed);
        assert_eq!(lessons[0].xp_earned, 40);
        assert_eq!(lessons[1].status, ProgressStatus::NotStarted);
        assert_eq!(lessons[1].progress_percent, 0);

        let next = catalog.next_lesson(LearnerId::new(1)).await.unwrap().unwrap();
        assert_eq!(next.lesson_id, LessonId::new(1));
    }

    #[tokio::test]
    async fn catalog_requires_a_profile() {
        let storage = Storage::in_memory();
        seed(&storage).await;
        let catalog = LearnerCatalogService::from_storage(fixed_clock(), &storage);
        let err = catalog.list_lessons(LearnerId::new(2)).await.unwrap_err();
        assert!(matches!(err, LessonFlowError::ProfileNotFound));
        let err = catalog.profile_overview(LearnerId::new(2)).await.unwrap_err();
        assert_eq!(err.code(), "profile_not_found");
    }
}
