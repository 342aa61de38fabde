use async_trait::async_trait;
use lingua_core::model::{
    LearnerId, LearnerProfile, Lesson, LessonFilter, LessonId, LessonProgress, Phrase, PhraseId,
    Question,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint or revision check rejected the write.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch a lesson by ID regardless of its status.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// List lessons matching `filter`, ordered by `order_index` then ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_lessons(&self, filter: &LessonFilter) -> Result<Vec<Lesson>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Insert a new record for its (learner, lesson) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the pair already has a record.
    async fn insert_progress(&self, progress: &LessonProgress)
    -> Result<LessonProgress, StorageError>;

    /// Overwrite the stored record if its revision still equals
    /// `progress.revision()`, returning the stored record with the bumped revision.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the revision moved on,
    /// `StorageError::NotFound` if there is no record to update.
    async fn update_progress(&self, progress: &LessonProgress)
    -> Result<LessonProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_progress(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError>;
}

#[async_trait]
pub trait LearnerProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_profile(&self, learner_id: LearnerId)
    -> Result<Option<LearnerProfile>, StorageError>;

    /// Creates or overwrites a profile unconditionally. The stored
    /// revision is bumped when a row already exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError>;

    /// Writes `profile` only if the stored revision still equals
    /// `profile.revision()`, returning the stored copy with the bumped revision.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a stale revision and
    /// `StorageError::NotFound` if the profile does not exist.
    async fn update_profile(&self, profile: &LearnerProfile)
    -> Result<LearnerProfile, StorageError>;
}

#[async_trait]
pub trait PhraseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the phrase cannot be stored.
    async fn upsert_phrase(&self, phrase: &Phrase) -> Result<(), StorageError>;

    /// Phrases of a lesson ordered by `order_index` then ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn phrases_for_lesson(&self, lesson_id: LessonId) -> Result<Vec<Phrase>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_phrase(&self, id: PhraseId) -> Result<Option<Phrase>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Questions of a lesson ordered by `order_index` then ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn questions_for_lesson(&self, lesson_id: LessonId)
    -> Result<Vec<Question>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    lessons: HashMap<LessonId, Lesson>,
    progress: HashMap<(LearnerId, LessonId), LessonProgress>,
    profiles: HashMap<LearnerId, LearnerProfile>,
    phrases: HashMap<PhraseId, Phrase>,
    questions: Vec<Question>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        self.lock()?.lessons.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, filter: &LessonFilter) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        let mut lessons: Vec<Lesson> = guard
            .lessons
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order_index(), l.id()));
        Ok(lessons)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        Ok(self.lock()?.progress.get(&(learner_id, lesson_id)).cloned())
    }

    async fn insert_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let mut guard = self.lock()?;
        let key = (progress.learner_id(), progress.lesson_id());
        if guard.progress.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        let stored = progress.clone().with_revision(0);
        guard.progress.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let mut guard = self.lock()?;
        let key = (progress.learner_id(), progress.lesson_id());
        let current = guard.progress.get(&key).ok_or(StorageError::NotFound)?;
        if current.revision() != progress.revision() {
            return Err(StorageError::Conflict);
        }
        let stored = progress
            .clone()
            .with_revision(progress.revision().wrapping_add(1));
        guard.progress.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_progress(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(lesson_ids
            .iter()
            .filter_map(|id| guard.progress.get(&(learner_id, *id)).cloned())
            .collect())
    }
}

#[async_trait]
impl LearnerProfileRepository for InMemoryRepository {
    async fn get_profile(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<LearnerProfile>, StorageError> {
        Ok(self.lock()?.profiles.get(&learner_id).cloned())
    }

    async fn upsert_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let revision = guard
            .profiles
            .get(&profile.learner_id())
            .map_or(0, |current| current.revision().wrapping_add(1));
        guard
            .profiles
            .insert(profile.learner_id(), profile.clone().with_revision(revision));
        Ok(())
    }

    async fn update_profile(
        &self,
        profile: &LearnerProfile,
    ) -> Result<LearnerProfile, StorageError> {
        let mut guard = self.lock()?;
        let current = guard
            .profiles
            .get(&profile.learner_id())
            .ok_or(StorageError::NotFound)?;
        if current.revision() != profile.revision() {
            return Err(StorageError::Conflict);
        }
        let stored = profile
            .clone()
            .with_revision(profile.revision().wrapping_add(1));
        guard.profiles.insert(profile.learner_id(), stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl PhraseRepository for InMemoryRepository {
    async fn upsert_phrase(&self, phrase: &Phrase) -> Result<(), StorageError> {
        self.lock()?.phrases.insert(phrase.id, phrase.clone());
        Ok(())
    }

    async fn phrases_for_lesson(&self, lesson_id: LessonId) -> Result<Vec<Phrase>, StorageError> {
        let guard = self.lock()?;
        let mut phrases: Vec<Phrase> = guard
            .phrases
            .values()
            .filter(|p| p.lesson_id == lesson_id)
            .cloned()
            .collect();
        phrases.sort_by_key(|p| (p.order_index, p.id));
        Ok(phrases)
    }

    async fn get_phrase(&self, id: PhraseId) -> Result<Option<Phrase>, StorageError> {
        Ok(self.lock()?.phrases.get(&id).cloned())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if let Some(idx) = guard.questions.iter().position(|q| q.id == question.id) {
            guard.questions[idx] = question.clone();
        } else {
            guard.questions.push(question.clone());
        }
        Ok(())
    }

    async fn questions_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut questions: Vec<Question> = guard
            .questions
            .iter()
            .filter(|q| q.lesson_id == lesson_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order_index, q.id));
        Ok(questions)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Bundles every repository behind trait objects so backends can be swapped.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub profiles: Arc<dyn LearnerProfileRepository>,
    pub phrases: Arc<dyn PhraseRepository>,
    pub questions: Arc<dyn QuestionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Uses one repository value for every contract.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: LessonRepository
            + ProgressRepository
            + LearnerProfileRepository
            + PhraseRepository
            + QuestionRepository
            + Clone
            + 'static,
    {
        Self {
            lessons: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            phrases: Arc::new(repo.clone()),
            questions: Arc::new(repo),
        }
    }
}
