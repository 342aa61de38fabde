use std::sync::Arc;

use rand::rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::debug;

use lingua_core::model::{
    FallbackPhrase, LessonId, Phrase, PhraseId, Question, QuestionId, QuestionKind, ReviewData,
    ReviewExercise, build_review_fallback,
};
use storage::repository::{LessonRepository, PhraseRepository, QuestionRepository, Storage};

use crate::error::LessonFlowError;

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItem {
    pub phrase_id: PhraseId,
    pub text: String,
    pub translation: String,
    pub audio_url: Option<String>,
}

impl From<Phrase> for VocabularyItem {
    fn from(phrase: Phrase) -> Self {
        Self {
            phrase_id: phrase.id,
            text: phrase.text,
            translation: phrase.translation,
            audio_url: phrase.audio_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeItem {
    pub question_id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: Option<String>,
}

impl From<Question> for PracticeItem {
    fn from(question: Question) -> Self {
        Self {
            question_id: question.id,
            kind: question.kind,
            prompt: question.prompt,
            options: question.options,
            answer: question.answer,
        }
    }
}

/// A scramble exercise plus the order its word tiles are dealt in.
///
/// `tiles` holds indices into `exercise.words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub question_id: Option<QuestionId>,
    #[serde(flatten)]
    pub exercise: ReviewExercise,
    pub tiles: Vec<usize>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Builds the content shown inside each lesson step.
#[derive(Clone)]
pub struct ExerciseFlowService {
    lessons: Arc<dyn LessonRepository>,
    phrases: Arc<dyn PhraseRepository>,
    questions: Arc<dyn QuestionRepository>,
    shuffle_tiles: bool,
}

impl ExerciseFlowService {
    #[must_use]
    pub fn new(
        lessons: Arc<dyn LessonRepository>,
        phrases: Arc<dyn PhraseRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            lessons,
            phrases,
            questions,
            shuffle_tiles: false,
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.phrases),
            Arc::clone(&storage.questions),
        )
    }

    /// Enable or disable shuffling of review word tiles.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle_tiles = shuffle;
        self
    }

    async fn ensure_published(&self, lesson_id: LessonId) -> Result<(), LessonFlowError> {
        match self.lessons.get_lesson(lesson_id).await? {
            Some(lesson) if lesson.is_published() => Ok(()),
            _ => Err(LessonFlowError::LessonNotFound),
        }
    }

    /// Phrases taught by the lesson, in lesson order.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::LessonNotFound` for a missing or unpublished lesson.
    pub async fn vocabulary(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<VocabularyItem>, LessonFlowError> {
        self.ensure_published(lesson_id).await?;
        let phrases = self.phrases.phrases_for_lesson(lesson_id).await?;
        Ok(phrases.into_iter().map(VocabularyItem::from).collect())
    }

    /// Every non-review question of the lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::LessonNotFound` for a missing or unpublished lesson.
    pub async fn practice(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<PracticeItem>, LessonFlowError> {
        self.ensure_published(lesson_id).await?;
        let questions = self.questions.questions_for_lesson(lesson_id).await?;
        Ok(questions
            .into_iter()
            .filter(|q| !q.kind.is_review())
            .map(PracticeItem::from)
            .collect())
    }

    /// Sentence-scramble exercises for the review step.
    ///
    /// Each review question is repaired against its linked phrase, or the
    /// lesson's first phrase when it has none. A lesson without review
    /// questions gets one exercise per multi-word phrase. Exercises left
    /// with no words are dropped.
    ///
    /// # Errors
    ///
    /// Returns `LessonFlowError::LessonNotFound` for a missing or unpublished lesson.
    pub async fn review(&self, lesson_id: LessonId) -> Result<Vec<ReviewItem>, LessonFlowError> {
        self.ensure_published(lesson_id).await?;
        let phrases = self.phrases.phrases_for_lesson(lesson_id).await?;
        let review_questions: Vec<Question> = self
            .questions
            .questions_for_lesson(lesson_id)
            .await?
            .into_iter()
            .filter(|q| q.kind.is_review())
            .collect();

        let mut items = Vec::new();
        if review_questions.is_empty() {
            for phrase in phrases.iter().filter(|p| p.word_count() > 1) {
                let exercise = build_review_fallback(&ReviewData::default(), &fallback(phrase));
                items.push(self.deal(None, exercise));
            }
        } else {
            for question in &review_questions {
                let linked = self.linked_phrase(question, &phrases).await?;
                let source = linked.as_ref().or_else(|| phrases.first());
                let data = question.review_data.clone().unwrap_or_default();
                let exercise =
                    build_review_fallback(&data, &source.map(fallback).unwrap_or_default());
                if exercise.is_empty() {
                    debug!(question_id = %question.id, "review question has no usable words");
                    continue;
                }
                items.push(self.deal(Some(question.id), exercise));
            }
        }
        Ok(items)
    }

    async fn linked_phrase(
        &self,
        question: &Question,
        lesson_phrases: &[Phrase],
    ) -> Result<Option<Phrase>, LessonFlowError> {
        let Some(phrase_id) = question.phrase_id else {
            return Ok(None);
        };
        if let Some(phrase) = lesson_phrases.iter().find(|p| p.id == phrase_id) {
            return Ok(Some(phrase.clone()));
        }
        Ok(self.phrases.get_phrase(phrase_id).await?)
    }

    fn deal(&self, question_id: Option<QuestionId>, exercise: ReviewExercise) -> ReviewItem {
        let mut tiles: Vec<usize> = (0..exercise.words.len()).collect();
        if self.shuffle_tiles {
            tiles.shuffle(&mut rng());
        }
        ReviewItem {
            question_id,
            exercise,
            tiles,
        }
    }
}

fn fallback(phrase: &Phrase) -> FallbackPhrase<'_> {
    FallbackPhrase {
        text: &phrase.text,
        translation: &phrase.translation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::model::{Lesson, LessonStatus};
    use lingua_core::time::fixed_now;

    async fn lesson_with_phrases(storage: &Storage, status: LessonStatus) {
        let lesson = Lesson::new(LessonId::new(1), "Café", None, "es", status, 0, fixed_now())
            .unwrap();
        storage.lessons.upsert_lesson(&lesson).await.unwrap();
        let phrases = [
            (1, "Un café, por favor", "A coffee, please"),
            (2, "Gracias", "Thanks"),
        ];
        for (idx, (id, text, translation)) in phrases.into_iter().enumerate() {
            let phrase = Phrase::new(
                PhraseId::new(id),
                LessonId::new(1),
                text,
                translation,
                u32::try_from(idx).unwrap(),
            )
            .unwrap();
            storage.phrases.upsert_phrase(&phrase).await.unwrap();
        }
    }

    #[tokio::test]
    async fn review_falls_back_to_multi_word_phrases() {
        let storage = Storage::in_memory();
        lesson_with_phrases(&storage, LessonStatus::Published).await;
        let service = ExerciseFlowService::from_storage(&storage);

        let items = service.review(LessonId::new(1)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].question_id, None);
        assert_eq!(items[0].exercise.words, ["Un", "café,", "por", "favor"]);
        assert_eq!(items[0].exercise.meaning, "A coffee, please");
        assert_eq!(items[0].tiles, [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn review_question_repairs_from_linked_phrase() {
        let storage = Storage::in_memory();
        lesson_with_phrases(&storage, LessonStatus::Published).await;
        let broken = Question::new(
            QuestionId::new(5),
            LessonId::new(1),
            QuestionKind::SentenceOrder,
            "Put the words in order",
            0,
        )
        .unwrap()
        .with_phrase(PhraseId::new(1))
        .with_review_data(ReviewData {
            words: vec!["solo".into()],
            correct_order: Some(vec![3, 3, -1, 0]),
            ..ReviewData::default()
        });
        storage.questions.upsert_question(&broken).await.unwrap();

        let service = ExerciseFlowService::from_storage(&storage).with_shuffle(true);
        let items = service.review(LessonId::new(1)).await.unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.question_id, Some(QuestionId::new(5)));
        assert_eq!(item.exercise.sentence, "Un café, por favor");
        assert_eq!(item.exercise.correct_order, [0, 1, 2, 3]);

        let mut tiles = item.tiles.clone();
        tiles.sort_unstable();
        assert_eq!(tiles, [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn practice_excludes_review_questions() {
        let storage = Storage::in_memory();
        lesson_with_phrases(&storage, LessonStatus::Published).await;
        let translate = Question::new(
            QuestionId::new(1),
            LessonId::new(1),
            QuestionKind::Translate,
            "Translate: Gracias",
            0,
        )
        .unwrap()
        .with_options(vec!["Thanks".into(), "Hello".into()], "Thanks");
        let order = Question::new(
            QuestionId::new(2),
            LessonId::new(1),
            QuestionKind::SentenceOrder,
            "Order",
            1,
        )
        .unwrap();
        storage.questions.upsert_question(&translate).await.unwrap();
        storage.questions.upsert_question(&order).await.unwrap();

        let service = ExerciseFlowService::from_storage(&storage);
        let practice = service.practice(LessonId::new(1)).await.unwrap();
        assert_eq!(practice.len(), 1);
        assert_eq!(practice[0].answer.as_deref(), Some("Thanks"));
        assert_eq!(service.vocabulary(LessonId::new(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn draft_lesson_content_is_hidden() {
        let storage = Storage::in_memory();
        lesson_with_phrases(&storage, LessonStatus::Draft).await;
        let service = ExerciseFlowService::from_storage(&storage);
        let err = service.vocabulary(LessonId::new(1)).await.unwrap_err();
        assert!(matches!(err, LessonFlowError::LessonNotFound));
    }
}
