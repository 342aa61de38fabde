use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{LessonId, PhraseId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("phrase text cannot be empty")]
    EmptyPhrase,

    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("unknown question kind: {0}")]
    UnknownKind(String),
}

//
// ─── PHRASE ────────────────────────────────────────────────────────────────────
//

/// A phrase taught by a lesson, with its translation and optional recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub id: PhraseId,
    pub lesson_id: LessonId,
    pub text: String,
    pub translation: String,
    pub audio_url: Option<String>,
    pub order_index: u32,
}

impl Phrase {
    /// # Errors
    ///
    /// Returns `ContentError::EmptyPhrase` if `text` is blank.
    pub fn new(
        id: PhraseId,
        lesson_id: LessonId,
        text: impl Into<String>,
        translation: impl Into<String>,
        order_index: u32,
    ) -> Result<Self, ContentError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ContentError::EmptyPhrase);
        }
        Ok(Self {
            id,
            lesson_id,
            text,
            translation: translation.into(),
            audio_url: None,
            order_index,
        })
    }

    #[must_use]
    pub fn with_audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    Translate,
    Listening,
    SentenceOrder,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::Translate => "translate",
            QuestionKind::Listening => "listening",
            QuestionKind::SentenceOrder => "sentence_order",
        }
    }

    /// Sentence-order questions feed the review step; the rest are practice.
    #[must_use]
    pub fn is_review(self) -> bool {
        self == QuestionKind::SentenceOrder
    }
}

impl FromStr for QuestionKind {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "translate" => Ok(Self::Translate),
            "listening" => Ok(Self::Listening),
            "sentence_order" => Ok(Self::SentenceOrder),
            other => Err(ContentError::UnknownKind(other.to_owned())),
        }
    }
}

/// Authored sentence-scramble data. Every field may be missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewData {
    pub sentence: Option<String>,
    pub words: Vec<String>,
    pub correct_order: Option<Vec<i64>>,
    pub meaning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub lesson_id: LessonId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub phrase_id: Option<PhraseId>,
    pub review_data: Option<ReviewData>,
    pub order_index: u32,
}

impl Question {
    /// # Errors
    ///
    /// Returns `ContentError::EmptyPrompt` if `prompt` is blank.
    pub fn new(
        id: QuestionId,
        lesson_id: LessonId,
        kind: QuestionKind,
        prompt: impl Into<String>,
        order_index: u32,
    ) -> Result<Self, ContentError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ContentError::EmptyPrompt);
        }
        Ok(Self {
            id,
            lesson_id,
            kind,
            prompt,
            options: Vec::new(),
            answer: None,
            phrase_id: None,
            review_data: None,
            order_index,
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<String>, answer: impl Into<String>) -> Self {
        self.options = options;
        self.answer = Some(answer.into());
        self
    }

    #[must_use]
    pub fn with_phrase(mut self, phrase_id: PhraseId) -> Self {
        self.phrase_id = Some(phrase_id);
        self
    }

    #[must_use]
    pub fn with_review_data(mut self, data: ReviewData) -> Self {
        self.review_data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_data_reads_camel_case_with_gaps() {
        let data: ReviewData =
            serde_json::from_str(r#"{"sentence":"hola amigo","correctOrder":[1,0]}"#).unwrap();
        assert_eq!(data.sentence.as_deref(), Some("hola amigo"));
        assert!(data.words.is_empty());
        assert_eq!(data.correct_order, Some(vec![1, 0]));
        assert_eq!(data.meaning, None);
    }

    #[test]
    fn only_sentence_order_is_review() {
        assert!(QuestionKind::SentenceOrder.is_review());
        assert!(!QuestionKind::Listening.is_review());
        assert_eq!(
            QuestionKind::SentenceOrder.as_str().parse::<QuestionKind>().unwrap(),
            QuestionKind::SentenceOrder
        );
    }

    #[test]
    fn phrase_counts_words() {
        let phrase = Phrase::new(PhraseId::new(1), LessonId::new(1), " buenos  días ", "good morning", 0)
            .unwrap();
        assert_eq!(phrase.word_count(), 2);
        assert!(Phrase::new(PhraseId::new(2), LessonId::new(1), "", "", 0).is_err());
    }
}
