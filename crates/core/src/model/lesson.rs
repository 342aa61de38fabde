use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson language cannot be empty")]
    EmptyLanguage,

    #[error("unknown lesson status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Editorial state of a lesson. Only `Published` lessons are visible to learners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Draft,
    Published,
    Archived,
}

impl LessonStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::Draft => "draft",
            LessonStatus::Published => "published",
            LessonStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(LessonError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A lesson as learners see it: a titled unit of content in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    title: String,
    description: Option<String>,
    language: String,
    status: LessonStatus,
    order_index: u32,
    created_at: DateTime<Utc>,
}

impl Lesson {
    /// Creates a lesson after validating title and language.
    ///
    /// The language code is trimmed and lowercased.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` or `LessonError::EmptyLanguage`.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        description: Option<String>,
        language: impl Into<String>,
        status: LessonStatus,
        order_index: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        let language = language.into().trim().to_lowercase();
        if language.is_empty() {
            return Err(LessonError::EmptyLanguage);
        }
        let description = description.filter(|d| !d.trim().is_empty());

        Ok(Self {
            id,
            title,
            description,
            language,
            status,
            order_index,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn status(&self) -> LessonStatus {
        self.status
    }

    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == LessonStatus::Published
    }
}

/// Listing filter for lessons. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonFilter {
    pub status: Option<LessonStatus>,
    pub language: Option<String>,
}

impl LessonFilter {
    /// Published lessons in one language, the learner-facing catalog.
    #[must_use]
    pub fn published_in(language: impl Into<String>) -> Self {
        Self {
            status: Some(LessonStatus::Published),
            language: Some(language.into().trim().to_lowercase()),
        }
    }

    #[must_use]
    pub fn matches(&self, lesson: &Lesson) -> bool {
        self.status.is_none_or(|s| s == lesson.status())
            && self
                .language
                .as_deref()
                .is_none_or(|l| l == lesson.language())
    }
}
