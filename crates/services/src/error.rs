//! Shared error types for the services crate.

use thiserror::Error;

use lingua_core::model::{ProgressError, StepKey};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Expected outcomes of the learner lesson flow, plus storage failures.
///
/// The first four variants are business outcomes the caller branches on;
/// `code()` gives their stable wire tokens.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonFlowError {
    #[error("lesson not found")]
    LessonNotFound,
    #[error("invalid step key: {0}")]
    InvalidStepKey(String),
    #[error("step {0} is missing from the progress record")]
    StepNotFound(StepKey),
    #[error("learner profile not found")]
    ProfileNotFound,
    #[error("progress record changed concurrently {attempts} times in a row")]
    Contended { attempts: u32 },
    #[error(transparent)]
    Progress(ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LessonFlowError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            LessonFlowError::LessonNotFound => "lesson_not_found",
            LessonFlowError::InvalidStepKey(_) => "invalid_step_key",
            LessonFlowError::StepNotFound(_) => "step_not_found",
            LessonFlowError::ProfileNotFound => "profile_not_found",
            LessonFlowError::Contended { .. } => "conflict",
            LessonFlowError::Progress(_) => "invalid_progress",
            LessonFlowError::Storage(_) => "storage_error",
        }
    }
}

impl From<ProgressError> for LessonFlowError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::InvalidStepKey(key) => LessonFlowError::InvalidStepKey(key),
            ProgressError::StepNotFound(key) => LessonFlowError::StepNotFound(key),
            other => LessonFlowError::Progress(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
