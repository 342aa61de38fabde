#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod exercises;
pub mod lessons;

pub use lingua_core::Clock;

pub use app_services::AppServices;
pub use catalog::{LearnerCatalogService, LessonSummary, ProfileOverview};
pub use error::{AppServicesError, LessonFlowError};
pub use exercises::{ExerciseFlowService, PracticeItem, ReviewItem, VocabularyItem};
pub use lessons::{
    LessonCompletion, LessonProgressEngine, LessonStepsView, StepCompletion, StepView,
};
