mod content;
mod ids;
mod lesson;
mod profile;
mod progress;
mod review;
mod step;

pub use content::{ContentError, Phrase, Question, QuestionKind, ReviewData};
pub use ids::{LearnerId, LessonId, ParseIdError, PhraseId, QuestionId};
pub use lesson::{Lesson, LessonError, LessonFilter, LessonStatus};
pub use profile::{
    ACTIVITY_RETENTION_DAYS, DEFAULT_MINUTES_SPENT, DailyActivity, FIRST_STEP_ACHIEVEMENT,
    LearnerProfile, ProfileError,
};
pub use progress::{
    DEFAULT_LESSON_XP, LessonProgress, MergedStep, ProgressError, ProgressStatus, merge_steps,
    percent_for,
};
pub use review::{FallbackPhrase, ReviewExercise, build_review_fallback};
pub use step::{LESSON_STEPS, STEP_COUNT, StepDefinition, StepKey, StepProgress, StepStatus};
