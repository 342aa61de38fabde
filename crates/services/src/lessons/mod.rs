mod engine;
mod view;

// Public API of the lesson progress subsystem.
pub use crate::error::LessonFlowError;
pub use engine::{LessonProgressEngine, MAX_WRITE_ATTEMPTS};
pub use view::{LessonCompletion, LessonStepsView, StepCompletion, StepView, step_views};
