use serde::Serialize;

use lingua_core::model::{
    LessonId, LessonProgress, MergedStep, ProgressStatus, StepKey, StepStatus,
};

/// A lesson step ready for display: static text joined with saved state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub key: StepKey,
    pub title: &'static str,
    pub description: &'static str,
    pub route: &'static str,
    pub status: StepStatus,
    pub score: u32,
}

impl StepView {
    #[must_use]
    pub fn from_merged(step: &MergedStep) -> Self {
        Self {
            key: step.definition.key,
            title: step.definition.title,
            description: step.definition.description,
            route: step.definition.route,
            status: step.status,
            score: step.score,
        }
    }
}

#[must_use]
pub fn step_views(progress: &LessonProgress) -> Vec<StepView> {
    progress
        .merged_steps()
        .iter()
        .map(StepView::from_merged)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStepsView {
    pub lesson_id: LessonId,
    pub steps: Vec<StepView>,
    pub progress_percent: u8,
}

/// Returned by `complete_step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCompletion {
    pub progress_percent: u8,
    pub status: ProgressStatus,
    pub steps: Vec<StepView>,
}

impl StepCompletion {
    #[must_use]
    pub fn from_progress(progress: &LessonProgress) -> Self {
        Self {
            progress_percent: progress.progress_percent(),
            status: progress.status(),
            steps: step_views(progress),
        }
    }
}

/// Returned by `complete_lesson`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletion {
    pub lesson_id: LessonId,
    pub xp_earned: u32,
    pub progress_percent: u8,
    pub status: ProgressStatus,
}

impl LessonCompletion {
    #[must_use]
    pub fn from_progress(progress: &LessonProgress) -> Self {
        Self {
            lesson_id: progress.lesson_id(),
            xp_earned: progress.xp_earned(),
            progress_percent: progress.progress_percent(),
            status: progress.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::model::LearnerId;
    use lingua_core::time::fixed_now;
    use serde_json::json;

    #[test]
    fn step_completion_serializes_with_wire_names() {
        let mut progress = LessonProgress::new(LearnerId::new(1), LessonId::new(1));
        progress
            .complete_step(StepKey::Vocabulary, Some(90), fixed_now())
            .unwrap();
        let value = serde_json::to_value(StepCompletion::from_progress(&progress)).unwrap();

        assert_eq!(value["progressPercent"], json!(25));
        assert_eq!(value["status"], json!("in_progress"));
        assert_eq!(value["steps"][0]["key"], json!("vocabulary"));
        assert_eq!(value["steps"][0]["status"], json!("completed"));
        assert_eq!(value["steps"][0]["score"], json!(90));
        assert_eq!(value["steps"][3]["status"], json!("locked"));
        assert_eq!(value["steps"][3]["route"], json!("review"));
    }

    #[test]
    fn lesson_completion_carries_lesson_id() {
        let mut progress = LessonProgress::new(LearnerId::new(1), LessonId::new(12));
        progress.complete_all(None, fixed_now());
        let value = serde_json::to_value(LessonCompletion::from_progress(&progress)).unwrap();
        assert_eq!(
            value,
            json!({
                "lessonId": 12,
                "xpEarned": 50,
                "progressPercent": 100,
                "status": "completed",
            })
        );
    }
}
