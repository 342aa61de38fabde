use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{LearnerId, LessonId};
use crate::model::step::{
    LESSON_STEPS, STEP_COUNT, StepDefinition, StepKey, StepProgress, StepStatus,
};

/// XP granted for finishing a lesson when the caller does not name an amount.
pub const DEFAULT_LESSON_XP: u32 = 50;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("invalid step key: {0}")]
    InvalidStepKey(String),

    #[error("step {0} is missing from the progress record")]
    StepNotFound(StepKey),

    #[error("unknown progress status: {0}")]
    UnknownStatus(String),

    #[error("progress percent must be within 0..=100, got {0}")]
    InvalidPercent(u8),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a learner's work on one lesson.
///
/// `NotStarted -> InProgress -> Completed`; nothing moves a lesson back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

/// `round(completed / STEP_COUNT * 100)`, capped at 100.
#[must_use]
pub fn percent_for(completed: usize) -> u8 {
    let rounded = (completed * 200 + STEP_COUNT) / (2 * STEP_COUNT);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

//
// ─── MERGED VIEW ───────────────────────────────────────────────────────────────
//

/// A step definition joined with whatever the learner has saved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedStep {
    pub definition: &'static StepDefinition,
    pub status: StepStatus,
    pub score: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Joins saved step records onto the static table.
///
/// Keys with no saved record fall back to their initial status.
#[must_use]
pub fn merge_steps(saved: &[StepProgress]) -> Vec<MergedStep> {
    LESSON_STEPS
        .iter()
        .map(|def| match saved.iter().find(|s| s.step_key == def.key) {
            Some(step) => MergedStep {
                definition: def,
                status: step.status,
                score: step.score,
                completed_at: step.completed_at,
            },
            None => MergedStep {
                definition: def,
                status: def.initial_status(),
                score: 0,
                completed_at: None,
            },
        })
        .collect()
}

//
// ─── LESSON PROGRESS ───────────────────────────────────────────────────────────
//

/// Progress of one learner through one lesson.
///
/// `revision` is bumped by storage on every write and is used to reject
/// stale read-modify-write updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    learner_id: LearnerId,
    lesson_id: LessonId,
    status: ProgressStatus,
    progress_percent: u8,
    steps: Vec<StepProgress>,
    xp_earned: u32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    revision: u32,
}

impl LessonProgress {
    /// Fresh record: nothing done, every step in its initial lock state.
    #[must_use]
    pub fn new(learner_id: LearnerId, lesson_id: LessonId) -> Self {
        Self {
            learner_id,
            lesson_id,
            status: ProgressStatus::NotStarted,
            progress_percent: 0,
            steps: StepProgress::initial_set(),
            xp_earned: 0,
            started_at: None,
            completed_at: None,
            revision: 0,
        }
    }

    /// Rehydrate a record from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidPercent` if the stored percent exceeds 100.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        learner_id: LearnerId,
        lesson_id: LessonId,
        status: ProgressStatus,
        progress_percent: u8,
        steps: Vec<StepProgress>,
        xp_earned: u32,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        revision: u32,
    ) -> Result<Self, ProgressError> {
        if progress_percent > 100 {
            return Err(ProgressError::InvalidPercent(progress_percent));
        }
        Ok(Self {
            learner_id,
            lesson_id,
            status,
            progress_percent,
            steps,
            xp_earned,
            started_at,
            completed_at,
            revision,
        })
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    #[must_use]
    pub fn steps(&self) -> &[StepProgress] {
        &self.steps
    }

    #[must_use]
    pub fn xp_earned(&self) -> u32 {
        self.xp_earned
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    #[must_use]
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    #[must_use]
    pub fn step(&self, key: StepKey) -> Option<&StepProgress> {
        self.steps.iter().find(|s| s.step_key == key)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_completed()).count()
    }

    #[must_use]
    pub fn merged_steps(&self) -> Vec<MergedStep> {
        merge_steps(&self.steps)
    }

    /// Marks one step completed and unlocks the step right after it.
    ///
    /// A non-zero `score` replaces the saved one; otherwise the saved score
    /// is kept. Unlocking is purely positional: whichever record follows the
    /// completed one goes from `Locked` to `Available`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StepNotFound` if the record has no entry for `key`.
    pub fn complete_step(
        &mut self,
        key: StepKey,
        score: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), ProgressError> {
        let idx = self
            .steps
            .iter()
            .position(|s| s.step_key == key)
            .ok_or(ProgressError::StepNotFound(key))?;

        let step = &mut self.steps[idx];
        step.status = StepStatus::Completed;
        if let Some(score) = score.filter(|s| *s > 0) {
            step.score = score;
        }
        step.completed_at = Some(now);

        if let Some(next) = self.steps.get_mut(idx + 1) {
            if next.status == StepStatus::Locked {
                next.status = StepStatus::Available;
            }
        }

        self.progress_percent = percent_for(self.completed_count());
        self.status = if self.progress_percent >= 100 {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };
        self.stamp(now);
        Ok(())
    }

    /// Completes every step at once, bypassing the sequential unlock.
    ///
    /// XP never decreases: the record keeps the larger of what it had and
    /// `xp` (or `DEFAULT_LESSON_XP` when `xp` is absent or zero).
    /// Steps that already carry a `completed_at` keep it; only unstamped
    /// steps and the record itself are stamped with `now`.
    ///
    /// Returns `true` if the lesson was not completed before this call.
    pub fn complete_all(&mut self, xp: Option<u32>, now: DateTime<Utc>) -> bool {
        let was_completed = self.is_completed();

        let mut steps: Vec<StepProgress> = LESSON_STEPS
            .iter()
            .map(|def| {
                self.step(def.key)
                    .cloned()
                    .unwrap_or_else(|| StepProgress::initial(def))
            })
            .collect();
        for step in &mut steps {
            step.status = StepStatus::Completed;
            step.completed_at.get_or_insert(now);
        }
        self.steps = steps;

        let awarded = xp.filter(|x| *x > 0).unwrap_or(DEFAULT_LESSON_XP);
        self.xp_earned = self.xp_earned.max(awarded);
        self.progress_percent = 100;
        self.status = ProgressStatus::Completed;
        self.stamp(now);

        !was_completed
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.started_at.get_or_insert(now);
        if self.is_completed() {
            self.completed_at.get_or_insert(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn fresh() -> LessonProgress {
        LessonProgress::new(LearnerId::new(1), LessonId::new(1))
    }

    fn status_of(progress: &LessonProgress, key: StepKey) -> StepStatus {
        progress.step(key).unwrap().status
    }

    #[test]
    fn fresh_record_is_not_started() {
        let progress = fresh();
        assert_eq!(progress.status(), ProgressStatus::NotStarted);
        assert_eq!(progress.progress_percent(), 0);
        assert_eq!(progress.steps().len(), STEP_COUNT);
        assert_eq!(status_of(&progress, StepKey::Review), StepStatus::Locked);
        assert_eq!(progress.started_at(), None);
    }

    #[test]
    fn percent_rounds_per_completed_step() {
        let expected = [0, 25, 50, 75, 100];
        for (k, pct) in expected.iter().enumerate() {
            assert_eq!(percent_for(k), *pct);
        }
        assert_eq!(percent_for(9), 100);
    }

    #[test]
    fn completing_listening_unlocks_review() {
        let mut progress = fresh();
        progress
            .complete_step(StepKey::Listening, None, fixed_now())
            .unwrap();
        assert_eq!(status_of(&progress, StepKey::Review), StepStatus::Available);
        assert_eq!(progress.progress_percent(), 25);
        assert_eq!(progress.status(), ProgressStatus::InProgress);
    }

    #[test]
    fn completing_vocabulary_leaves_review_locked() {
        let mut progress = fresh();
        progress
            .complete_step(StepKey::Vocabulary, Some(90), fixed_now())
            .unwrap();
        assert_eq!(status_of(&progress, StepKey::Practice), StepStatus::Available);
        assert_eq!(status_of(&progress, StepKey::Review), StepStatus::Locked);
        assert_eq!(progress.step(StepKey::Vocabulary).unwrap().score, 90);
        assert_eq!(progress.started_at(), Some(fixed_now()));
        assert_eq!(progress.completed_at(), None);
    }

    #[test]
    fn zero_or_missing_score_keeps_previous_score() {
        let mut progress = fresh();
        let now = fixed_now();
        progress.complete_step(StepKey::Practice, Some(70), now).unwrap();
        progress.complete_step(StepKey::Practice, Some(0), now).unwrap();
        assert_eq!(progress.step(StepKey::Practice).unwrap().score, 70);
        progress.complete_step(StepKey::Practice, None, now).unwrap();
        assert_eq!(progress.step(StepKey::Practice).unwrap().score, 70);
        assert_eq!(progress.progress_percent(), 25);
    }

    #[test]
    fn all_four_steps_complete_the_lesson() {
        let mut progress = fresh();
        let start = fixed_now();
        let mut now = start;
        for def in &LESSON_STEPS {
            progress.complete_step(def.key, None, now).unwrap();
            now += Duration::minutes(5);
        }
        assert_eq!(progress.status(), ProgressStatus::Completed);
        assert_eq!(progress.progress_percent(), 100);
        assert_eq!(progress.started_at(), Some(start));
        assert_eq!(progress.completed_at(), Some(start + Duration::minutes(15)));
    }

    #[test]
    fn missing_step_record_is_reported() {
        let mut progress = LessonProgress::from_persisted(
            LearnerId::new(1),
            LessonId::new(1),
            ProgressStatus::NotStarted,
            0,
            vec![StepProgress::initial(&LESSON_STEPS[0])],
            0,
            None,
            None,
            3,
        )
        .unwrap();
        let err = progress
            .complete_step(StepKey::Review, None, fixed_now())
            .unwrap_err();
        assert_eq!(err, ProgressError::StepNotFound(StepKey::Review));
    }

    #[test]
    fn complete_all_is_monotonic_in_xp() {
        let mut progress = fresh();
        assert!(progress.complete_all(Some(80), fixed_now()));
        assert!(!progress.complete_all(Some(30), fixed_now()));
        assert_eq!(progress.xp_earned(), 80);
    }

    #[test]
    fn complete_all_defaults_xp_and_fills_every_step() {
        let mut progress = fresh();
        progress
            .complete_step(StepKey::Vocabulary, Some(60), fixed_now())
            .unwrap();
        let later = fixed_now() + Duration::hours(1);
        assert!(progress.complete_all(Some(0), later));

        assert_eq!(progress.xp_earned(), DEFAULT_LESSON_XP);
        assert_eq!(progress.progress_percent(), 100);
        assert!(progress.steps().iter().all(StepProgress::is_completed));
        let vocab = progress.step(StepKey::Vocabulary).unwrap();
        assert_eq!(vocab.score, 60);
        assert_eq!(vocab.completed_at, Some(fixed_now()));
        assert_eq!(progress.started_at(), Some(fixed_now()));
        assert_eq!(progress.completed_at(), Some(later));
    }

    #[test]
    fn repeated_complete_all_keeps_existing_timestamps() {
        let mut progress = fresh();
        let first = fixed_now();
        assert!(progress.complete_all(None, first));

        let again = first + Duration::days(2);
        assert!(!progress.complete_all(Some(70), again));

        assert!(progress
            .steps()
            .iter()
            .all(|s| s.completed_at == Some(first)));
        assert_eq!(progress.started_at(), Some(first));
        assert_eq!(progress.completed_at(), Some(first));
        assert_eq!(progress.xp_earned(), 70);
        assert_eq!(progress.status(), ProgressStatus::Completed);
    }

    #[test]
    fn complete_all_repairs_missing_step_records() {
        let mut progress = LessonProgress::from_persisted(
            LearnerId::new(1),
            LessonId::new(1),
            ProgressStatus::InProgress,
            25,
            vec![StepProgress::initial(&LESSON_STEPS[2])],
            0,
            None,
            None,
            0,
        )
        .unwrap();
        progress.complete_all(None, fixed_now());
        let keys: Vec<_> = progress.steps().iter().map(|s| s.step_key).collect();
        assert_eq!(keys, LESSON_STEPS.iter().map(|d| d.key).collect::<Vec<_>>());
    }

    #[test]
    fn merge_falls_back_to_initial_status() {
        let saved = vec![StepProgress {
            step_key: StepKey::Practice,
            status: StepStatus::Completed,
            score: 40,
            completed_at: Some(fixed_now()),
        }];
        let merged = merge_steps(&saved);
        assert_eq!(merged.len(), STEP_COUNT);
        assert_eq!(merged[0].status, StepStatus::Available);
        assert_eq!(merged[1].status, StepStatus::Completed);
        assert_eq!(merged[1].score, 40);
        assert_eq!(merged[3].status, StepStatus::Locked);
        assert_eq!(merged[3].definition.title, "Review");
    }

    #[test]
    fn persisted_percent_is_bounded() {
        let err = LessonProgress::from_persisted(
            LearnerId::new(1),
            LessonId::new(1),
            ProgressStatus::Completed,
            101,
            Vec::new(),
            0,
            None,
            None,
            0,
        )
        .unwrap_err();
        assert_eq!(err, ProgressError::InvalidPercent(101));
    }
}
