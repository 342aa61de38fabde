use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LearnerId;

/// Badge granted on the first completed lesson.
pub const FIRST_STEP_ACHIEVEMENT: &str = "First Step";

/// Minutes credited for a lesson when the caller does not report time spent.
pub const DEFAULT_MINUTES_SPENT: u32 = 10;

/// Number of most recent calendar days kept in `weekly_activity`.
pub const ACTIVITY_RETENTION_DAYS: i64 = 14;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("current language cannot be empty")]
    EmptyLanguage,

    #[error("duplicate activity entry for {0}")]
    DuplicateActivityDay(NaiveDate),
}

/// Minutes studied on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub minutes: u32,
}

/// Gamification aggregate for one learner.
///
/// `revision` is bumped by storage on every write; credits are applied with
/// a conditional update against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerProfile {
    learner_id: LearnerId,
    current_language: String,
    total_xp: u64,
    completed_lessons_count: u32,
    weekly_activity: Vec<DailyActivity>,
    achievements: Vec<String>,
    last_active_at: Option<DateTime<Utc>>,
    revision: u32,
}

impl LearnerProfile {
    /// Creates an empty profile studying `current_language`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::EmptyLanguage` for a blank language code.
    pub fn new(
        learner_id: LearnerId,
        current_language: impl Into<String>,
    ) -> Result<Self, ProfileError> {
        Self::from_persisted(
            learner_id,
            current_language,
            0,
            0,
            Vec::new(),
            Vec::new(),
            None,
        )
    }

    /// Rehydrate a profile from storage. Activity is re-sorted by date.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` for a blank language or two entries for the same day.
    pub fn from_persisted(
        learner_id: LearnerId,
        current_language: impl Into<String>,
        total_xp: u64,
        completed_lessons_count: u32,
        mut weekly_activity: Vec<DailyActivity>,
        achievements: Vec<String>,
        last_active_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProfileError> {
        let current_language = current_language.into().trim().to_lowercase();
        if current_language.is_empty() {
            return Err(ProfileError::EmptyLanguage);
        }
        weekly_activity.sort_by_key(|a| a.date);
        if let Some(dup) = weekly_activity.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ProfileError::DuplicateActivityDay(dup[0].date));
        }

        Ok(Self {
            learner_id,
            current_language,
            total_xp,
            completed_lessons_count,
            weekly_activity,
            achievements,
            last_active_at,
            revision: 0,
        })
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn current_language(&self) -> &str {
        &self.current_language
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.total_xp
    }

    #[must_use]
    pub fn completed_lessons_count(&self) -> u32 {
        self.completed_lessons_count
    }

    #[must_use]
    pub fn weekly_activity(&self) -> &[DailyActivity] {
        &self.weekly_activity
    }

    #[must_use]
    pub fn achievements(&self) -> &[String] {
        &self.achievements
    }

    #[must_use]
    pub fn last_active_at(&self) -> Option<DateTime<Utc>> {
        self.last_active_at
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
    pub fn has_achievement(&self, name: &str) -> bool {
        self.achievements.iter().any(|a| a == name)
    }

    /// Credits a first-time lesson completion.
    ///
    /// Adds `xp` to the total, bumps the completed count, adds `minutes`
    /// (default `DEFAULT_MINUTES_SPENT`) to today's activity entry, grants
    /// `FIRST_STEP_ACHIEVEMENT` once and records `now` as last activity.
    pub fn record_lesson_completion(&mut self, xp: u32, minutes: Option<u32>, now: DateTime<Utc>) {
        self.total_xp = self.total_xp.saturating_add(u64::from(xp));
        self.completed_lessons_count = self.completed_lessons_count.saturating_add(1);

        let minutes = minutes.filter(|m| *m > 0).unwrap_or(DEFAULT_MINUTES_SPENT);
        self.add_activity(now.date_naive(), minutes);

        if !self.has_achievement(FIRST_STEP_ACHIEVEMENT) {
            self.achievements.push(FIRST_STEP_ACHIEVEMENT.to_owned());
        }
        self.last_active_at = Some(now);
    }

    fn add_activity(&mut self, today: NaiveDate, minutes: u32) {
        match self.weekly_activity.binary_search_by_key(&today, |a| a.date) {
            Ok(idx) => {
                let entry = &mut self.weekly_activity[idx];
                entry.minutes = entry.minutes.saturating_add(minutes);
            }
            Err(idx) => self
                .weekly_activity
                .insert(idx, DailyActivity { date: today, minutes }),
        }

        let cutoff = today - Duration::days(ACTIVITY_RETENTION_DAYS - 1);
        self.weekly_activity.retain(|a| a.date >= cutoff);
    }

    /// Consecutive active days ending today, or yesterday if today has no entry yet.
    #[must_use]
    pub fn current_streak_days(&self, today: NaiveDate) -> u32 {
        let mut expected = match self.weekly_activity.last() {
            Some(last) if last.date == today => today,
            Some(last) if Some(last.date) == today.pred_opt() => last.date,
            _ => return 0,
        };

        let mut streak = 0;
        for entry in self.weekly_activity.iter().rev() {
            if entry.date != expected {
                break;
            }
            streak += 1;
            match expected.pred_opt() {
                Some(prev) => expected = prev,
                None => break,
            }
        }
        streak
    }
}
