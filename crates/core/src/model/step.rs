use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::progress::ProgressError;

//
// ─── STEP KEY ──────────────────────────────────────────────────────────────────
//

/// One of the four fixed stages every lesson is studied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    Vocabulary,
    Practice,
    Listening,
    Review,
}

impl StepKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StepKey::Vocabulary => "vocabulary",
            StepKey::Practice => "practice",
            StepKey::Listening => "listening",
            StepKey::Review => "review",
        }
    }

    /// Position of this step in `LESSON_STEPS`.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            StepKey::Vocabulary => 0,
            StepKey::Practice => 1,
            StepKey::Listening => 2,
            StepKey::Review => 3,
        }
    }

    #[must_use]
    pub fn definition(self) -> &'static StepDefinition {
        &LESSON_STEPS[self.index()]
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKey {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LESSON_STEPS
            .iter()
            .map(|def| def.key)
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ProgressError::InvalidStepKey(s.to_owned()))
    }
}

//
// ─── STEP STATUS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Locked,
    Available,
    Completed,
}

impl StepStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Locked => "locked",
            StepStatus::Available => "available",
            StepStatus::Completed => "completed",
        }
    }
}

//
// ─── STEP TABLE ────────────────────────────────────────────────────────────────
//

/// Static description of a lesson step, shared by progress seeding and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub key: StepKey,
    pub title: &'static str,
    pub description: &'static str,
    pub route: &'static str,
}

impl StepDefinition {
    /// Status a step starts in before the learner has done anything.
    #[must_use]
    pub fn initial_status(&self) -> StepStatus {
        if self.key == StepKey::Review {
            StepStatus::Locked
        } else {
            StepStatus::Available
        }
    }
}

pub const STEP_COUNT: usize = 4;

pub const LESSON_STEPS: [StepDefinition; STEP_COUNT] = [
    StepDefinition {
        key: StepKey::Vocabulary,
        title: "Vocabulary",
        description: "Learn the new words and phrases of this lesson.",
        route: "vocabulary",
    },
    StepDefinition {
        key: StepKey::Practice,
        title: "Practice",
        description: "Check yourself with short exercises.",
        route: "practice",
    },
    StepDefinition {
        key: StepKey::Listening,
        title: "Listening",
        description: "Recognise the phrases by ear.",
        route: "listening",
    },
    StepDefinition {
        key: StepKey::Review,
        title: "Review",
        description: "Put the sentences back together.",
        route: "review",
    },
];

//
// ─── STEP PROGRESS ─────────────────────────────────────────────────────────────
//

/// Saved state of one step for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub step_key: StepKey,
    pub status: StepStatus,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepProgress {
    #[must_use]
    pub fn initial(def: &StepDefinition) -> Self {
        Self {
            step_key: def.key,
            status: def.initial_status(),
            score: 0,
            completed_at: None,
        }
    }

    /// One record per step, in table order, each in its initial state.
    #[must_use]
    pub fn initial_set() -> Vec<Self> {
        LESSON_STEPS.iter().map(Self::initial).collect()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_key_index() {
        for (i, def) in LESSON_STEPS.iter().enumerate() {
            assert_eq!(def.key.index(), i);
            assert_eq!(def.key.definition(), def);
        }
    }

    #[test]
    fn only_review_starts_locked() {
        let steps = StepProgress::initial_set();
        let statuses: Vec<_> = steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Available,
                StepStatus::Available,
                StepStatus::Available,
                StepStatus::Locked,
            ]
        );
        assert!(steps.iter().all(|s| s.score == 0 && s.completed_at.is_none()));
    }

    #[test]
    fn step_key_parses_known_keys_only() {
        assert_eq!("listening".parse::<StepKey>().unwrap(), StepKey::Listening);
        let err = "grammar".parse::<StepKey>().unwrap_err();
        assert_eq!(err, ProgressError::InvalidStepKey("grammar".into()));
    }

    #[test]
    fn step_progress_tolerates_missing_optional_fields() {
        let step: StepProgress =
            serde_json::from_str(r#"{"step_key":"practice","status":"available"}"#).unwrap();
        assert_eq!(step.step_key, StepKey::Practice);
        assert_eq!(step.score, 0);
        assert_eq!(step.completed_at, None);
    }
}
