use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::content::ReviewData;

/// Text a review exercise falls back to when its authored data is incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackPhrase<'a> {
    pub text: &'a str,
    pub translation: &'a str,
}

/// A sentence-scramble exercise: put `words` back into `correct_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewExercise {
    pub sentence: String,
    pub meaning: String,
    pub words: Vec<String>,
    pub correct_order: Vec<usize>,
}

impl ReviewExercise {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builds a scramble exercise from possibly malformed authored data.
///
/// Sentence and meaning come from `data` when present, else from `phrase`.
/// Authored words are used only when there are at least two of them.
/// An authored order is kept only if it is a permutation of the word
/// indices; anything else becomes the identity order.
#[must_use]
pub fn build_review_fallback(data: &ReviewData, phrase: &FallbackPhrase<'_>) -> ReviewExercise {
    let sentence = non_blank(data.sentence.as_deref())
        .unwrap_or(phrase.text)
        .trim()
        .to_owned();
    let meaning = non_blank(data.meaning.as_deref())
        .unwrap_or(phrase.translation)
        .trim()
        .to_owned();

    let words: Vec<String> = if data.words.len() > 1 {
        data.words.clone()
    } else {
        sentence.split_whitespace().map(str::to_owned).collect()
    };

    let correct_order = data
        .correct_order
        .as_deref()
        .and_then(|order| validated_order(order, words.len()))
        .unwrap_or_else(|| (0..words.len()).collect());

    ReviewExercise {
        sentence,
        meaning,
        words,
        correct_order,
    }
}

fn validated_order(order: &[i64], word_count: usize) -> Option<Vec<usize>> {
    if order.len() != word_count {
        return None;
    }
    let indices = order
        .iter()
        .map(|&i| usize::try_from(i).ok().filter(|i| *i < word_count))
        .collect::<Option<Vec<usize>>>()?;
    let unique: HashSet<usize> = indices.iter().copied().collect();
    (unique.len() == word_count).then_some(indices)
}
