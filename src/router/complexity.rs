//! Complexity estimation
//!
//! Scores how much depth an answer needs on a `[0, 1]` scale. Pure and
//! deterministic: baseline, plus one length band, plus a per-intent weight,
//! plus attachments and extra questions, clamped.

use super::Intent;

pub const BASELINE: f64 = 0.3;
pub const DOCUMENTS_WEIGHT: f64 = 0.15;
pub const EXTRA_QUESTION_WEIGHT: f64 = 0.1;
pub const MAX_EXTRA_QUESTIONS: usize = 3;

/// Length contribution. Bands are exclusive, only the highest applies.
pub fn length_weight(word_count: usize) -> f64 {
    match word_count {
        n if n > 100 => 0.3,
        n if n > 50 => 0.2,
        n if n > 20 => 0.1,
        _ => 0.0,
    }
}

/// Fixed contribution of the intent
pub fn intent_weight(intent: Intent) -> f64 {
    match intent {
        Intent::Reasoning | Intent::Math => 0.3,
        Intent::Coding => 0.25,
        Intent::Research => 0.2,
        Intent::Live => 0.1,
        Intent::General => 0.0,
    }
}

/// Estimate complexity of a prompt for an already-classified intent
pub fn estimate(prompt: &str, intent: Intent, has_docs: bool) -> f64 {
    let word_count = prompt.split_whitespace().count();
    let extra_questions = prompt
        .matches('?')
        .count()
        .saturating_sub(1)
        .min(MAX_EXTRA_QUESTIONS);

    let mut score = BASELINE + length_weight(word_count) + intent_weight(intent);
    if has_docs {
        score += DOCUMENTS_WEIGHT;
    }
    score += extra_questions as f64 * EXTRA_QUESTION_WEIGHT;

    score.clamp(0.0, 1.0)
}
