// src/scoring.rs

//! Ranks generated candidates with surface grammar checks and style similarity.
//!
//! Signals are additive:
//! - +1.0 for an uppercase first character
//! - +1.0 for a closing `.`, `!` or `?`
//! - +0.3 per common word found anywhere in the text
//! - a penalty for long runs of one repeated character
//! - the weighted style similarity against the profile

use crate::memory::{self, StyleProfile};

pub const GERMAN_COMMON_WORDS: &[&str] = &[
    "und", "oder", "aber", "der", "die", "das", "ein", "eine", "ist", "sind", "war", "waren",
    "haben", "hat", "nicht", "mathematik", "wissenschaft", "natur", "computer", "energie",
];

const CAPITAL_BONUS: f64 = 1.0;
const TERMINAL_BONUS: f64 = 1.0;
const COMMON_WORD_BONUS: f64 = 0.3;
/// Runs at least this long are penalised.
const RUN_THRESHOLD: usize = 5;
const RUN_PENALTY: f64 = 0.5;
const STYLE_SCALE: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct Scorer {
    common_words: Vec<String>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(GERMAN_COMMON_WORDS.iter().copied())
    }
}

impl Scorer {
    pub fn new<I, S>(common_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let common_words = common_words.into_iter().map(|w| w.as_ref().to_lowercase()).collect();
        Self { common_words }
    }

    pub fn score(&self, text: &str, style_weight: f64, profile: Option<&StyleProfile>) -> f64 {
        let t = text.trim();
        let mut score = 0.0;

        if t.chars().next().is_some_and(char::is_uppercase) {
            score += CAPITAL_BONUS;
        }
        if t.ends_with(['.', '!', '?']) {
            score += TERMINAL_BONUS;
        }

        // substring match, so "hund" also earns "und"; each word counts once
        let lower = t.to_lowercase();
        let hits = self.common_words.iter().filter(|w| lower.contains(w.as_str())).count();
        score += hits as f64 * COMMON_WORD_BONUS;

        let run = longest_run(t);
        if run >= RUN_THRESHOLD {
            score -= (run - (RUN_THRESHOLD - 1)) as f64 * RUN_PENALTY;
        }

        if style_weight > 0.0 && profile.is_some() {
            score += style_weight * STYLE_SCALE * memory::similarity(t, profile);
        }
        score
    }
}

/// Length of the longest run of one repeated character; 0 for empty text.
pub fn longest_run(text: &str) -> usize {
    let mut chars = text.chars();
    let Some(mut prev) = chars.next() else {
        return 0;
    };
    let (mut best, mut current) = (1, 1);
    for c in chars {
        if c == prev {
            current += 1;
            best = best.max(current);
        } else {
            current = 1;
            prev = c;
        }
    }
    best
}
