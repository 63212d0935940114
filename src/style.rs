// src/style.rs

//! Cheap surface features describing how a German text is written.
//!
//! None of this is real part-of-speech tagging. Capitalised words count as
//! nouns and a handful of suffixes mark adjectives and adverbs; the noise is
//! accepted since the features only steer candidate ranking.

use serde::{Deserialize, Serialize};

pub const PREPOSITIONS: &[&str] = &[
    "in", "an", "auf", "unter", "über", "vor", "hinter", "neben", "zwischen", "mit", "ohne", "für",
    "von", "zu", "nach", "gegen", "bei", "seit", "bis", "durch", "um", "entlang", "aus",
];

pub const CONJUNCTIONS: &[&str] = &[
    "und", "oder", "aber", "denn", "doch", "weil", "da", "obwohl", "während", "dass", "damit",
    "sodass", "wenn", "falls",
];

pub const PRONOUNS: &[&str] = &[
    "ich", "du", "er", "sie", "es", "wir", "ihr", "mich", "dich", "ihn", "uns", "euch", "mein",
    "dein", "sein", "unser", "euer",
];

pub const ADVERBS: &[&str] = &[
    "oft", "selten", "manchmal", "immer", "nie", "heute", "gestern", "morgen", "bald", "früher",
    "sehr", "kaum", "genau", "ungefähr",
];

const ADJECTIVE_SUFFIXES: &[&str] = &["ig", "lich", "isch", "los", "voll", "sam"];
const ADVERB_SUFFIXES: &[&str] = &["erweise", "lich"];

/// Stripped from both ends of every whitespace-delimited token.
const EDGE_CHARS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '«', '»', '„', '“',
];
const PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Names of the feature dimensions, in `as_array` order.
pub const FEATURE_NAMES: [&str; 8] = [
    "avg_sentence_length",
    "avg_token_length",
    "noun_ratio",
    "adjective_ratio",
    "adverb_ratio",
    "preposition_ratio",
    "function_word_ratio",
    "punctuation_ratio",
];

/// Fixed-dimension style description of one text. All values are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleFeatures {
    pub avg_sentence_length: f64,
    pub avg_token_length: f64,
    pub noun_ratio: f64,
    pub adjective_ratio: f64,
    pub adverb_ratio: f64,
    pub preposition_ratio: f64,
    pub function_word_ratio: f64,
    pub punctuation_ratio: f64,
}

impl StyleFeatures {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.avg_sentence_length,
            self.avg_token_length,
            self.noun_ratio,
            self.adjective_ratio,
            self.adverb_ratio,
            self.preposition_ratio,
            self.function_word_ratio,
            self.punctuation_ratio,
        ]
    }

    pub fn from_array(values: [f64; 8]) -> Self {
        let [avg_sentence_length, avg_token_length, noun_ratio, adjective_ratio, adverb_ratio, preposition_ratio, function_word_ratio, punctuation_ratio] =
            values;
        Self {
            avg_sentence_length,
            avg_token_length,
            noun_ratio,
            adjective_ratio,
            adverb_ratio,
            preposition_ratio,
            function_word_ratio,
            punctuation_ratio,
        }
    }

    /// `(name, value)` pairs in `FEATURE_NAMES` order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.as_array())
    }

    pub fn norm(&self) -> f64 {
        self.as_array().iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Splits on whitespace and strips quotes and punctuation from token edges.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|raw| raw.trim_matches(EDGE_CHARS))
        .filter(|tok| !tok.is_empty())
        .collect()
}

fn ends_with_any(word: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| word.ends_with(s))
}

pub fn extract(text: &str) -> StyleFeatures {
    let tokens = tokenize(text);
    let n_tokens = tokens.len();
    let n_chars = text.chars().count();
    if n_tokens == 0 || n_chars == 0 {
        return StyleFeatures::default();
    }

    let sentence_marks = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    let n_sentences = sentence_marks.max(1);
    let total_token_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();

    let (mut nouns, mut adjectives, mut adverbs, mut prepositions, mut function_words) = (0, 0, 0, 0, 0);
    for (i, tok) in tokens.iter().enumerate() {
        let lower = tok.to_lowercase();
        let lower = lower.as_str();

        if PREPOSITIONS.contains(&lower) {
            prepositions += 1;
            function_words += 1;
        }
        if CONJUNCTIONS.contains(&lower) || PRONOUNS.contains(&lower) {
            function_words += 1;
        }
        if i > 0 && tok.chars().next().is_some_and(char::is_uppercase) {
            nouns += 1;
        }
        if ends_with_any(lower, ADJECTIVE_SUFFIXES) {
            adjectives += 1;
        }
        if ADVERBS.contains(&lower) || ends_with_any(lower, ADVERB_SUFFIXES) {
            adverbs += 1;
        }
    }

    let punctuation = text.chars().filter(|c| PUNCTUATION.contains(c)).count();
    let per_token = |count: usize| count as f64 / n_tokens as f64;

    StyleFeatures {
        avg_sentence_length: n_tokens as f64 / n_sentences as f64,
        avg_token_length: total_token_chars as f64 / n_tokens as f64,
        noun_ratio: per_token(nouns),
        adjective_ratio: per_token(adjectives),
        adverb_ratio: per_token(adverbs),
        preposition_ratio: per_token(prepositions),
        function_word_ratio: per_token(function_words),
        punctuation_ratio: punctuation as f64 / n_chars as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_and_punctuation_only_texts_are_all_zero() {
        assert_eq!(extract(""), StyleFeatures::default());
        assert_eq!(extract("   \n "), StyleFeatures::default());
        // "..." and "!?" strip to nothing, so there are no tokens
        assert_eq!(extract("... !?"), StyleFeatures::default());
    }

    #[test]
    fn tokenizer_strips_edges_and_newlines() {
        assert_eq!(tokenize("„Hallo,\nWelt!“ (ja)"), vec!["Hallo", "Welt", "ja"]);
    }

    #[test]
    fn counts_a_simple_sentence() {
        // tokens: Ich, gehe, heute, mit, dem, Hund, spazieren
        let f = extract("Ich gehe heute mit dem Hund spazieren.");
        assert!(close(f.avg_sentence_length, 7.0));
        assert!(close(f.avg_token_length, 31.0 / 7.0));
        // "Hund" only; the first token never counts as a noun
        assert!(close(f.noun_ratio, 1.0 / 7.0));
        assert!(close(f.adverb_ratio, 1.0 / 7.0));
        assert!(close(f.preposition_ratio, 1.0 / 7.0));
        // "mit" as preposition, "ich" as pronoun
        assert!(close(f.function_word_ratio, 2.0 / 7.0));
        assert!(close(f.adjective_ratio, 0.0));
        assert!(close(f.punctuation_ratio, 1.0 / 38.0));
    }

    #[test]
    fn lich_counts_as_adjective_and_adverb() {
        let f = extract("wirklich schön");
        assert!(close(f.adjective_ratio, 0.5));
        assert!(close(f.adverb_ratio, 0.5));
    }

    #[test]
    fn sentence_count_uses_raw_marks() {
        let f = extract("Ja. Nein! Vielleicht? Gut.");
        assert!(close(f.avg_sentence_length, 1.0));
        // capitalised sentence starts after the first token look like nouns
        assert!(close(f.noun_ratio, 0.75));
    }

    #[test]
    fn named_follows_feature_order() {
        let f = extract("Heute lachen wir.");
        let names: Vec<_> = f.named().map(|(k, _)| k).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
        assert_eq!(StyleFeatures::from_array(f.as_array()), f);
    }
}
