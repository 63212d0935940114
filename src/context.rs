// src/context.rs

//! Session-only conversation history.
//!
//! Nothing here touches disk. A follow-up question gets the previous exchange
//! prepended so the model sees what "das" refers to.

use std::collections::VecDeque;

pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Prompts of at most this many words are treated as follow-ups.
const SHORT_PROMPT_WORDS: usize = 4;

const FOLLOW_UP_TRIGGERS: &[&str] = &[
    "und was",
    "und wie",
    "und warum",
    "warum",
    "wieso",
    "wie genau",
    "was bedeutet das",
    "und das",
    "und dann",
    "nochmal",
    "erkläre das",
    "erklär das",
    "was heißt das",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub prompt: String,
    pub answer: String,
}

#[derive(Debug, Clone)]
pub struct ContextManager {
    history: VecDeque<ContextEntry>,
    max_history: usize,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ContextManager {
    pub fn new(max_history: usize) -> Self {
        Self { history: VecDeque::with_capacity(max_history), max_history }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn update(&mut self, prompt: &str, answer: &str, enabled: bool) {
        if !enabled {
            return;
        }
        self.history.push_back(ContextEntry { prompt: prompt.to_string(), answer: answer.to_string() });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// Returns `prompt` unchanged unless it looks like a follow-up to the last
    /// exchange, in which case that exchange is prepended.
    pub fn apply(&self, prompt: &str, enabled: bool) -> String {
        if !enabled {
            return prompt.to_string();
        }
        let Some(last) = self.history.back() else {
            return prompt.to_string();
        };
        if !is_follow_up(prompt) {
            return prompt.to_string();
        }
        format!(
            "Vorheriger Kontext:\nBenutzer: {}\nKI: {}\n\nNeue Frage:\n{}",
            last.prompt.trim(),
            last.answer.trim(),
            prompt
        )
    }

    pub fn history(&self) -> impl Iterator<Item = &ContextEntry> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

fn is_follow_up(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    FOLLOW_UP_TRIGGERS.iter().any(|t| lower.contains(t)) || prompt.split_whitespace().count() <= SHORT_PROMPT_WORDS
}
