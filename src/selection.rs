// src/selection.rs

//! One selection round: sample N candidates, score them, keep the best, and
//! commit the prompt to the style store.

use crate::error::{StilError, StilResult};
use crate::memory::{StyleProfile, StyleStore};
use crate::sampler::{CandidateSampler, DEFAULT_STEPS, Inference};
use crate::scoring::Scorer;
use rand::Rng;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

pub const DEFAULT_STYLE_WEIGHT: f64 = 0.5;
pub const DEFAULT_TEMPERATURE: f64 = 0.4;
pub const DEFAULT_CANDIDATES: usize = 3;
pub const MIN_TEMPERATURE: f64 = 0.1;
pub const CANDIDATE_RANGE: RangeInclusive<usize> = 1..=10;

/// Caller-tunable knobs for a round. Construct through `from_raw` or `new`
/// so values are always clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub n_candidates: usize,
    pub temperature: f64,
    pub style_weight: f64,
    pub steps: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            n_candidates: DEFAULT_CANDIDATES,
            temperature: DEFAULT_TEMPERATURE,
            style_weight: DEFAULT_STYLE_WEIGHT,
            steps: DEFAULT_STEPS,
        }
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl GenerationSettings {
    pub fn new(n_candidates: usize, temperature: f64, style_weight: f64, steps: usize) -> Self {
        let temperature = if temperature.is_finite() { temperature } else { DEFAULT_TEMPERATURE };
        let style_weight = if style_weight.is_finite() { style_weight } else { DEFAULT_STYLE_WEIGHT };
        Self {
            n_candidates: n_candidates.clamp(*CANDIDATE_RANGE.start(), *CANDIDATE_RANGE.end()),
            temperature: temperature.max(MIN_TEMPERATURE),
            style_weight: style_weight.clamp(0.0, 1.0),
            steps,
        }
    }

    /// Parses user-entered strings. Anything unparsable takes its default.
    /// Fractional candidate counts are truncated before clamping.
    pub fn from_raw(candidates: &str, temperature: &str, style_weight: &str, steps: usize) -> Self {
        let (lo, hi) = (*CANDIDATE_RANGE.start(), *CANDIDATE_RANGE.end());
        let n_candidates = parse_finite(candidates)
            .map(|n| n.trunc().clamp(lo as f64, hi as f64) as usize)
            .unwrap_or(DEFAULT_CANDIDATES);
        let temperature = parse_finite(temperature).unwrap_or(DEFAULT_TEMPERATURE);
        let style_weight = parse_finite(style_weight).unwrap_or(DEFAULT_STYLE_WEIGHT);
        Self::new(n_candidates, temperature, style_weight, steps)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub score: f64,
}

/// Highest score wins; on ties the earliest candidate stays.
pub fn best_of(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if b.score >= c.score => Some(b),
        _ => Some(c),
    })
}

pub struct Selector<M, R> {
    sampler: CandidateSampler<M, R>,
    scorer: Scorer,
}

impl<M: Inference, R: Rng> Selector<M, R> {
    pub fn new(sampler: CandidateSampler<M, R>, scorer: Scorer) -> Self {
        Self { sampler, scorer }
    }

    /// Generates and scores `settings.n_candidates` continuations of `prompt`.
    /// Stops at the first generation error.
    pub fn candidates(
        &mut self,
        prompt: &str,
        settings: &GenerationSettings,
        profile: Option<&StyleProfile>,
    ) -> StilResult<Vec<Candidate>> {
        (0..settings.n_candidates.max(1))
            .map(|i| {
                let text = self.sampler.generate(prompt, settings.steps, settings.temperature)?;
                let score = self.scorer.score(&text, settings.style_weight, profile);
                debug!("Candidate {} scored {:.2}", i + 1, score);
                Ok(Candidate { text, score })
            })
            .collect()
    }

    /// Runs a round for `generation_prompt` and, on success, commits
    /// `accepted_prompt` to `store`. A failed memory save is logged, not returned.
    pub fn select_best_for(
        &mut self,
        generation_prompt: &str,
        accepted_prompt: &str,
        settings: &GenerationSettings,
        store: &mut StyleStore,
    ) -> StilResult<Candidate> {
        let candidates = self.candidates(generation_prompt, settings, store.profile())?;
        let best = best_of(candidates).ok_or(StilError::NoCandidates)?;
        info!("Best of {} candidates scored {:.2}", settings.n_candidates, best.score);

        if let Err(e) = store.accept(accepted_prompt) {
            warn!("Could not persist memory to {:?}: {}", store.path(), e);
        }
        Ok(best)
    }

    pub fn select_best(
        &mut self,
        prompt: &str,
        settings: &GenerationSettings,
        store: &mut StyleStore,
    ) -> StilResult<Candidate> {
        self.select_best_for(prompt, prompt, settings, store)
    }

    pub fn sampler(&self) -> &CandidateSampler<M, R> {
        &self.sampler
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }
}
