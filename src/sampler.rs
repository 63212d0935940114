// src/sampler.rs

//! Autoregressive sampling on top of an opaque next-token model.

use crate::error::{StilError, StilResult};
use crate::tokenizer::Vocabulary;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

pub const DEFAULT_TOP_K: usize = 30;
pub const DEFAULT_STEPS: usize = 80;

/// Smallest temperature logits are divided by.
const MIN_TEMPERATURE: f64 = 1e-6;

/// The only thing the core needs from a language model.
pub trait Inference {
    /// Next-token logits for the final position of `ids`, one per vocabulary entry.
    fn infer(&self, ids: &[u32]) -> StilResult<Vec<f32>>;
}

impl<T: Inference + ?Sized> Inference for &T {
    fn infer(&self, ids: &[u32]) -> StilResult<Vec<f32>> {
        (**self).infer(ids)
    }
}

impl<T: Inference + ?Sized> Inference for Box<T> {
    fn infer(&self, ids: &[u32]) -> StilResult<Vec<f32>> {
        (**self).infer(ids)
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Samples one id from temperature-scaled logits, restricted to the `top_k`
/// largest when `top_k` is below the vocabulary size.
pub fn sample_next_id<R: Rng + ?Sized>(
    logits: &[f32],
    temperature: f64,
    top_k: Option<usize>,
    rng: &mut R,
) -> StilResult<u32> {
    if logits.is_empty() {
        return Err(StilError::sampling("model returned no logits"));
    }
    let temperature = temperature.max(MIN_TEMPERATURE);
    let scaled: Vec<f64> = logits.iter().map(|&l| l as f64 / temperature).collect();

    let candidates: Vec<usize> = match top_k {
        Some(k) if k > 0 && k < scaled.len() => {
            let mut order: Vec<usize> = (0..scaled.len()).collect();
            order.sort_by(|&a, &b| scaled[b].total_cmp(&scaled[a]));
            order.truncate(k);
            order
        }
        _ => (0..scaled.len()).collect(),
    };

    let restricted: Vec<f64> = candidates.iter().map(|&i| scaled[i]).collect();
    let probs = softmax(&restricted);
    let dist = WeightedIndex::new(&probs).map_err(|e| StilError::sampling(format!("invalid distribution: {e}")))?;
    Ok(candidates[dist.sample(rng)] as u32)
}

/// Keeps only the trailing `window` ids.
fn clip(ids: &mut Vec<u32>, window: usize) {
    if ids.len() > window {
        ids.drain(..ids.len() - window);
    }
}

/// Turns a prompt into one finished continuation per call.
pub struct CandidateSampler<M, R> {
    vocab: Vocabulary,
    model: M,
    block_size: usize,
    top_k: Option<usize>,
    rng: R,
}

impl<M: Inference, R: Rng> CandidateSampler<M, R> {
    pub fn new(vocab: Vocabulary, model: M, block_size: usize, rng: R) -> StilResult<Self> {
        if vocab.is_empty() {
            return Err(StilError::EmptyVocabulary);
        }
        Ok(Self { vocab, model, block_size: block_size.max(1), top_k: Some(DEFAULT_TOP_K), rng })
    }

    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    /// Runs exactly `steps` sampling steps and decodes the whole window,
    /// prompt included. There is no stop token.
    pub fn generate(&mut self, prompt: &str, steps: usize, temperature: f64) -> StilResult<String> {
        let mut ids = self.vocab.encode(prompt);
        if ids.is_empty() {
            return Err(StilError::EmptySequence);
        }
        clip(&mut ids, self.block_size);

        for _ in 0..steps {
            clip(&mut ids, self.block_size);
            let logits = self.model.infer(&ids)?;
            let next = sample_next_id(&logits, temperature, self.top_k, &mut self.rng)?;
            ids.push(next);
        }
        Ok(self.vocab.decode(&ids))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
