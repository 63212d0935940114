// src/config.rs

//! Runtime configuration with environment overrides.

use crate::checkpoint::DEFAULT_BLOCK_SIZE;
use crate::context::DEFAULT_MAX_HISTORY;
use crate::memory::DEFAULT_MAX_LEN;
use crate::sampler::{DEFAULT_STEPS, DEFAULT_TOP_K};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub tokenizer_path: PathBuf,
    pub memory_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub model_path: PathBuf,
    /// Used when the checkpoint metadata cannot be read.
    pub default_block_size: usize,
    pub steps: usize,
    /// `None` samples from the full distribution.
    pub top_k: Option<usize>,
    pub memory_max_len: usize,
    pub max_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tokenizer_path: PathBuf::from("tokenizer.json"),
            memory_path: PathBuf::from("memory.json"),
            checkpoint_path: PathBuf::from("checkpoint.json"),
            model_path: PathBuf::from("minigpt_grundwissen.ot"),
            default_block_size: DEFAULT_BLOCK_SIZE,
            steps: DEFAULT_STEPS,
            top_k: Some(DEFAULT_TOP_K),
            memory_max_len: DEFAULT_MAX_LEN,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Defaults overridden by `STILWAHL_*` variables. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("STILWAHL_TOKENIZER") {
            config.tokenizer_path = path.into();
        }
        if let Ok(path) = env::var("STILWAHL_MEMORY") {
            config.memory_path = path.into();
        }
        if let Ok(path) = env::var("STILWAHL_CHECKPOINT") {
            config.checkpoint_path = path.into();
        }
        if let Ok(path) = env::var("STILWAHL_MODEL") {
            config.model_path = path.into();
        }
        if let Some(n) = parsed::<usize>("STILWAHL_BLOCK_SIZE").filter(|&n| n > 0) {
            config.default_block_size = n;
        }
        if let Some(n) = parsed("STILWAHL_STEPS") {
            config.steps = n;
        }
        // 0 turns top-k filtering off
        if let Some(k) = parsed::<usize>("STILWAHL_TOP_K") {
            config.top_k = (k > 0).then_some(k);
        }
        if let Some(n) = parsed::<usize>("STILWAHL_MEMORY_MAX").filter(|&n| n > 0) {
            config.memory_max_len = n;
        }
        if let Some(n) = parsed("STILWAHL_MAX_HISTORY") {
            config.max_history = n;
        }

        config
    }
}
