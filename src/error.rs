// src/error.rs

//! Error types shared by the library.
//!
//! The vocabulary boundary is strict and surfaces `VocabFile`; the memory
//! boundary never returns these errors from its load path.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StilError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The vocabulary file is missing or malformed. Generation cannot proceed.
    #[error("Vocabulary file {path:?} is unusable: {reason}")]
    VocabFile { path: PathBuf, reason: String },

    #[error("Vocabulary is empty; train or load a vocabulary before generating")]
    EmptyVocabulary,

    #[error("Cannot generate from an empty token sequence")]
    EmptySequence,

    #[error("Selection round produced no candidates")]
    NoCandidates,

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Checkpoint metadata error: {0}")]
    Checkpoint(String),
}

pub type StilResult<T> = Result<T, StilError>;

impl StilError {
    pub fn vocab_file(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::VocabFile { path: path.into(), reason: reason.to_string() }
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn sampling(msg: impl Into<String>) -> Self {
        Self::Sampling(msg.into())
    }
}
