// src/lib.rs

//! Picks one completion out of several sampled from a small character-level
//! language model, ranking them by surface grammar and by how closely they
//! match the style of the user's own past prompts.
//!
//! The model itself stays behind [`sampler::Inference`]; everything else
//! (vocabulary, sampling, scoring, style memory, conversation context) lives here.

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod sampler;
pub mod scoring;
pub mod selection;
pub mod session;
pub mod style;
pub mod tokenizer;

#[cfg(feature = "torch")]
pub mod generative_model;

mod persist;

pub use error::{StilError, StilResult};
