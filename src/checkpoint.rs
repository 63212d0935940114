// src/checkpoint.rs

//! Metadata written next to model weights by the training side.

use crate::error::{StilError, StilResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const DEFAULT_BLOCK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Longest token window the model was trained on.
    pub block_size: usize,
    #[serde(default)]
    pub vocab_size: Option<usize>,
}

impl CheckpointMeta {
    pub fn read<P: AsRef<Path>>(path: P) -> StilResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StilError::Checkpoint(format!("cannot read {:?}: {}", path, e)))?;
        let meta: Self = serde_json::from_str(&raw)
            .map_err(|e| StilError::Checkpoint(format!("cannot parse {:?}: {}", path, e)))?;
        if meta.block_size == 0 {
            return Err(StilError::Checkpoint(format!("{:?} declares a block size of 0", path)));
        }
        Ok(meta)
    }

    /// False when the metadata records a vocabulary size other than `vocab_len`.
    pub fn fits_vocab(&self, vocab_len: usize) -> bool {
        self.vocab_size.is_none_or(|n| n == vocab_len)
    }
}

/// Context window from the checkpoint metadata, or `default` when it is unavailable.
/// Warns when the checkpoint was trained on a vocabulary of another size.
pub fn resolve_block_size<P: AsRef<Path>>(path: P, default: usize, vocab_len: usize) -> usize {
    match CheckpointMeta::read(path) {
        Ok(meta) => {
            if !meta.fits_vocab(vocab_len) {
                warn!(
                    "Checkpoint expects {} vocabulary symbols but the tokenizer has {}; weights will not load",
                    meta.vocab_size.unwrap_or_default(),
                    vocab_len
                );
            }
            meta.block_size
        }
        Err(e) => {
            warn!("Using fallback block size {}: {}", default, e);
            default
        }
    }
}
