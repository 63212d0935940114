// src/generative_model.rs

//! The `tch` next-token model: token and learned position embeddings, a
//! post-norm transformer encoder stack under a causal mask, and a linear head.

use crate::error::{StilError, StilResult};
use crate::sampler::Inference;
use tch::{
    nn,
    nn::{ModuleT, Path},
    Device, Kind, Tensor,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiniGptConfig {
    pub vocab_size: i64,
    /// Longest sequence the position table covers.
    pub block_size: i64,
    pub embed_dim: i64,
    pub heads: i64,
    pub layers: i64,
    pub feed_forward: i64,
    pub dropout: f64,
}

impl MiniGptConfig {
    pub fn new(vocab_size: usize, block_size: usize) -> Self {
        Self {
            vocab_size: vocab_size as i64,
            block_size: block_size as i64,
            embed_dim: 128,
            heads: 4,
            layers: 4,
            feed_forward: 512,
            dropout: 0.1,
        }
    }
}

#[derive(Debug)]
struct SelfAttention {
    qkv: nn::Linear,
    out: nn::Linear,
    heads: i64,
    head_dim: i64,
    dropout: f64,
}

impl SelfAttention {
    fn new(p: &Path, cfg: &MiniGptConfig) -> Self {
        let qkv = nn::linear(p / "qkv", cfg.embed_dim, 3 * cfg.embed_dim, Default::default());
        let out = nn::linear(p / "out", cfg.embed_dim, cfg.embed_dim, Default::default());
        Self { qkv, out, heads: cfg.heads, head_dim: cfg.embed_dim / cfg.heads, dropout: cfg.dropout }
    }

    fn forward_t(&self, xs: &Tensor, mask: &Tensor, train: bool) -> Tensor {
        let size = xs.size();
        let (batch, seq_len, width) = (size[0], size[1], size[2]);
        // [3, batch, heads, seq, head_dim]
        let qkv = xs
            .apply(&self.qkv)
            .view([batch, seq_len, 3, self.heads, self.head_dim])
            .permute([2, 0, 3, 1, 4]);
        let (q, k, v) = (qkv.get(0), qkv.get(1), qkv.get(2));

        let scores = q.matmul(&k.transpose(-2, -1)) / (self.head_dim as f64).sqrt();
        let weights = scores
            .masked_fill(mask, f64::NEG_INFINITY)
            .softmax(-1, Kind::Float)
            .dropout(self.dropout, train);
        weights
            .matmul(&v)
            .transpose(1, 2)
            .contiguous()
            .view([batch, seq_len, width])
            .apply(&self.out)
    }
}

#[derive(Debug)]
struct EncoderBlock {
    attention: SelfAttention,
    linear1: nn::Linear,
    linear2: nn::Linear,
    norm1: nn::LayerNorm,
    norm2: nn::LayerNorm,
    dropout: f64,
}

impl EncoderBlock {
    fn new(p: &Path, cfg: &MiniGptConfig) -> Self {
        Self {
            attention: SelfAttention::new(&(p / "self_attn"), cfg),
            linear1: nn::linear(p / "linear1", cfg.embed_dim, cfg.feed_forward, Default::default()),
            linear2: nn::linear(p / "linear2", cfg.feed_forward, cfg.embed_dim, Default::default()),
            norm1: nn::layer_norm(p / "norm1", vec![cfg.embed_dim], Default::default()),
            norm2: nn::layer_norm(p / "norm2", vec![cfg.embed_dim], Default::default()),
            dropout: cfg.dropout,
        }
    }

    fn forward_t(&self, xs: &Tensor, mask: &Tensor, train: bool) -> Tensor {
        let attended = self.attention.forward_t(xs, mask, train).dropout(self.dropout, train);
        let xs = (xs + attended).apply(&self.norm1);
        let ff = xs
            .apply(&self.linear1)
            .relu()
            .dropout(self.dropout, train)
            .apply(&self.linear2)
            .dropout(self.dropout, train);
        (xs + ff).apply(&self.norm2)
    }
}

#[derive(Debug)]
pub struct MiniGpt {
    embed: nn::Embedding,
    pos: nn::Embedding,
    blocks: Vec<EncoderBlock>,
    head: nn::Linear,
}

impl MiniGpt {
    pub fn new(p: &Path, cfg: &MiniGptConfig) -> Self {
        let embed = nn::embedding(p / "embed", cfg.vocab_size, cfg.embed_dim, Default::default());
        let pos = nn::embedding(p / "pos", cfg.block_size, cfg.embed_dim, Default::default());
        let stack = p / "transformer";
        let blocks = (0..cfg.layers).map(|i| EncoderBlock::new(&(&stack / i), cfg)).collect();
        let head = nn::linear(p / "fc", cfg.embed_dim, cfg.vocab_size, Default::default());
        Self { embed, pos, blocks, head }
    }
}

impl ModuleT for MiniGpt {
    /// `ids` is `[batch, seq]`; the result is `[batch, seq, vocab]`.
    fn forward_t(&self, ids: &Tensor, train: bool) -> Tensor {
        let seq_len = ids.size()[1];
        let device = ids.device();
        let positions = Tensor::arange(seq_len, (Kind::Int64, device));
        let mask = Tensor::ones([seq_len, seq_len], (Kind::Bool, device)).triu(1);

        let mut xs = ids.apply(&self.embed) + positions.apply(&self.pos);
        for block in &self.blocks {
            xs = block.forward_t(&xs, &mask, train);
        }
        xs.apply(&self.head)
    }
}

/// Trained weights on a device, usable as the sampler's model.
pub struct TorchModel {
    model: MiniGpt,
    device: Device,
    // owns the parameters `model` points into
    _vs: nn::VarStore,
}

impl TorchModel {
    pub fn load<P: AsRef<std::path::Path>>(weights: P, cfg: &MiniGptConfig, device: Device) -> StilResult<Self> {
        let mut vs = nn::VarStore::new(device);
        let model = MiniGpt::new(&vs.root(), cfg);
        vs.load(weights.as_ref())
            .map_err(|e| StilError::inference(format!("cannot load weights from {:?}: {}", weights.as_ref(), e)))?;
        Ok(Self { model, device, _vs: vs })
    }

    /// Randomly initialised weights; useful for smoke runs without a checkpoint.
    pub fn untrained(cfg: &MiniGptConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let model = MiniGpt::new(&vs.root(), cfg);
        Self { model, device, _vs: vs }
    }
}

impl Inference for TorchModel {
    fn infer(&self, ids: &[u32]) -> StilResult<Vec<f32>> {
        if ids.is_empty() {
            return Err(StilError::EmptySequence);
        }
        let ids: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        let logits = tch::no_grad(|| -> Result<Tensor, tch::TchError> {
            let input = Tensor::f_from_slice(&ids)?.to(self.device).view((1, -1));
            Ok(self
                .model
                .forward_t(&input, false)
                .select(1, -1)
                .squeeze_dim(0)
                .to_kind(Kind::Float)
                .to(Device::Cpu))
        })
        .map_err(|e| StilError::inference(e.to_string()))?;
        Vec::<f32>::try_from(&logits).map_err(|e| StilError::inference(e.to_string()))
    }
}
