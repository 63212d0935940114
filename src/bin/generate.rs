// src/bin/generate.rs

use anyhow::{Context, Result};
use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use stilwahl::{
    checkpoint::resolve_block_size,
    config::Config,
    context::ContextManager,
    generative_model::{MiniGptConfig, TorchModel},
    memory::StyleStore,
    sampler::CandidateSampler,
    scoring::Scorer,
    selection::{GenerationSettings, Selector},
    session::{Reply, Session},
    tokenizer::Vocabulary,
};
use tch::Device;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "generate")]
#[command(about = "Interactive generation with style-aware candidate selection")]
struct Args {
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Model weights (.ot)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Checkpoint metadata JSON with the block size
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    #[arg(long)]
    memory: Option<PathBuf>,

    /// Candidates per prompt, 1 to 10
    #[arg(short = 'n', long, default_value = "5", allow_hyphen_values = true)]
    candidates: String,

    /// Sampling temperature, at least 0.1
    #[arg(short, long, default_value = "0.4", allow_hyphen_values = true)]
    temperature: String,

    /// Style influence, 0 (off) to 1 (strong)
    #[arg(short, long, default_value = "0.5", allow_hyphen_values = true)]
    style_weight: String,

    /// Sampling steps per candidate
    #[arg(long)]
    steps: Option<usize>,

    /// Do not prepend the previous exchange to follow-up questions
    #[arg(long)]
    no_context: bool,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(path) = args.tokenizer {
        config.tokenizer_path = path;
    }
    if let Some(path) = args.model {
        config.model_path = path;
    }
    if let Some(path) = args.checkpoint {
        config.checkpoint_path = path;
    }
    if let Some(path) = args.memory {
        config.memory_path = path;
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }

    // --- 1. Vocabulary and model ---
    let vocab = Vocabulary::load(&config.tokenizer_path)
        .with_context(|| format!("loading vocabulary from {:?}", config.tokenizer_path))?;
    let block_size = resolve_block_size(&config.checkpoint_path, config.default_block_size, vocab.len());
    let device = Device::cuda_if_available();
    info!("Device: {:?}, block size: {}, vocabulary: {} symbols", device, block_size, vocab.len());

    let model_config = MiniGptConfig::new(vocab.len(), block_size);
    let model = TorchModel::load(&config.model_path, &model_config, device)?;
    info!("Model {:?} loaded", config.model_path);

    // --- 2. Session ---
    let rng = args.seed.map(StdRng::seed_from_u64).unwrap_or_else(StdRng::from_entropy);
    let sampler = CandidateSampler::new(vocab, model, block_size, rng)?.with_top_k(config.top_k);
    let selector = Selector::new(sampler, Scorer::default());
    let store = StyleStore::open(&config.memory_path, config.memory_max_len);
    let mut session =
        Session::new(selector, store, ContextManager::new(config.max_history)).with_context(!args.no_context);

    let settings = GenerationSettings::from_raw(&args.candidates, &args.temperature, &args.style_weight, config.steps);
    info!(
        "Candidates: {}, temperature: {:.2}, style weight: {:.2}, steps: {}",
        settings.n_candidates, settings.temperature, settings.style_weight, settings.steps
    );

    // --- 3. Prompt loop ---
    println!("Prompt eingeben (:reset für neuen Dialog, :quit zum Beenden)");
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            ":quit" => break,
            ":reset" => {
                session.reset_context();
                println!("Neuer Dialog.");
            }
            prompt => match session.ask(prompt, &settings) {
                Reply::Answer { text, score } => println!("Beste Antwort (Score {:.2}):\n\n{}\n", score, text),
                Reply::Notice { message } => println!("{}", message),
            },
        }
    }

    session.close().context("saving memory on exit")?;
    Ok(())
}
