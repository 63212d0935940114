// src/bin/build_vocab.rs

use anyhow::{Context, Result, bail};
use arrow::array::StringArray;
use clap::Parser;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    time::Instant,
};
use stilwahl::{
    config::Config,
    tokenizer::{DEFAULT_VOCAB_SIZE, Vocabulary},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "build_vocab")]
#[command(about = "Build the character vocabulary from a training corpus")]
struct Args {
    /// Corpus files: .txt/.raw, or .parquet with a `text` column
    #[arg(required = true)]
    corpus: Vec<PathBuf>,

    /// Output vocabulary file (defaults to STILWAHL_TOKENIZER or tokenizer.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Upper bound on the number of symbols
    #[arg(long, default_value_t = DEFAULT_VOCAB_SIZE)]
    vocab_size: usize,

    /// Retrain even when the output file already exists
    #[arg(long)]
    force: bool,
}

/// Reads one corpus file. Parquet rows are joined with newlines.
fn load_corpus_file(path: &Path) -> Result<String> {
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match extension {
        "raw" | "txt" => fs::read_to_string(path).with_context(|| format!("reading {:?}", path)),
        "parquet" => {
            let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
            let text_column_name = "text";
            if builder.schema().field_with_name(text_column_name).is_err() {
                bail!("Parquet file {:?} must contain a column named '{}'", path, text_column_name);
            }
            let reader = builder.build()?;
            let mut rows = Vec::new();
            for record_batch in reader {
                let record_batch = record_batch?;
                let Some(column) = record_batch.column_by_name(text_column_name) else {
                    continue;
                };
                let Some(text_column) = column.as_any().downcast_ref::<StringArray>() else {
                    bail!("Column '{}' in {:?} is not a UTF-8 string column", text_column_name, path);
                };
                rows.extend(text_column.iter().flatten().map(str::to_string));
            }
            Ok(rows.join("\n"))
        }
        _ => bail!("Unsupported corpus file '{}'. Use .txt, .raw or .parquet", path.display()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let output = args.output.unwrap_or_else(|| Config::from_env().tokenizer_path);

    let start = Instant::now();
    let mut corpus = String::new();
    for path in &args.corpus {
        corpus.push_str(&load_corpus_file(path)?);
    }
    info!("Corpus has {} characters from {} file(s)", corpus.chars().count(), args.corpus.len());

    let vocab = if args.force {
        let vocab = Vocabulary::train(&corpus, args.vocab_size);
        vocab.save(&output).with_context(|| format!("saving vocabulary to {:?}", output))?;
        info!("Trained vocabulary with {} symbols and saved it to {:?}", vocab.len(), output);
        vocab
    } else {
        Vocabulary::load_or_train(&output, &corpus, args.vocab_size)
            .with_context(|| format!("preparing vocabulary at {:?}", output))?
    };

    if vocab.is_empty() {
        warn!("The vocabulary is empty; generation will refuse to run with it");
    }

    let encoded = vocab.encode(&corpus);
    let unknown = corpus.chars().filter(|&c| !vocab.contains(c)).count();
    info!("Corpus encodes to {} tokens ({} unknown) in {:?}", encoded.len(), unknown, start.elapsed());
    Ok(())
}
