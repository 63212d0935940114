// src/tokenizer.rs

//! Character-level vocabulary mapping text to dense ids and back.
//!
//! The vocabulary file also carries a merge table reserved for a BPE path.
//! It is never consulted, only kept so the file round-trips.

use crate::error::{StilError, StilResult};
use crate::persist::write_json_atomic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

pub const DEFAULT_VOCAB_SIZE: usize = 4096;

/// Id every out-of-vocabulary symbol encodes to.
pub const UNKNOWN_ID: u32 = 0;

/// On-disk shape. `itos` keys are JSON strings; serde parses them back to integers.
#[derive(Serialize, Deserialize)]
struct VocabFile {
    #[serde(default = "default_vocab_size")]
    vocab_size: usize,
    #[serde(default)]
    vocab: Vec<String>,
    #[serde(default)]
    stoi: BTreeMap<String, u32>,
    #[serde(default)]
    itos: BTreeMap<u32, String>,
    #[serde(default)]
    merges: Map<String, Value>,
}

fn default_vocab_size() -> usize {
    DEFAULT_VOCAB_SIZE
}

/// Symbol ↔ id mapping. Immutable once built or loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    vocab_size: usize,
    symbols: Vec<String>,
    stoi: HashMap<String, u32>,
    itos: HashMap<u32, String>,
    merges: Map<String, Value>,
}

impl Vocabulary {
    /// Builds a vocabulary from the distinct characters of `corpus`, in code point
    /// order, keeping at most `vocab_size` of them. An empty corpus gives an empty
    /// vocabulary, which the sampler refuses to generate with.
    pub fn train(corpus: &str, vocab_size: usize) -> Self {
        let distinct: BTreeSet<char> = corpus.chars().collect();
        let symbols: Vec<String> = distinct.into_iter().take(vocab_size).map(String::from).collect();

        let stoi: HashMap<String, u32> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        let itos = stoi.iter().map(|(s, &i)| (i, s.clone())).collect();

        Self { vocab_size, symbols, stoi, itos, merges: Map::new() }
    }

    /// Loads the file at `path`, or trains on `corpus` and saves the result when
    /// no file exists yet.
    pub fn load_or_train<P: AsRef<Path>>(path: P, corpus: &str, vocab_size: usize) -> StilResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let vocab = Self::load(path)?;
            info!("Loaded vocabulary with {} symbols from {:?}", vocab.len(), path);
            return Ok(vocab);
        }
        let vocab = Self::train(corpus, vocab_size);
        vocab.save(path)?;
        info!("Trained vocabulary with {} symbols and saved it to {:?}", vocab.len(), path);
        Ok(vocab)
    }

    /// Maps each character independently; unknown characters become `UNKNOWN_ID`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut buf = [0u8; 4];
        text.chars()
            .map(|c| {
                let symbol: &str = c.encode_utf8(&mut buf);
                self.stoi.get(symbol).copied().unwrap_or(UNKNOWN_ID)
            })
            .collect()
    }

    /// Concatenates the symbols for `ids`. Unknown ids are dropped silently.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .filter_map(|id| self.itos.get(id))
            .map(String::as_str)
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> StilResult<()> {
        let file = VocabFile {
            vocab_size: self.vocab_size,
            vocab: self.symbols.clone(),
            stoi: self.stoi.iter().map(|(s, &i)| (s.clone(), i)).collect(),
            itos: self.itos.iter().map(|(&i, s)| (i, s.clone())).collect(),
            merges: self.merges.clone(),
        };
        write_json_atomic(path.as_ref(), &file, false)
    }

    /// Loads a vocabulary file. Missing or malformed files are an error; there is
    /// no fallback vocabulary.
    pub fn load<P: AsRef<Path>>(path: P) -> StilResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| StilError::vocab_file(path, e))?;
        let file: VocabFile = serde_json::from_str(&raw).map_err(|e| StilError::vocab_file(path, e))?;
        Ok(Self {
            vocab_size: file.vocab_size,
            symbols: file.vocab,
            stoi: file.stoi.into_iter().collect(),
            itos: file.itos.into_iter().collect(),
            merges: file.merges,
        })
    }

    pub fn contains(&self, symbol: char) -> bool {
        let mut buf = [0u8; 4];
        self.stoi.contains_key(&*symbol.encode_utf8(&mut buf))
    }

    /// Number of stored symbols, i.e. the model's output width.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The configured upper bound, not the stored symbol count.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn train_sorts_and_truncates() {
        let vocab = Vocabulary::train("cabbage", 3);
        assert_eq!(vocab.symbols(), &["a", "b", "c"]);
        assert_eq!(vocab.encode("abc"), vec![0, 1, 2]);
        assert_eq!(vocab.vocab_size(), 3);
    }

    #[test]
    fn empty_corpus_gives_empty_vocabulary() {
        let vocab = Vocabulary::train("", DEFAULT_VOCAB_SIZE);
        assert!(vocab.is_empty());
        assert_eq!(vocab.decode(&[0, 1]), "");
    }

    #[test]
    fn round_trip_for_known_symbols() {
        let vocab = Vocabulary::train("Grüße aus München!", DEFAULT_VOCAB_SIZE);
        let text = "Münze aus Gußeisen!";
        // 'z' and 'i' never appear in the corpus
        let known = "Grüße aus München";
        assert_eq!(vocab.decode(&vocab.encode(known)), known);
        assert_ne!(vocab.decode(&vocab.encode(text)), text);
    }

    #[test]
    fn encode_length_matches_char_count() {
        let vocab = Vocabulary::train("abc", DEFAULT_VOCAB_SIZE);
        let text = "äöü xyz „Zitat“";
        assert_eq!(vocab.encode(text).len(), text.chars().count());
    }

    #[test]
    fn unknown_symbols_map_to_fallback_id() {
        let vocab = Vocabulary::train("xyz", DEFAULT_VOCAB_SIZE);
        assert_eq!(vocab.encode("xq"), vec![0, UNKNOWN_ID]);
        assert!(vocab.contains('x') && !vocab.contains('q'));
        // the unknown 'q' decodes as 'x', which owns id 0
        assert_eq!(vocab.decode(&vocab.encode("xq")), "xx");
    }

    #[test]
    fn unknown_ids_decode_to_nothing() {
        let vocab = Vocabulary::train("ab", DEFAULT_VOCAB_SIZE);
        assert_eq!(vocab.decode(&[1, 99, 0]), "ba");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let vocab = Vocabulary::train("hallo welt", 64);
        vocab.save(&path).unwrap();

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded, vocab);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["vocab_size"], 64);
        assert!(raw["merges"].as_object().unwrap().is_empty());
        assert_eq!(raw["itos"]["0"], " ");
    }

    #[test]
    fn load_normalizes_string_keys_and_keeps_merges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(
            &path,
            r#"{"vocab_size": 8, "vocab": ["a", "b"], "stoi": {"a": 0, "b": 1},
                "itos": {"0": "a", "1": "b"}, "merges": {"a b": "ab"}}"#,
        )
        .unwrap();

        let vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.decode(&[1, 0]), "ba");
        assert_eq!(vocab.len(), 2);

        let copy = dir.path().join("copy.json");
        vocab.save(&copy).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&copy).unwrap()).unwrap();
        assert_eq!(raw["merges"]["a b"], "ab");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, r#"{"vocab": ["a"], "stoi": {"a": 0}, "itos": {"0": "a"}}"#).unwrap();
        let vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.vocab_size(), DEFAULT_VOCAB_SIZE);
    }

    #[test]
    fn missing_or_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(Vocabulary::load(&missing), Err(StilError::VocabFile { .. })));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, r#"{"itos": {"eins": "a"}}"#).unwrap();
        assert!(matches!(Vocabulary::load(&broken), Err(StilError::VocabFile { .. })));
    }

    #[test]
    fn load_or_train_trains_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let first = Vocabulary::load_or_train(&path, "abc", 16).unwrap();
        assert!(path.exists());
        let second = Vocabulary::load_or_train(&path, "xyz", 16).unwrap();
        assert_eq!(first, second);
    }
}
