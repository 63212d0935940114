// src/memory.rs

//! Long-lived prompt memory and the style profile averaged from it.
//!
//! Loading is forgiving: a missing, unreadable or unrecognised memory file is
//! treated as empty. Personalisation is optional, so nothing here may stop a
//! generation round.

use crate::error::StilResult;
use crate::persist::write_json_atomic;
use crate::style::{self, StyleFeatures};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_LEN: usize = 2000;

/// Remembered prompts, oldest first. Never holds blank entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    prompts: Vec<String>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the trimmed prompt and drops the oldest entries beyond `max_len`.
    /// Returns `false` and changes nothing for a blank prompt.
    pub fn add_prompt(&mut self, prompt: &str, max_len: usize) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }
        self.prompts.push(prompt.to_string());
        if self.prompts.len() > max_len {
            let excess = self.prompts.len() - max_len;
            self.prompts.drain(..excess);
        }
        true
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Memory {
    /// Collects prompts through the same trimming rule the file loader uses.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let prompts = iter
            .into_iter()
            .map(Into::into)
            .filter_map(|p| {
                let trimmed = p.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();
        Self { prompts }
    }
}

/// One element of a memory file, in any shape that has been written so far.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Prompt(String),
    /// Older files stored whole exchanges; only the prompt survives migration.
    Exchange(Map<String, Value>),
    Unrecognised(Value),
}

/// Normalises a stored document to `Memory`. The first element decides the
/// shape; `None` means the shape is not one we know.
fn normalize(entries: Vec<StoredEntry>) -> Option<Memory> {
    match entries.first() {
        None => Some(Memory::new()),
        Some(StoredEntry::Prompt(_)) => Some(
            entries
                .into_iter()
                .filter_map(|e| match e {
                    StoredEntry::Prompt(p) => Some(p),
                    _ => None,
                })
                .collect(),
        ),
        Some(StoredEntry::Exchange(first)) if first.contains_key("prompt") => entries
            .into_iter()
            .map(|e| match e {
                StoredEntry::Exchange(mut fields) => match fields.remove("prompt") {
                    None => Some(String::new()),
                    Some(Value::String(prompt)) => Some(prompt),
                    Some(_) => None,
                },
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Memory::from_iter),
        Some(_) => None,
    }
}

/// Reads the memory file. Every failure degrades to an empty memory.
pub fn load_memory<P: AsRef<Path>>(path: P) -> Memory {
    let path = path.as_ref();
    if !path.exists() {
        debug!("No memory file at {:?}; starting empty", path);
        return Memory::new();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Could not read memory file {:?}: {}", path, e);
            return Memory::new();
        }
    };
    let entries: Vec<StoredEntry> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring malformed memory file {:?}: {}", path, e);
            return Memory::new();
        }
    };
    normalize(entries).unwrap_or_else(|| {
        warn!("Ignoring memory file {:?} with an unrecognised layout", path);
        Memory::new()
    })
}

/// Writes the prompts as a plain JSON string array.
pub fn save_memory<P: AsRef<Path>>(path: P, memory: &Memory) -> StilResult<()> {
    write_json_atomic(path.as_ref(), &memory.prompts, true)
}

/// Mean style features over every remembered prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleProfile(StyleFeatures);

impl StyleProfile {
    pub fn features(&self) -> &StyleFeatures {
        &self.0
    }
}

/// `None` for an empty memory, otherwise the key-by-key mean of `extract(p)`.
pub fn build_profile(memory: &Memory) -> Option<StyleProfile> {
    if memory.is_empty() {
        return None;
    }
    let mut acc = [0.0f64; 8];
    for prompt in memory.prompts() {
        for (slot, value) in acc.iter_mut().zip(style::extract(prompt).as_array()) {
            *slot += value;
        }
    }
    let count = memory.len() as f64;
    Some(StyleProfile(StyleFeatures::from_array(acc.map(|v| v / count))))
}

/// Cosine similarity between the features of `text` and the profile.
/// Zero without a profile or when either vector has zero norm.
pub fn similarity(text: &str, profile: Option<&StyleProfile>) -> f64 {
    let Some(profile) = profile else {
        return 0.0;
    };
    let features = style::extract(text);
    let (norm_text, norm_profile) = (features.norm(), profile.0.norm());
    if norm_text == 0.0 || norm_profile == 0.0 {
        return 0.0;
    }
    let dot: f64 = features
        .as_array()
        .iter()
        .zip(profile.0.as_array())
        .map(|(a, b)| a * b)
        .sum();
    (dot / (norm_text * norm_profile)).clamp(0.0, 1.0)
}

/// Owns the memory and its profile, and keeps the file in step with both.
///
/// The profile is only ever rebuilt from the full memory, never patched.
#[derive(Debug)]
pub struct StyleStore {
    path: PathBuf,
    max_len: usize,
    memory: Memory,
    profile: Option<StyleProfile>,
}

impl StyleStore {
    pub fn open<P: Into<PathBuf>>(path: P, max_len: usize) -> Self {
        let path = path.into();
        let memory = load_memory(&path);
        info!("Memory holds {} remembered prompts", memory.len());
        Self::with_memory(path, max_len, memory)
    }

    pub fn with_memory<P: Into<PathBuf>>(path: P, max_len: usize, mut memory: Memory) -> Self {
        if memory.len() > max_len {
            let excess = memory.len() - max_len;
            memory.prompts.drain(..excess);
        }
        let profile = build_profile(&memory);
        Self { path: path.into(), max_len, memory, profile }
    }

    /// Commits an accepted prompt: append, persist, rebuild the profile.
    /// Returns `Ok(false)` for a blank prompt, which is ignored.
    pub fn accept(&mut self, prompt: &str) -> StilResult<bool> {
        if !self.memory.add_prompt(prompt, self.max_len) {
            return Ok(false);
        }
        self.profile = build_profile(&self.memory);
        save_memory(&self.path, &self.memory)?;
        Ok(true)
    }

    pub fn save(&self) -> StilResult<()> {
        save_memory(&self.path, &self.memory)
    }

    /// Final save on shutdown.
    pub fn close(self) -> StilResult<()> {
        self.save()
    }

    pub fn profile(&self) -> Option<&StyleProfile> {
        self.profile.as_ref()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("memory.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn add_prompt_trims_and_rejects_blank() {
        let mut memory = Memory::new();
        assert!(!memory.add_prompt("   \n", 5));
        assert!(memory.add_prompt("  Hallo Welt  ", 5));
        assert_eq!(memory.prompts(), &["Hallo Welt"]);
    }

    #[test]
    fn add_prompt_keeps_most_recent() {
        let mut memory = Memory::new();
        for p in ["eins", "zwei", "drei", "vier"] {
            memory.add_prompt(p, 3);
            assert!(memory.len() <= 3);
        }
        assert_eq!(memory.prompts(), &["zwei", "drei", "vier"]);
    }

    #[test]
    fn loads_plain_prompt_list() {
        let dir = tempdir().unwrap();
        let path = write(&dir, r#"["  Erste Frage ", "", "Zweite", 7]"#);
        assert_eq!(load_memory(&path).prompts(), &["Erste Frage", "Zweite"]);
    }

    #[test]
    fn migrates_legacy_exchanges() {
        let dir = tempdir().unwrap();
        let path = write(
            &dir,
            r#"[{"prompt": "Was ist Energie?", "answer": "Energie ist ..."},
                {"answer": "ohne Frage"},
                {"prompt": "  "}]"#,
        );
        assert_eq!(load_memory(&path).prompts(), &["Was ist Energie?"]);
    }

    #[test]
    fn unrecognised_or_broken_files_load_empty() {
        let dir = tempdir().unwrap();
        for body in [r#"{"prompts": ["a"]}"#, "not json", r#"[{"answer": "x"}]"#, r#"[{"prompt": "a"}, "b"]"#, "[]"] {
            let path = write(&dir, body);
            assert!(load_memory(&path).is_empty(), "expected empty memory for {body}");
        }
        assert!(load_memory(dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn save_writes_plain_string_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let memory: Memory = ["Grüße", "Wie geht's?"].into_iter().collect();
        save_memory(&path, &memory).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Grüße"));
        let back: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, vec!["Grüße", "Wie geht's?"]);
        assert_eq!(load_memory(&path), memory);
    }

    #[test]
    fn profile_is_absent_for_empty_memory() {
        assert!(build_profile(&Memory::new()).is_none());
    }

    #[test]
    fn single_prompt_profile_equals_its_features() {
        let memory: Memory = ["Ich lerne heute Mathematik."].into_iter().collect();
        let profile = build_profile(&memory).unwrap();
        assert_eq!(*profile.features(), style::extract("Ich lerne heute Mathematik."));
    }

    #[test]
    fn profile_is_the_mean() {
        let memory: Memory = ["Ja.", "Nein, niemals!"].into_iter().collect();
        let profile = build_profile(&memory).unwrap();
        let a = style::extract("Ja.").avg_token_length;
        let b = style::extract("Nein, niemals!").avg_token_length;
        assert!((profile.features().avg_token_length - (a + b) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn similarity_bounds() {
        let memory: Memory = ["Das Wetter ist heute wirklich schön.", "Wir gehen in den Park."]
            .into_iter()
            .collect();
        let profile = build_profile(&memory);

        assert_eq!(similarity("Irgendein Text.", None), 0.0);
        assert_eq!(similarity("", profile.as_ref()), 0.0);
        for text in ["Hallo.", "aaaa bbbb", "Das Wetter ist heute schön.", "!!! ??? ..."] {
            let s = similarity(text, profile.as_ref());
            assert!((0.0..=1.0).contains(&s), "{text} -> {s}");
        }
        let own = similarity("Das Wetter ist heute wirklich schön.", profile.as_ref());
        assert!(own > 0.9);
    }

    #[test]
    fn store_accept_persists_and_rebuilds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let mut store = StyleStore::open(&path, 2);
        assert!(store.profile().is_none());

        assert!(!store.accept("   ").unwrap());
        assert!(!path.exists());

        assert!(store.accept("Erste Frage?").unwrap());
        assert_eq!(*store.profile().unwrap().features(), style::extract("Erste Frage?"));
        store.accept("Zweite Frage?").unwrap();
        store.accept("Dritte Frage?").unwrap();

        assert_eq!(store.memory().prompts(), &["Zweite Frage?", "Dritte Frage?"]);
        assert_eq!(load_memory(&path), *store.memory());
        assert_eq!(store.profile().copied(), build_profile(store.memory()));
    }

    #[test]
    fn store_truncates_oversized_memory_on_open() {
        let dir = tempdir().unwrap();
        let path = write(&dir, r#"["a", "b", "c"]"#);
        let store = StyleStore::open(&path, 2);
        assert_eq!(store.memory().prompts(), &["b", "c"]);
    }
}
