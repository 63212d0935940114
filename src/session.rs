// src/session.rs

//! One interactive session: conversation context, selection and memory together.

use crate::context::ContextManager;
use crate::error::StilResult;
use crate::memory::StyleStore;
use crate::sampler::Inference;
use crate::selection::{GenerationSettings, Selector};
use rand::Rng;
use tracing::warn;

pub const EMPTY_PROMPT_NOTICE: &str = "Bitte einen Prompt eingeben.";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The best candidate of a finished round.
    Answer { text: String, score: f64 },
    /// Nothing was generated; `message` is shown instead.
    Notice { message: String },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer { text, .. } => text,
            Reply::Notice { message } => message,
        }
    }
}

pub struct Session<M, R> {
    selector: Selector<M, R>,
    store: StyleStore,
    context: ContextManager,
    use_context: bool,
}

impl<M: Inference, R: Rng> Session<M, R> {
    pub fn new(selector: Selector<M, R>, store: StyleStore, context: ContextManager) -> Self {
        Self { selector, store, context, use_context: true }
    }

    pub fn with_context(mut self, enabled: bool) -> Self {
        self.use_context = enabled;
        self
    }

    /// Answers one prompt. Never fails: a failed round is logged and the
    /// prompt comes back unchanged as a notice.
    pub fn ask(&mut self, prompt: &str, settings: &GenerationSettings) -> Reply {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Reply::Notice { message: EMPTY_PROMPT_NOTICE.to_string() };
        }

        let generation_prompt = self.context.apply(prompt, self.use_context);
        match self.selector.select_best_for(&generation_prompt, prompt, settings, &mut self.store) {
            Ok(best) => {
                self.context.update(prompt, &best.text, self.use_context);
                Reply::Answer { text: best.text, score: best.score }
            }
            Err(e) => {
                warn!("Selection failed: {}", e);
                Reply::Notice { message: prompt.to_string() }
            }
        }
    }

    /// Starts a new conversation. Remembered prompts are kept.
    pub fn reset_context(&mut self) {
        self.context.reset();
    }

    pub fn store(&self) -> &StyleStore {
        &self.store
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    /// Persists the memory one last time.
    pub fn close(self) -> StilResult<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StilError;
    use crate::memory::load_memory;
    use crate::sampler::tests::FixedModel;
    use crate::sampler::CandidateSampler;
    use crate::scoring::Scorer;
    use crate::tokenizer::Vocabulary;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    const CORPUS: &str = "Vorheriger Kontext: Benutzer KI Neue Frage Warum? Was ist Licht. \n";

    fn session(dir: &tempfile::TempDir) -> Session<FixedModel, StdRng> {
        let vocab = Vocabulary::train(CORPUS, 256);
        let period = vocab.encode(".")[0];
        let model = FixedModel::new(vocab.len(), period);
        let sampler = CandidateSampler::new(vocab, model, 512, StdRng::seed_from_u64(1)).unwrap();
        let store = StyleStore::open(dir.path().join("memory.json"), 100);
        Session::new(Selector::new(sampler, Scorer::default()), store, ContextManager::default())
    }

    fn settings() -> GenerationSettings {
        GenerationSettings::new(2, 0.4, 0.5, 1)
    }

    #[test]
    fn empty_prompt_is_a_notice() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir);
        assert_eq!(session.ask("  \n", &settings()), Reply::Notice { message: EMPTY_PROMPT_NOTICE.into() });
        assert!(session.store().memory().is_empty());
    }

    #[test]
    fn follow_up_generates_with_context_but_remembers_raw_prompt() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir);

        let first = session.ask("Was ist Licht", &settings());
        assert_eq!(first.text(), "Was ist Licht.");

        let second = session.ask("Warum?", &settings());
        assert!(second.text().starts_with("Vorheriger Kontext:\nBenutzer: Was ist Licht\nKI: Was ist Licht.\n"));

        assert_eq!(session.store().memory().prompts(), &["Was ist Licht", "Warum?"]);
        assert_eq!(session.context().len(), 2);

        session.reset_context();
        assert!(session.context().is_empty());
        assert_eq!(session.ask("Warum?", &settings()).text(), "Warum?.");
    }

    #[test]
    fn close_persists_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let mut session = session(&dir);
        session.ask("Was ist Licht", &settings());
        session.close().unwrap();
        assert_eq!(load_memory(&path).prompts(), &["Was ist Licht"]);
    }

    struct OfflineModel;

    impl Inference for OfflineModel {
        fn infer(&self, _ids: &[u32]) -> StilResult<Vec<f32>> {
            Err(StilError::inference("model offline"))
        }
    }

    #[test]
    fn failed_round_returns_prompt_as_notice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let sampler = CandidateSampler::new(Vocabulary::train("abc", 8), OfflineModel, 8, StdRng::seed_from_u64(2)).unwrap();
        let store = StyleStore::open(&path, 100);
        let mut session = Session::new(Selector::new(sampler, Scorer::default()), store, ContextManager::default());

        assert_eq!(session.ask("  abc ", &settings()), Reply::Notice { message: "abc".into() });
        assert!(session.store().memory().is_empty());
        assert!(session.context().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn context_can_be_disabled() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir).with_context(false);
        session.ask("Was ist Licht", &settings());
        assert_eq!(session.ask("Warum?", &settings()).text(), "Warum?.");
        assert!(session.context().is_empty());
    }
}
