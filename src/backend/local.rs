//! In-process bigram model.
//!
//! Trained once at construction from a poem corpus: every word maps to the
//! words that followed it. Generation continues from the last word of the
//! context and walks the chain for a bounded number of words.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::config::LocalBackendConfig;
use crate::error::{Result, VirelyaError};

use super::{clean_candidates, Corpus, GenerationBackend};

/// Sampling attempts per requested suggestion before giving up on duplicates.
const ATTEMPTS_PER_SUGGESTION: usize = 4;

/// Word-bigram generator.
pub struct LocalBackend {
    transitions: HashMap<String, Vec<String>>,
    starters: Vec<String>,
    max_words: usize,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("vocabulary", &self.transitions.len())
            .field("starters", &self.starters.len())
            .field("max_words", &self.max_words)
            .finish()
    }
}

fn key(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

impl LocalBackend {
    /// Train on `corpus`. `seed` fixes the sampling sequence.
    pub fn new(corpus: &Corpus, seed: Option<u64>, max_words: usize) -> Self {
        let mut transitions: HashMap<String, Vec<String>> = HashMap::new();
        let mut starters = Vec::new();

        for line in corpus.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            if let Some(first) = words.first() {
                starters.push(first.to_string());
            }
            for pair in words.windows(2) {
                let k = key(pair[0]);
                if !k.is_empty() {
                    transitions.entry(k).or_default().push(pair[1].to_string());
                }
            }
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        debug!(
            vocabulary = transitions.len(),
            starters = starters.len(),
            "Trained local bigram model"
        );

        Self {
            transitions,
            starters,
            max_words: max_words.max(1),
            rng: Mutex::new(rng),
        }
    }

    pub fn from_config(config: &LocalBackendConfig) -> Result<Self> {
        let corpus = Corpus::load_or_builtin(config.corpus_path.as_deref())?;
        Ok(Self::new(&corpus, config.seed, config.max_words))
    }

    fn sample_line(&self, rng: &mut StdRng, seed_word: Option<&str>) -> Option<String> {
        let first = seed_word
            .and_then(|w| self.transitions.get(&key(w)))
            .and_then(|next| next.choose(rng))
            .or_else(|| self.starters.choose(rng))?
            .clone();

        let mut words = vec![first];
        while words.len() < self.max_words {
            let last = words.last().map(|w| key(w)).unwrap_or_default();
            match self.transitions.get(&last).and_then(|next| next.choose(rng)) {
                Some(next) => words.push(next.clone()),
                None => break,
            }
        }
        Some(words.join(" "))
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    async fn generate(&self, lines: &[String], count: usize) -> Result<Vec<String>> {
        if self.starters.is_empty() {
            return Err(VirelyaError::BackendUnavailable(
                "local model has no training data".into(),
            ));
        }

        let seed_word = lines
            .iter()
            .rev()
            .find_map(|l| l.split_whitespace().last());

        let raw: Vec<String> = {
            let mut rng = self.rng.lock().map_err(|_| {
                VirelyaError::BackendUnavailable("local model state poisoned".into())
            })?;
            (0..count * ATTEMPTS_PER_SUGGESTION)
                .filter_map(|_| self.sample_line(&mut rng, seed_word))
                .collect()
        };

        Ok(clean_candidates(raw, count))
    }

    fn name(&self) -> &'static str {
        "local-bigram"
    }
}
