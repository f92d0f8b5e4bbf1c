//! Poem corpus used as style context.
//!
//! File format is a JSON array of poems, each with a `content` array of lines:
//!
//! ```json
//! [{ "title": "Dusk", "content": ["first line", "second line"] }]
//! ```

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VirelyaError};

/// One poem from the corpus.
#[derive(Debug, Clone, Deserialize)]
pub struct Poem {
    #[serde(default)]
    pub title: Option<String>,
    pub content: Vec<String>,
}

/// Collection of poems.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    poems: Vec<Poem>,
}

const BUILTIN: &[&[&str]] = &[
    &[
        "The moon hangs low over silver hills",
        "and the river sighs beneath the stars",
        "a quiet wind walks through the pines",
        "carrying the scent of distant rain",
    ],
    &[
        "I kept a lantern for the road",
        "the road kept nothing for me",
        "still the light went on before me",
        "over the fields of falling snow",
    ],
    &[
        "Morning breaks in amber and gold",
        "the sparrows gather on the wall",
        "and every window holds the sun",
        "as if the day would never fall",
    ],
    &[
        "The sea remembers every name",
        "it whispers them against the stone",
        "the tide returns to find the shore",
        "and leaves the salt of silver foam",
    ],
];

impl Corpus {
    pub fn new(poems: Vec<Poem>) -> Self {
        let poems = poems
            .into_iter()
            .filter(|p| p.content.iter().any(|l| !l.trim().is_empty()))
            .collect();
        Self { poems }
    }

    /// A small corpus compiled into the binary.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|lines| Poem {
                    title: None,
                    content: lines.iter().map(|l| l.to_string()).collect(),
                })
                .collect(),
        )
    }

    /// Load a JSON corpus from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            VirelyaError::Config(format!("failed to read corpus {}: {}", path.display(), e))
        })?;
        let poems: Vec<Poem> = serde_json::from_str(&data)
            .map_err(|e| VirelyaError::Config(format!("corpus {}: {}", path.display(), e)))?;
        let corpus = Self::new(poems);
        debug!(poems = corpus.len(), path = %path.display(), "Loaded corpus");
        Ok(corpus)
    }

    /// Load from `path` when given, otherwise use the built-in corpus.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin()),
        }
    }

    pub fn poems(&self) -> &[Poem] {
        &self.poems
    }

    pub fn len(&self) -> usize {
        self.poems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poems.is_empty()
    }

    /// Every non-empty line in the corpus.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.poems
            .iter()
            .flat_map(|p| p.content.iter())
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
    }

    /// Pick one poem at random and sample up to `n` of its non-blank lines.
    pub fn sample_style_lines<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<String> {
        let Some(poem) = self.poems.choose(rng) else {
            return Vec::new();
        };
        let lines: Vec<&str> = poem
            .content
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        lines
            .choose_multiple(rng, n.min(lines.len()))
            .map(|l| l.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_builtin_not_empty() {
        let corpus = Corpus::builtin();
        assert!(!corpus.is_empty());
        assert!(corpus.lines().count() >= 8);
    }

    #[test]
    fn test_load_json_corpus() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("poems.json");
        std::fs::write(
            &path,
            r#"[{"title": "t", "content": ["one line", "two line"]}, {"content": ["", " "]}]"#,
        )
        .unwrap();
        let corpus = Corpus::load(&path).unwrap();
        // The all-blank poem is dropped.
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.poems()[0].title.as_deref(), Some("t"));
    }

    #[test]
    fn test_load_missing_corpus_is_config_error() {
        let err = Corpus::load(Path::new("/nonexistent/poems.json")).unwrap_err();
        assert!(matches!(err, VirelyaError::Config(_)));
    }

    #[test]
    fn test_sample_style_lines_bounded() {
        let corpus = Corpus::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        let lines = corpus.sample_style_lines(&mut rng, 2);
        assert_eq!(lines.len(), 2);
        assert!(Corpus::default().sample_style_lines(&mut rng, 2).is_empty());
    }

    #[test]
    fn test_sample_style_lines_skips_blank_lines() {
        let corpus = Corpus::new(vec![Poem {
            title: None,
            content: vec!["".into(), "only words".into(), "   ".into()],
        }]);
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(corpus.sample_style_lines(&mut rng, 2), vec!["only words"]);
        }
    }
}
