//! Configuration types and loading.
//!
//! Config lives in `~/.virelya/config.json`. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.
//! Environment variables (optionally from a `.env` file) are applied on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VirelyaError};

/// Hard ceiling on suggestions per request.
pub const MAX_SUGGESTIONS: usize = 5;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: InputLimits,
    pub cache: CacheConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1).
    pub bind: String,
    /// Listen port (default: 8000, where the editor UI expects it).
    pub port: u16,
    /// Optional static bearer token required on `/suggest-line` and `/metrics`.
    pub api_token: Option<String>,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            api_token: None,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Bounds applied to incoming line arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLimits {
    pub max_lines: usize,
    pub max_line_chars: usize,
    pub max_total_chars: usize,
    /// Keep only the last `max_lines` lines instead of rejecting longer input.
    pub keep_last_lines: bool,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_lines: 3,
            max_line_chars: 80,
            max_total_chars: 240,
            keep_last_lines: false,
        }
    }
}

/// Suggestion cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached suggestion sets.
    pub capacity: usize,
    /// Where to load the cache from at startup and save it on shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            snapshot_path: None,
        }
    }
}

/// Which generation backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process bigram model (default, needs no credentials).
    #[default]
    Local,
    /// HTTP generation provider.
    Remote,
}

impl std::str::FromStr for BackendKind {
    type Err = VirelyaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(VirelyaError::Config(format!("unknown backend kind '{other}'"))),
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Per-call timeout applied to every backend invocation.
    pub timeout_secs: u64,
    /// Number of suggestions requested per call, clamped to 1..=5.
    pub suggestion_count: usize,
    pub remote: RemoteBackendConfig,
    pub local: LocalBackendConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            timeout_secs: 10,
            suggestion_count: 3,
            remote: RemoteBackendConfig::default(),
            local: LocalBackendConfig::default(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn effective_count(&self) -> usize {
        self.suggestion_count.clamp(1, MAX_SUGGESTIONS)
    }
}

/// Remote provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteBackendConfig {
    /// Base URL of the provider API.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    /// Optional style corpus sampled into the prompt.
    pub corpus_path: Option<PathBuf>,
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            bearer_token: None,
            corpus_path: None,
        }
    }
}

impl std::fmt::Debug for RemoteBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackendConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("corpus_path", &self.corpus_path)
            .finish()
    }
}

/// Local model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    /// JSON poem corpus; the built-in corpus is used when unset.
    pub corpus_path: Option<PathBuf>,
    /// Fixed RNG seed. Unset means seeded from entropy.
    pub seed: Option<u64>,
    /// Maximum words per generated line.
    pub max_words: usize,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            seed: None,
            max_words: 8,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Default config file location: `~/.virelya/config.json`.
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".virelya")
            .join("config.json")
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                let config: Config = serde_json::from_str(&data).map_err(|e| {
                    VirelyaError::Config(format!("{}: {}", path.display(), e))
                })?;
                debug!(path = %path.display(), "Loaded config file");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(VirelyaError::Config(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Load the file (default path when `None`), apply env overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let default_path = Self::path();
        let mut config = Self::load_from_path(path.unwrap_or(&default_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VIRELYA_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("VIRELYA_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("VIRELYA_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| VirelyaError::Config(format!("VIRELYA_PORT: invalid port '{port}'")))?;
        }
        if let Some(kind) = lookup("VIRELYA_BACKEND") {
            self.backend.kind = kind.parse()?;
        }
        if let Some(key) = lookup("VIRELYA_API_KEY").filter(|k| !k.is_empty()) {
            self.backend.remote.api_key = Some(key);
        }
        if let Some(secs) = lookup("VIRELYA_TIMEOUT_SECS") {
            self.backend.timeout_secs = secs.parse().map_err(|_| {
                VirelyaError::Config(format!("VIRELYA_TIMEOUT_SECS: invalid value '{secs}'"))
            })?;
        }
        Ok(())
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(VirelyaError::Config("cache.capacity must be at least 1".into()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(VirelyaError::Config(
                "backend.timeout_secs must be at least 1".into(),
            ));
        }
        if self.limits.max_lines == 0 || self.limits.max_line_chars == 0 {
            return Err(VirelyaError::Config(
                "limits.max_lines and limits.max_line_chars must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// JSON view with secrets replaced, for `virelya config`.
    pub fn redacted_json(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        for pointer in [
            "/server/api_token",
            "/backend/remote/api_key",
            "/backend/remote/bearer_token",
        ] {
            if let Some(field) = value.pointer_mut(pointer) {
                if !field.is_null() {
                    *field = serde_json::Value::String("[REDACTED]".into());
                }
            }
        }
        Ok(value)
    }
}
