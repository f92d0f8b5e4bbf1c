//! Remote generation provider speaking the Gemini `generateContent` REST shape.
//!
//! Auth priority: config key → VIRELYA_API_KEY → GEMINI_API_KEY → configured bearer token.
//!
//! One request asks for `count` candidates (`candidateCount`); each candidate's
//! text is reduced to its first line and deduplicated.

use std::time::Duration;

use async_trait::async_trait;
use rand::thread_rng;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::RemoteBackendConfig;
use crate::error::{Result, VirelyaError};

use super::{clean_candidates, Corpus, GenerationBackend};

/// Instruction line that opens every prompt.
const PROMPT_HEADER: &str = "Given these lines, suggest the next poetic line.";

/// Style lines sampled from the corpus into each prompt.
const STYLE_LINES: usize = 2;

/// Short continuations only; a poem line rarely needs more.
const MAX_OUTPUT_TOKENS: u32 = 30;

const TEMPERATURE: f64 = 0.9;
const TOP_K: u32 = 40;

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Authentication method for the provider API.
pub enum RemoteAuth {
    /// API key, sent as the `?key=` query parameter.
    ApiKey(String),
    /// OAuth bearer token, sent as `Authorization: Bearer`.
    BearerToken(String),
}

impl std::fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("RemoteAuth::ApiKey([REDACTED])"),
            Self::BearerToken(_) => f.write_str("RemoteAuth::BearerToken([REDACTED])"),
        }
    }
}

impl RemoteAuth {
    /// Resolve credentials in priority order, ignoring empty values.
    pub fn resolve(
        explicit_key: Option<&str>,
        env_key: Option<&str>,
        bearer_token: Option<&str>,
    ) -> Option<Self> {
        if let Some(k) = explicit_key.filter(|k| !k.is_empty()) {
            return Some(Self::ApiKey(k.to_string()));
        }
        if let Some(k) = env_key.filter(|k| !k.is_empty()) {
            return Some(Self::ApiKey(k.to_string()));
        }
        bearer_token
            .filter(|t| !t.is_empty())
            .map(|t| Self::BearerToken(t.to_string()))
    }
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// HTTP generation backend.
pub struct RemoteBackend {
    auth: RemoteAuth,
    endpoint: String,
    model: String,
    timeout: Duration,
    style: Option<Corpus>,
    client: Client,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("auth", &self.auth)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl RemoteBackend {
    pub fn new(auth: RemoteAuth, endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VirelyaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            auth,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            style: None,
            client,
        })
    }

    /// Attach a corpus whose lines are sampled into every prompt.
    pub fn with_style_corpus(mut self, corpus: Corpus) -> Self {
        self.style = Some(corpus);
        self
    }

    /// Build from config, resolving credentials from the environment.
    pub fn from_config(config: &RemoteBackendConfig, timeout: Duration) -> Result<Self> {
        let env_key = std::env::var("VIRELYA_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok();
        let auth = RemoteAuth::resolve(
            config.api_key.as_deref(),
            env_key.as_deref(),
            config.bearer_token.as_deref(),
        )
        .ok_or_else(|| {
            VirelyaError::Config(
                "remote backend needs backend.remote.api_key, VIRELYA_API_KEY or GEMINI_API_KEY"
                    .into(),
            )
        })?;

        let backend = Self::new(auth, &config.endpoint, &config.model, timeout)?;
        match &config.corpus_path {
            Some(path) => Ok(backend.with_style_corpus(Corpus::load(path)?)),
            None => Ok(backend),
        }
    }

    /// Prompt text: header, the user's lines, then sampled style lines.
    pub fn build_prompt(&self, lines: &[String]) -> String {
        let mut prompt = String::from(PROMPT_HEADER);
        prompt.push('\n');
        prompt.push_str(&lines.join("\n"));
        prompt.push('\n');
        if let Some(corpus) = &self.style {
            let style = corpus.sample_style_lines(&mut thread_rng(), STYLE_LINES);
            for line in style {
                prompt.push_str(&line);
                prompt.push('\n');
            }
        }
        prompt
    }

    /// `generateContent` request body asking for `count` candidates.
    pub fn build_request_body(&self, prompt: &str, count: usize) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "candidateCount": count,
                "temperature": TEMPERATURE,
                "topK": TOP_K,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        })
    }

    /// Text of every candidate, skipping `thought` parts.
    pub fn extract_candidates(response: &Value) -> Vec<String> {
        let Some(candidates) = response["candidates"].as_array() else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter_map(|c| c["content"]["parts"].as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter(|p| !p["thought"].as_bool().unwrap_or(false))
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
            .collect()
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            RemoteAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            RemoteAuth::BearerToken(token) => {
                request.header("Authorization", format!("Bearer {}", token))
            }
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> VirelyaError {
        if e.is_timeout() {
            VirelyaError::Timeout(self.timeout)
        } else {
            VirelyaError::BackendUnavailable(format!("provider request failed: {e}"))
        }
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    async fn generate(&self, lines: &[String], count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let body = self.build_request_body(&self.build_prompt(lines), count);

        debug!(model = %self.model, count, "Remote generation request");

        let request = self
            .client
            .post(self.api_url())
            .header("Content-Type", "application/json")
            .json(&body);

        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status().is_success() {
            let json: Value = response.json().await.map_err(|e| {
                VirelyaError::BackendUnavailable(format!("failed to parse provider response: {e}"))
            })?;
            return Ok(clean_candidates(Self::extract_candidates(&json), count));
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&error_text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or(error_text);

        warn!(status, "Provider returned an error");
        Err(VirelyaError::BackendUnavailable(format!(
            "provider returned HTTP {status}: {message}"
        )))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
