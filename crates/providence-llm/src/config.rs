//! Backend selection from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `PROVIDENCE_LLM_BACKEND` | `gemini` |
//! | `PROVIDENCE_LLM_API_URL` | the backend's public endpoint |
//! | `PROVIDENCE_LLM_API_KEY` | unset (generation disabled) |
//! | `PROVIDENCE_LLM_MODEL` | the backend's default model |
//! | `PROVIDENCE_LLM_TIMEOUT_MS` | `30000` |

use std::time::Duration;

use crate::error::LlmError;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Keys copied from sample `.env` files are treated as absent.
const PLACEHOLDER_KEYS: [&str; 2] = ["your_api_key_here", "changeme"];

/// Supported generation APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Google `generateContent`.
    Gemini,
    /// `OpenAI`-compatible chat completions (also `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages.
    Anthropic,
}

impl BackendKind {
    /// Parse a backend name. Aliases follow the providers' common names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" | "deepseek" | "ollama" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    /// Public endpoint used when no URL is configured.
    pub const fn default_api_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Model used when none is configured.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }
}

/// Connection settings for one generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// Which API dialect to speak.
    pub backend: BackendKind,
    /// Base URL, without a trailing slash.
    pub api_url: String,
    /// API key. `None` disables generation.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl LlmConfig {
    /// A config for `backend` with its defaults and no key.
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            api_url: backend.default_api_url().to_owned(),
            api_key: None,
            model: backend.default_model().to_owned(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] for an unknown backend name or a
    /// timeout that is not a whole number of milliseconds.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let backend = match var("PROVIDENCE_LLM_BACKEND") {
            Some(name) => BackendKind::parse(&name)
                .ok_or_else(|| LlmError::Config(format!("unknown backend type: {name}")))?,
            None => BackendKind::Gemini,
        };

        let timeout_ms: u64 = var("PROVIDENCE_LLM_TIMEOUT_MS")
            .map_or(Ok(DEFAULT_TIMEOUT_MS), |raw| raw.trim().parse())
            .map_err(|e| LlmError::Config(format!("invalid PROVIDENCE_LLM_TIMEOUT_MS: {e}")))?;

        let api_key = var("PROVIDENCE_LLM_API_KEY")
            .map(|key| key.trim().to_owned())
            .filter(|key| !PLACEHOLDER_KEYS.contains(&key.as_str()));

        Ok(Self {
            backend,
            api_url: var("PROVIDENCE_LLM_API_URL")
                .map_or_else(
                    || backend.default_api_url().to_owned(),
                    |url| url.trim().to_owned(),
                )
                .trim_end_matches('/')
                .to_owned(),
            api_key,
            model: var("PROVIDENCE_LLM_MODEL")
                .map_or_else(|| backend.default_model().to_owned(), |model| model.trim().to_owned()),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_is_keyless_gemini() {
        let config = LlmConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LlmConfig::for_backend(BackendKind::Gemini));
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn explicit_values_win() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("PROVIDENCE_LLM_BACKEND", "Claude"),
            ("PROVIDENCE_LLM_API_URL", "http://localhost:9000/v1/"),
            ("PROVIDENCE_LLM_API_KEY", " sk-test "),
            ("PROVIDENCE_LLM_MODEL", "claude-haiku"),
            ("PROVIDENCE_LLM_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(config.backend, BackendKind::Anthropic);
        assert_eq!(config.api_url, "http://localhost:9000/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "claude-haiku");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn placeholder_key_counts_as_missing() {
        let config =
            LlmConfig::from_lookup(lookup(&[("PROVIDENCE_LLM_API_KEY", "your_api_key_here")]))
                .unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn bad_values_are_config_errors() {
        let backend = LlmConfig::from_lookup(lookup(&[("PROVIDENCE_LLM_BACKEND", "hal9000")]));
        assert!(matches!(backend, Err(LlmError::Config(_))));

        let timeout = LlmConfig::from_lookup(lookup(&[("PROVIDENCE_LLM_TIMEOUT_MS", "soon")]));
        assert!(matches!(timeout, Err(LlmError::Config(_))));
    }

    #[test]
    fn backend_aliases() {
        assert_eq!(BackendKind::parse("ollama"), Some(BackendKind::OpenAi));
        assert_eq!(BackendKind::parse("GOOGLE"), Some(BackendKind::Gemini));
        assert_eq!(BackendKind::parse(""), None);
    }
}
