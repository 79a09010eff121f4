//! [`LlmClient`]: the [`ContentGenerator`] the engine hands to the
//! simulation.

use providence_core::generation::{ContentGenerator, GenerationError, GenerationOptions};
use tracing::{debug, info, warn};

use crate::backend::LlmBackend;
use crate::config::LlmConfig;
use crate::error::LlmError;

/// Generation client over an optional HTTP backend.
///
/// Without an API key the client is constructed anyway and reports itself
/// unavailable, so the simulation runs entirely on routines and fallbacks.
#[derive(Debug)]
pub struct LlmClient {
    backend: Option<LlmBackend>,
}

impl LlmClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let Some(api_key) = config.api_key.clone() else {
            warn!(
                backend = ?config.backend,
                "No generation API key configured; running on routines and fallbacks"
            );
            return Ok(Self::disabled());
        };

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let backend = LlmBackend::new(client, config, api_key);
        info!(
            backend = backend.name(),
            model = backend.model(),
            timeout_ms = u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
            "Generation backend configured"
        );
        Ok(Self {
            backend: Some(backend),
        })
    }

    /// A client that never attempts a request.
    pub const fn disabled() -> Self {
        Self { backend: None }
    }

    /// The configured backend, if any.
    pub const fn backend(&self) -> Option<&LlmBackend> {
        self.backend.as_ref()
    }
}

impl ContentGenerator for LlmClient {
    fn available(&self) -> bool {
        self.backend.is_some()
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let backend = self.backend.as_ref().ok_or(GenerationError::Unavailable)?;
        debug!(
            backend = backend.name(),
            prompt_len = prompt.len(),
            "Calling generation backend"
        );

        match backend.complete(prompt, options).await {
            Ok(text) => {
                debug!(
                    backend = backend.name(),
                    response_len = text.len(),
                    "Generation call succeeded"
                );
                Ok(text)
            }
            Err(error) => {
                warn!(backend = backend.name(), %error, "Generation call failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    #[test]
    fn keyless_config_is_unavailable() {
        let client = LlmClient::from_config(&LlmConfig::for_backend(BackendKind::Gemini)).unwrap();
        assert!(!client.available());
        assert!(client.backend().is_none());
    }

    #[test]
    fn keyed_config_is_available() {
        let config = LlmConfig {
            api_key: Some("k".to_owned()),
            ..LlmConfig::for_backend(BackendKind::Anthropic)
        };
        let client = LlmClient::from_config(&config).unwrap();
        assert!(client.available());
        assert_eq!(client.backend().map(LlmBackend::name), Some("anthropic"));
    }

    #[tokio::test]
    async fn disabled_client_refuses_requests() {
        let client = LlmClient::disabled();
        let text = client.generate_text("hello", GenerationOptions::default()).await;
        assert_eq!(text, Err(GenerationError::Unavailable));
        let structured = client
            .generate_structured("hello", GenerationOptions::default())
            .await;
        assert_eq!(structured, Err(GenerationError::Unavailable));
    }
}
