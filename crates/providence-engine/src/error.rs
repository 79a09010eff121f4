//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop startup, so `main`
//! can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: providence_core::config::ConfigError,
    },

    /// Prompt templates could not be loaded.
    #[error("prompt error: {source}")]
    Prompt {
        /// The underlying prompt error.
        #[from]
        source: providence_core::error::PromptError,
    },

    /// The generation backend could not be configured.
    #[error("generation backend error: {source}")]
    Llm {
        /// The underlying backend error.
        #[from]
        source: providence_llm::LlmError,
    },

    /// Observer API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: providence_observer::ServerError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the failure.
        message: String,
    },
}
