//! Error types for backend setup.
//!
//! Request-time failures are reported as
//! [`GenerationError`](providence_core::generation::GenerationError) so the
//! simulation can fall back without knowing which backend is in use.

/// Errors building a generation client.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
