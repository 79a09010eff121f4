//! HTTP generation backends for the Providence simulation.
//!
//! Provides [`LlmClient`], an implementation of
//! [`ContentGenerator`](providence_core::generation::ContentGenerator) that
//! talks to Gemini, an `OpenAI`-compatible endpoint, or Anthropic over
//! `reqwest`. The simulation never sees which one is in use.
//!
//! # Modules
//!
//! - [`backend`] -- Enum-dispatched API dialects and envelope extraction.
//! - [`client`] -- [`LlmClient`] and its availability rules.
//! - [`config`] -- [`LlmConfig`] loaded from `PROVIDENCE_LLM_*` variables.
//! - [`error`] -- Setup errors.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;

pub use client::LlmClient;
pub use config::{BackendKind, LlmConfig};
pub use error::LlmError;
