//! HTTP generation backends.
//!
//! Enum dispatch over the three supported API dialects. Each variant builds
//! its own request body and knows where its envelope keeps the generated
//! text; sending, status handling, and envelope decoding are shared.

use providence_core::generation::{GenerationError, GenerationOptions};
use serde::Serialize;
use serde_json::Value;

use crate::config::{BackendKind, LlmConfig};

/// Nucleus sampling sent to backends that accept it.
const TOP_P: f32 = 0.9;

/// A configured generation backend.
#[derive(Debug)]
pub enum LlmBackend {
    /// Google `generateContent`.
    Gemini(GeminiBackend),
    /// `OpenAI`-compatible chat completions.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Backend for `config`, sharing `client` for connection reuse.
    pub fn new(client: reqwest::Client, config: &LlmConfig, api_key: String) -> Self {
        let endpoint = Endpoint {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
        };
        match config.backend {
            BackendKind::Gemini => Self::Gemini(GeminiBackend { endpoint }),
            BackendKind::OpenAi => Self::OpenAi(OpenAiBackend { endpoint }),
            BackendKind::Anthropic => Self::Anthropic(AnthropicBackend { endpoint }),
        }
    }

    /// Send a single-turn prompt and return the generated text.
    ///
    /// # Errors
    ///
    /// [`GenerationError::Transport`] if no response arrives,
    /// [`GenerationError::Service`] for a non-success status, and
    /// [`GenerationError::MalformedEnvelope`] if the text cannot be found.
    pub async fn complete(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        match self {
            Self::Gemini(backend) => backend.complete(prompt, options).await,
            Self::OpenAi(backend) => backend.complete(prompt, options).await,
            Self::Anthropic(backend) => backend.complete(prompt, options).await,
        }
    }

    /// Name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Gemini(_) => "gemini",
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }

    /// Model identifier for logging.
    pub fn model(&self) -> &str {
        match self {
            Self::Gemini(backend) => &backend.endpoint.model,
            Self::OpenAi(backend) => &backend.endpoint.model,
            Self::Anthropic(backend) => &backend.endpoint.model,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared transport
// ---------------------------------------------------------------------------

struct Endpoint {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Send a prepared request and decode the JSON envelope.
async fn send(request: reqwest::RequestBuilder) -> Result<Value, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(GenerationError::Service {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| GenerationError::MalformedEnvelope(e.to_string()))
}

/// Follow `path` through nested objects and arrays to a string leaf.
fn text_at(envelope: &Value, path: &[PathStep]) -> Option<String> {
    path.iter()
        .try_fold(envelope, |value, step| match step {
            PathStep::Key(key) => value.get(key),
            PathStep::Index(index) => value.get(index),
        })
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

enum PathStep {
    Key(&'static str),
    Index(usize),
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Backend for Google's `generateContent` API.
///
/// Posts to `{api_url}/models/{model}:generateContent` with the key in the
/// `x-goog-api-key` header.
#[derive(Debug)]
pub struct GeminiBackend {
    endpoint: Endpoint,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: [GeminiContent<'a>; 1],
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
}

impl GeminiBackend {
    async fn complete(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let Endpoint {
            client,
            api_url,
            api_key,
            model,
        } = &self.endpoint;

        let body = GeminiRequest {
            contents: [GeminiContent {
                role: "user",
                parts: [GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                top_p: TOP_P,
            },
        };

        let envelope = send(
            client
                .post(format!("{api_url}/models/{model}:generateContent"))
                .header("x-goog-api-key", api_key)
                .json(&body),
        )
        .await?;

        extract_gemini_content(&envelope)
    }
}

/// Text of `candidates[0].content.parts[0].text`.
fn extract_gemini_content(envelope: &Value) -> Result<String, GenerationError> {
    use PathStep::{Index, Key};
    text_at(
        envelope,
        &[
            Key("candidates"),
            Index(0),
            Key("content"),
            Key("parts"),
            Index(0),
            Key("text"),
        ],
    )
    .ok_or_else(|| {
        GenerationError::MalformedEnvelope(
            "Gemini response missing candidates[0].content.parts[0].text".to_owned(),
        )
    })
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

/// Backend for `OpenAI`-compatible chat completions APIs.
///
/// Posts to `{api_url}/chat/completions` with a bearer token.
#[derive(Debug)]
pub struct OpenAiBackend {
    endpoint: Endpoint,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl OpenAiBackend {
    async fn complete(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let Endpoint {
            client,
            api_url,
            api_key,
            model,
        } = &self.endpoint;

        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            top_p: TOP_P,
        };

        let envelope = send(
            client
                .post(format!("{api_url}/chat/completions"))
                .bearer_auth(api_key)
                .json(&body),
        )
        .await?;

        extract_openai_content(&envelope)
    }
}

/// Text of `choices[0].message.content`.
fn extract_openai_content(envelope: &Value) -> Result<String, GenerationError> {
    use PathStep::{Index, Key};
    text_at(
        envelope,
        &[Key("choices"), Index(0), Key("message"), Key("content")],
    )
    .ok_or_else(|| {
        GenerationError::MalformedEnvelope(
            "OpenAI response missing choices[0].message.content".to_owned(),
        )
    })
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Posts to `{api_url}/messages` with `x-api-key` and a pinned
/// `anthropic-version`.
#[derive(Debug)]
pub struct AnthropicBackend {
    endpoint: Endpoint,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

impl AnthropicBackend {
    async fn complete(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let Endpoint {
            client,
            api_url,
            api_key,
            model,
        } = &self.endpoint;

        let body = MessagesRequest {
            model,
            max_tokens: options.max_output_tokens,
            temperature: options.temperature,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let envelope = send(
            client
                .post(format!("{api_url}/messages"))
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body),
        )
        .await?;

        extract_anthropic_content(&envelope)
    }
}

/// Text of `content[0].text`.
fn extract_anthropic_content(envelope: &Value) -> Result<String, GenerationError> {
    use PathStep::{Index, Key};
    text_at(envelope, &[Key("content"), Index(0), Key("text")]).ok_or_else(|| {
        GenerationError::MalformedEnvelope(
            "Anthropic response missing content[0].text".to_owned(),
        )
    })
}
