//! The generation service capability.
//!
//! The [`ContentGenerator`] trait abstracts whatever produces day scripts
//! and oracle reactions. Transports live elsewhere; this module owns the
//! contract and the lenient JSON decoding shared by every implementation:
//!
//! 1. Strip a markdown code fence if present
//! 2. Take the outermost `{...}` span
//! 3. Decode, and on failure strip trailing commas and decode once more

use std::future::Future;

use serde_json::Value;

use crate::config::GenerationConfig;

/// Instruction appended to every structured prompt.
pub const JSON_ONLY_INSTRUCTION: &str = "\n\nIMPORTANT: Respond ONLY with valid JSON. \
    Do not include markdown code blocks, explanations, or any other text.";

/// Errors surfaced by a generation service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// No backend is configured.
    #[error("generation service is not configured")]
    Unavailable,

    /// The request never produced a response (connect, timeout, body read).
    #[error("generation transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("generation service returned {status}: {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The service answered, but not in its documented envelope.
    #[error("malformed generation envelope: {0}")]
    MalformedEnvelope(String),

    /// The generated text did not contain decodable JSON.
    #[error("invalid structured response: {0}")]
    InvalidStructuredResponse(String),
}

/// Sampling options for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    /// Options from the generation config.
    pub const fn from_config(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// A text generation service.
///
/// Implementations may be slow, absent, or return garbage. Callers check
/// [`available`](ContentGenerator::available) and treat every error as a
/// reason to fall back, never as fatal.
pub trait ContentGenerator: Send + Sync + 'static {
    /// Whether requests can be attempted at all.
    fn available(&self) -> bool;

    /// Generate free text for a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] on transport or service failure.
    fn generate_text(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;

    /// Generate a JSON value for a prompt.
    ///
    /// Appends [`JSON_ONLY_INSTRUCTION`] and decodes the answer with
    /// [`decode_structured`].
    ///
    /// # Errors
    ///
    /// Returns the transport error from
    /// [`generate_text`](ContentGenerator::generate_text), or
    /// [`GenerationError::InvalidStructuredResponse`] if no JSON object
    /// could be recovered.
    fn generate_structured(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> impl Future<Output = Result<Value, GenerationError>> + Send {
        let prompt = format!("{prompt}{JSON_ONLY_INSTRUCTION}");
        async move {
            let text = self.generate_text(&prompt, options).await?;
            decode_structured(&text)
        }
    }
}

/// A generator that is never available. Every request routes to fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

impl ContentGenerator for DisabledGenerator {
    fn available(&self) -> bool {
        false
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable)
    }
}

/// Recover a JSON object from generated text.
///
/// # Errors
///
/// Returns [`GenerationError::InvalidStructuredResponse`] if neither the
/// raw span nor its trailing-comma repair decodes.
pub fn decode_structured(text: &str) -> Result<Value, GenerationError> {
    let unfenced = strip_code_fence(text.trim());
    let candidate = outermost_object(unfenced).unwrap_or(unfenced);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first) => serde_json::from_str(&strip_trailing_commas(candidate)).map_err(|_repair| {
            GenerationError::InvalidStructuredResponse(format!(
                "{first} (after trailing-comma repair as well)"
            ))
        }),
    }
}

/// Contents of the first fenced block, or the input if there is none.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_fence = text.get(open..).and_then(|rest| rest.get(3..)).unwrap_or("");
    // Skip the language tag line (```json).
    let body = after_fence
        .find('\n')
        .and_then(|newline| after_fence.get(newline..))
        .unwrap_or(after_fence);
    body.find("```")
        .and_then(|close| body.get(..close))
        .unwrap_or(body)
        .trim()
}

/// Span from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Remove commas directly followed (ignoring whitespace) by `}` or `]`.
/// Commas inside string literals are preserved.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut pending = String::new();
                while let Some(ws) = chars.next_if(|next| next.is_whitespace()) {
                    pending.push(ws);
                }
                if !matches!(chars.peek(), Some('}' | ']')) {
                    out.push(',');
                }
                out.push_str(&pending);
            }
            _ => out.push(c),
        }
    }
    out
}
