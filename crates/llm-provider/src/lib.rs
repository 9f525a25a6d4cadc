//! Text-completion collaborator used by the AI disambiguator.
//!
//! The provider contract is small: a prompt goes in, raw text
//! comes out. All structure is imposed by the caller's prompt and parser.

pub mod errors;
pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use errors::{LlmError, Result};
pub use mock::ScriptedProvider;
pub use ollama::{OllamaConfig, OllamaProvider};

/// Sampling options sent with every completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 400,
            top_p: 0.9,
            repeat_penalty: 1.1,
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Run one non-streaming completion and return the raw response text.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}
