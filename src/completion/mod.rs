//! Chat completion abstraction.
//!
//! Both metadata extraction and question generation drive an LLM with a
//! single prompt; this trait keeps them off any concrete provider.

mod openai;

pub use openai::OpenAICompletion;

use crate::error::Result;
use async_trait::async_trait;

/// Sampling parameters for a completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    /// Maximum tokens to generate (None = provider default).
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

/// Trait for prompt-in, text-out completion providers.
///
/// The returned text carries no validity guarantees; callers parsing JSON
/// out of it must do so defensively.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run a single-prompt completion and return the raw response text.
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String>;
}
