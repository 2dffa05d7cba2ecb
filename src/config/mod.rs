//! Configuration module for Undre.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExtractionPrompts, GenerationPrompts, Prompts};
pub use settings::{
    CompletionSettings, EmbeddingSettings, GeneralSettings, GenerationSettings,
    IngestionSettings, PromptSettings, Settings, VectorStoreSettings,
};
