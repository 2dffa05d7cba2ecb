//! Configuration settings for Undre.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub vector_store: VectorStoreSettings,
    pub ingestion: IngestionSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.undre".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Completion provider settings, shared by metadata extraction and
/// question generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Completion provider (openai).
    pub provider: String,
    /// Chat model to use.
    pub model: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (memory). A durable backend plugs in behind
    /// the same trait.
    pub provider: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
        }
    }
}

/// Ingestion pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Directory scanned for transcript documents at startup.
    pub documents_dir: String,
    /// Chunks embedded and upserted per batch.
    pub batch_size: usize,
    /// How many batches may be in flight at once.
    pub max_concurrent_batches: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            documents_dir: "~/.undre/documents".to_string(),
            batch_size: 100,
            max_concurrent_batches: 2,
        }
    }
}

/// Question generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Transcript chunks sampled per generation pass.
    pub sample_size: usize,
    /// Candidate episodes when the store has none indexed yet.
    pub episode_pool: Vec<i64>,
    /// Delay before the first periodic pass (seconds).
    pub initial_delay_seconds: u64,
    /// Interval between periodic passes (seconds).
    pub interval_seconds: u64,
    /// Token budget for the generation response.
    pub max_response_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            sample_size: 5,
            episode_pool: vec![101, 201, 307, 401, 410, 504, 509, 510, 602, 606, 607, 608, 609],
            initial_delay_seconds: 300,
            interval_seconds: 86_400,
            max_response_tokens: 512,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::UndreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("undre")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded documents directory path.
    pub fn documents_dir(&self) -> PathBuf {
        Self::expand_path(&self.ingestion.documents_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.embedding.dimensions, 1536);
        assert_eq!(settings.ingestion.batch_size, 100);
        assert_eq!(settings.generation.sample_size, 5);
        assert!(!settings.generation.episode_pool.is_empty());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let settings = Settings::default();
        let content = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&content).unwrap();
        assert_eq!(parsed.generation.interval_seconds, settings.generation.interval_seconds);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Settings = toml::from_str("[generation]\nsample_size = 3\n").unwrap();
        assert_eq!(parsed.generation.sample_size, 3);
        assert_eq!(parsed.embedding.model, "text-embedding-3-small");
    }
}
