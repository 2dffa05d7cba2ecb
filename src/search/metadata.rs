//! Best-effort extraction of structured filters from free-text intent.
//!
//! A single low-temperature completion call turns a user query into episode
//! metadata. Extraction failures always degrade to the empty metadata
//! object; they never block the search that follows.

use crate::completion::{CompletionParams, CompletionProvider};
use crate::config::Prompts;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

const EXTRACTION_MAX_TOKENS: u32 = 200;

/// Metadata mentioned in a user query. All fields optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeMetadata {
    pub episode_number: Option<i64>,
    pub episode_title: Option<String>,
    pub episode_date: Option<NaiveDate>,
    pub topic: Option<String>,
}

/// Wire shape of the model's JSON response, before re-validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMetadata {
    episode_number: Option<i64>,
    episode_title: Option<String>,
    episode_date: Option<String>,
    topic: Option<String>,
}

/// Extracts episode metadata from free text via a completion call.
pub struct MetadataExtractor {
    completion: Arc<dyn CompletionProvider>,
    prompts: Prompts,
}

impl MetadataExtractor {
    /// Create a new extractor.
    pub fn new(completion: Arc<dyn CompletionProvider>, prompts: Prompts) -> Self {
        Self {
            completion,
            prompts,
        }
    }

    /// Extract metadata from a user query.
    ///
    /// Never fails: completion or parse errors yield the empty object.
    #[instrument(skip(self, user_intent))]
    pub async fn extract(&self, user_intent: &str) -> EpisodeMetadata {
        let mut vars = HashMap::new();
        vars.insert("user_intent".to_string(), user_intent.to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.extraction.user, &vars);

        let params = CompletionParams {
            max_tokens: Some(EXTRACTION_MAX_TOKENS),
            temperature: 0.0,
            top_p: 1.0,
        };

        match self.completion.complete(&prompt, params).await {
            Ok(response) => parse_metadata(&response),
            Err(e) => {
                warn!("Metadata extraction call failed: {}", e);
                EpisodeMetadata::default()
            }
        }
    }
}

/// Parse the model response into validated metadata.
///
/// The JSON object is located inside whatever prose surrounds it, and every
/// field is re-validated; anything that does not check out is dropped.
pub fn parse_metadata(response: &str) -> EpisodeMetadata {
    let json_start = response.find('{');
    let json_end = response.rfind('}');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    let raw: RawMetadata = match serde_json::from_str(json_str) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to parse metadata JSON from LLM response: {}", e);
            return EpisodeMetadata::default();
        }
    };

    EpisodeMetadata {
        episode_number: raw.episode_number.filter(|n| *n >= 0),
        episode_title: raw.episode_title.filter(|t| !t.trim().is_empty()),
        episode_date: raw
            .episode_date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        topic: raw.topic.filter(|t| !t.trim().is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, UndreError};
    use async_trait::async_trait;

    struct CannedCompletion(Option<String>);

    #[async_trait]
    impl CompletionProvider for CannedCompletion {
        async fn complete(&self, _prompt: &str, _params: CompletionParams) -> Result<String> {
            self.0
                .clone()
                .ok_or_else(|| UndreError::Completion("down".to_string()))
        }
    }

    #[test]
    fn test_parse_full_object() {
        let meta = parse_metadata(
            r#"{"episode_number": 510, "episode_title": "The Title", "episode_date": "2022-01-01", "topic": "History"}"#,
        );
        assert_eq!(meta.episode_number, Some(510));
        assert_eq!(meta.episode_title.as_deref(), Some("The Title"));
        assert_eq!(
            meta.episode_date,
            Some(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap())
        );
        assert_eq!(meta.topic.as_deref(), Some("History"));
    }

    #[test]
    fn test_parse_object_wrapped_in_prose() {
        let meta = parse_metadata(
            "Here you go:\n```json\n{\"episode_number\": 201}\n```\nHope that helps!",
        );
        assert_eq!(meta.episode_number, Some(201));
        assert!(meta.topic.is_none());
    }

    #[test]
    fn test_parse_garbage_yields_empty_object() {
        assert_eq!(parse_metadata("no json here"), EpisodeMetadata::default());
        assert_eq!(parse_metadata("{broken"), EpisodeMetadata::default());
    }

    #[test]
    fn test_invalid_fields_are_dropped_not_fatal() {
        let meta = parse_metadata(
            r#"{"episode_number": -4, "episode_title": "  ", "episode_date": "January 1st", "topic": "History"}"#,
        );
        assert!(meta.episode_number.is_none());
        assert!(meta.episode_title.is_none());
        assert!(meta.episode_date.is_none());
        assert_eq!(meta.topic.as_deref(), Some("History"));
    }

    #[tokio::test]
    async fn test_extract_survives_provider_failure() {
        let extractor = MetadataExtractor::new(
            std::sync::Arc::new(CannedCompletion(None)),
            Prompts::default(),
        );
        let meta = extractor.extract("anything about episode 510").await;
        assert_eq!(meta, EpisodeMetadata::default());
    }

    #[tokio::test]
    async fn test_extract_parses_provider_response() {
        let extractor = MetadataExtractor::new(
            std::sync::Arc::new(CannedCompletion(Some(
                r#"{"episode_number": 510}"#.to_string(),
            ))),
            Prompts::default(),
        );
        let meta = extractor.extract("tell me about episode 510").await;
        assert_eq!(meta.episode_number, Some(510));
    }
}
