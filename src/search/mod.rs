//! Similarity search over transcript chunks.
//!
//! Wraps the vector store with query embedding, metadata filtering, and the
//! intent-driven search path that extracts filters from free text.

mod engine;
pub mod metadata;

pub use engine::SearchEngine;
pub use metadata::{EpisodeMetadata, MetadataExtractor};

use crate::vector_store::ScoredChunk;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transcript search query.
///
/// Filter fields form a conjunction; leaving them all unset means an
/// unfiltered search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text to embed and match against chunk embeddings.
    pub query_text: String,
    /// Maximum results to return.
    pub max_results: Option<usize>,
    /// Minimum relevance score for the ranked intent path.
    pub min_relevance_score: Option<f32>,
    /// Filter: episode air date.
    pub episode_date: Option<NaiveDate>,
    /// Filter: episode number.
    pub episode_number: Option<i64>,
    /// Filter: episode title.
    pub episode_title: Option<String>,
    /// Filter: chunk topic label.
    pub chunk_topic: Option<String>,
    /// Filter: single topic within the chunk's topic list.
    pub topic: Option<String>,
}

/// A matched chunk, denormalized for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: Uuid,
    pub text: String,
    pub episode_number: String,
    pub episode_date: NaiveDate,
    pub episode_title: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub chunk_topic: String,
    pub topics: String,
    pub relevance_score: f32,
}

impl From<ScoredChunk> for SearchRecord {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            id: scored.chunk.id,
            text: scored.chunk.text,
            episode_number: scored.chunk.episode_number,
            episode_date: scored.chunk.episode_date,
            episode_title: scored.chunk.episode_title,
            start_seconds: scored.chunk.start_seconds,
            end_seconds: scored.chunk.end_seconds,
            chunk_topic: scored.chunk.chunk_topic,
            topics: scored.chunk.topics,
            relevance_score: scored.score,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchRecord>,
    /// Total chunks matching the filter, before paging.
    pub total_results: usize,
}

/// Structured success/failure envelope for the service boundary.
///
/// Callers outside the crate always get this shape; provider failures are
/// reduced to a human-readable message.
#[derive(Debug, Serialize)]
pub struct SearchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<SearchResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<crate::error::Result<SearchResponse>> for SearchOutcome {
    fn from(result: crate::error::Result<SearchResponse>) -> Self {
        match result {
            Ok(response) => Self {
                success: true,
                response: Some(response),
                error_message: None,
            },
            Err(e) => Self {
                success: false,
                response: None,
                error_message: Some(e.to_string()),
            },
        }
    }
}
