//! Vector store abstraction for Undre.
//!
//! Provides a trait-based interface for vector database backends holding
//! embedded transcript chunks.

mod memory;

pub use memory::MemoryVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timestamped transcript chunk stored in the vector database.
///
/// Immutable once stored; re-ingesting identical content produces the same
/// identifier and overwrites in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptChunk {
    /// Unique chunk ID, assigned at ingestion.
    pub id: Uuid,
    /// Text content of this chunk.
    pub text: String,
    /// Start time within the episode (seconds).
    pub start_seconds: f64,
    /// End time within the episode (seconds).
    pub end_seconds: f64,
    /// Date the episode aired.
    pub episode_date: NaiveDate,
    /// Episode number, stored as a string key.
    pub episode_number: String,
    /// Episode title.
    pub episode_title: String,
    /// Topic label for this specific chunk.
    pub chunk_topic: String,
    /// Comma-separated free-text topic list.
    pub topics: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

impl TranscriptChunk {
    /// Create a new chunk with a deterministic identifier.
    ///
    /// The ID is a UUIDv5 over episode number, start time, and text, so
    /// ingesting the same content twice overwrites rather than duplicates.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: String,
        start_seconds: f64,
        end_seconds: f64,
        episode_date: NaiveDate,
        episode_number: String,
        episode_title: String,
        chunk_topic: String,
        topics: String,
    ) -> Self {
        let key = format!("{}:{}:{}", episode_number, start_seconds, text);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()),
            text,
            start_seconds,
            end_seconds,
            episode_date,
            episode_number,
            episode_title,
            chunk_topic,
            topics,
            embedding: Vec::new(),
        }
    }

    /// Split the comma-separated topics field into trimmed entries.
    pub fn topic_list(&self) -> Vec<&str> {
        self.topics
            .split(',')
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Format the start time for display.
    pub fn format_timestamp(&self) -> String {
        let total_seconds = self.start_seconds as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        }
    }
}

/// A conjunction of metadata constraints applied during similarity search.
///
/// Each present field adds one equality clause; `topic` adds a membership
/// clause over the comma-separated topics field. An empty filter matches
/// every chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkFilter {
    pub episode_date: Option<NaiveDate>,
    pub episode_number: Option<String>,
    pub episode_title: Option<String>,
    pub chunk_topic: Option<String>,
    pub topic: Option<String>,
}

impl ChunkFilter {
    /// True when no clause is present.
    pub fn is_empty(&self) -> bool {
        self.episode_date.is_none()
            && self.episode_number.is_none()
            && self.episode_title.is_none()
            && self.chunk_topic.is_none()
            && self.topic.is_none()
    }

    /// Evaluate the conjunction against a chunk.
    pub fn matches(&self, chunk: &TranscriptChunk) -> bool {
        if let Some(date) = self.episode_date {
            if chunk.episode_date != date {
                return false;
            }
        }
        if let Some(number) = &self.episode_number {
            if &chunk.episode_number != number {
                return false;
            }
        }
        if let Some(title) = &self.episode_title {
            if &chunk.episode_title != title {
                return false;
            }
        }
        if let Some(topic) = &self.chunk_topic {
            if &chunk.chunk_topic != topic {
                return false;
            }
        }
        if let Some(topic) = &self.topic {
            if !chunk.topic_list().iter().any(|t| t == topic) {
                return false;
            }
        }
        true
    }
}

/// A chunk matched by similarity search, with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: TranscriptChunk,
    /// Similarity score (higher is closer).
    pub score: f32,
}

/// One page of similarity-search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Matched chunks, best match first.
    pub results: Vec<ScoredChunk>,
    /// Total number of chunks matching the filter, before paging.
    pub total_matches: usize,
}

/// Whether a score clears the requested relevance floor.
///
/// Scores are cosine similarities: higher means closer, and thresholds are
/// inclusive lower bounds. Every threshold comparison in the crate goes
/// through here so the direction lives in one place.
pub fn meets_threshold(score: f32, min_score: f32) -> bool {
    score >= min_score
}

/// Ordering for ranked output: closest match first.
pub fn by_relevance(a: &ScoredChunk, b: &ScoredChunk) -> std::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert chunks; returns the stored identifiers in input order.
    async fn upsert_batch(&self, chunks: &[TranscriptChunk]) -> Result<Vec<Uuid>>;

    /// Top-K similarity search with a metadata filter.
    ///
    /// `total_matches` in the returned page counts every chunk passing the
    /// filter, not just the page returned.
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        top_k: usize,
        skip: usize,
    ) -> Result<SearchPage>;

    /// Distinct episode numbers currently indexed.
    async fn episode_numbers(&self) -> Result<Vec<String>>;

    /// Total stored chunk count.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
pub(crate) fn test_chunk(episode: &str, start: f64, text: &str) -> TranscriptChunk {
    TranscriptChunk::new(
        text.to_string(),
        start,
        start + 30.0,
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        episode.to_string(),
        format!("Episode {}", episode),
        "general".to_string(),
        "history, politics".to_string(),
    )
}
