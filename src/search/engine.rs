//! The search engine: embedding, filtering, ranking, and the intent path.

use super::{MetadataExtractor, SearchQuery, SearchRecord, SearchResponse};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{meets_threshold, ChunkFilter, VectorStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Hard cap on how many candidates a single similarity search may pull,
/// regardless of the requested page size.
pub const SEARCH_TOP_K_CAP: usize = 100;

/// Defaults for the intent-driven first pass.
const INTENT_MAX_RESULTS: usize = 5;
const INTENT_MIN_RELEVANCE: f32 = 0.7;

/// The single broadened fallback pass: no filters, smaller page, stricter
/// relevance floor.
const BROADENED_MAX_RESULTS: usize = 3;
const BROADENED_MIN_RELEVANCE: f32 = 0.8;

/// Similarity search over the chunk store.
pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    extractor: MetadataExtractor,
}

impl SearchEngine {
    /// Create a new engine.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        extractor: MetadataExtractor,
    ) -> Self {
        Self {
            embedder,
            store,
            extractor,
        }
    }

    /// Run a structured search.
    ///
    /// Embeds the query (failure aborts the search), applies whatever
    /// filter fields are present, and returns the page in chronological
    /// start-time order alongside the total match count.
    #[instrument(skip(self, query), fields(query = %query.query_text))]
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let query_embedding = self.embedder.embed(&query.query_text).await?;

        let filter = filter_from_query(query);
        let top_k = query
            .max_results
            .unwrap_or(SEARCH_TOP_K_CAP)
            .min(SEARCH_TOP_K_CAP);

        let page = self
            .store
            .similarity_search(&query_embedding, &filter, top_k, 0)
            .await?;

        let mut results: Vec<SearchRecord> =
            page.results.into_iter().map(SearchRecord::from).collect();
        results.sort_by(|a, b| {
            a.start_seconds
                .partial_cmp(&b.start_seconds)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(SearchResponse {
            results,
            total_results: page.total_matches,
        })
    }

    /// Run an intent-driven search over free text.
    ///
    /// Extracts metadata filters from the text (best effort), searches with
    /// a relevance floor, and ranks the survivors by descending relevance.
    /// When the filtered set comes back empty, exactly one broadened pass
    /// runs without metadata filters and its result is returned, empty or
    /// not.
    #[instrument(skip(self, user_intent))]
    pub async fn search_with_intent(&self, user_intent: &str) -> Result<SearchResponse> {
        let metadata = self.extractor.extract(user_intent).await;

        let query = SearchQuery {
            query_text: user_intent.to_string(),
            max_results: Some(INTENT_MAX_RESULTS),
            min_relevance_score: Some(INTENT_MIN_RELEVANCE),
            episode_number: metadata.episode_number,
            episode_title: metadata.episode_title,
            episode_date: metadata.episode_date,
            topic: metadata.topic,
            chunk_topic: None,
        };

        let response = self.search(&query).await?;
        let ranked = rank_by_relevance(response, INTENT_MIN_RELEVANCE, INTENT_MAX_RESULTS);
        if !ranked.results.is_empty() {
            return Ok(ranked);
        }

        info!("No results with metadata filters, attempting one broadened search");

        let broadened = SearchQuery {
            query_text: user_intent.to_string(),
            max_results: Some(BROADENED_MAX_RESULTS),
            min_relevance_score: Some(BROADENED_MIN_RELEVANCE),
            ..Default::default()
        };

        let response = self.search(&broadened).await?;
        Ok(rank_by_relevance(
            response,
            BROADENED_MIN_RELEVANCE,
            BROADENED_MAX_RESULTS,
        ))
    }
}

/// Build the store filter from whichever query fields are present.
fn filter_from_query(query: &SearchQuery) -> ChunkFilter {
    ChunkFilter {
        episode_date: query.episode_date,
        episode_number: query.episode_number.map(|n| n.to_string()),
        episode_title: query.episode_title.clone(),
        chunk_topic: query.chunk_topic.clone(),
        topic: query.topic.clone(),
    }
}

/// Keep results at or above the floor, best match first, capped.
fn rank_by_relevance(
    response: SearchResponse,
    min_score: f32,
    max_results: usize,
) -> SearchResponse {
    let mut results: Vec<SearchRecord> = response
        .results
        .into_iter()
        .filter(|r| meets_threshold(r.relevance_score, min_score))
        .collect();
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(max_results);

    SearchResponse {
        total_results: results.len(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionParams, CompletionProvider};
    use crate::config::Prompts;
    use crate::error::UndreError;
    use crate::vector_store::{MemoryVectorStore, TranscriptChunk};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// Embedder with per-text canned vectors; unknown text gets the unit x axis.
    struct MockEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        fail: bool,
    }

    impl MockEmbedder {
        fn new() -> Self {
            Self {
                vectors: HashMap::new(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                vectors: HashMap::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            if self.fail {
                return Err(UndreError::Embedding("provider down".to_string()));
            }
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![1.0, 0.0, 0.0]))
        }

        async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct CannedCompletion(String);

    #[async_trait]
    impl CompletionProvider for CannedCompletion {
        async fn complete(
            &self,
            _prompt: &str,
            _params: CompletionParams,
        ) -> crate::error::Result<String> {
            Ok(self.0.clone())
        }
    }

    fn chunk(episode: &str, start: f64, text: &str, embedding: Vec<f32>) -> TranscriptChunk {
        let mut c = TranscriptChunk::new(
            text.to_string(),
            start,
            start + 30.0,
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            episode.to_string(),
            format!("Episode {}", episode),
            "general".to_string(),
            "history".to_string(),
        );
        c.embedding = embedding;
        c
    }

    async fn engine_with(
        chunks: Vec<TranscriptChunk>,
        extraction_response: &str,
    ) -> SearchEngine {
        let store = std::sync::Arc::new(MemoryVectorStore::new());
        store.upsert_batch(&chunks).await.unwrap();
        let extractor = MetadataExtractor::new(
            std::sync::Arc::new(CannedCompletion(extraction_response.to_string())),
            Prompts::default(),
        );
        SearchEngine::new(std::sync::Arc::new(MockEmbedder::new()), store, extractor)
    }

    #[tokio::test]
    async fn test_unfiltered_search_sorts_chronologically() {
        let engine = engine_with(
            vec![
                chunk("201", 300.0, "later", vec![1.0, 0.0, 0.0]),
                chunk("201", 0.0, "earlier", vec![0.9, 0.1, 0.0]),
                chunk("201", 150.0, "middle", vec![0.8, 0.2, 0.0]),
            ],
            "{}",
        )
        .await;

        let response = engine
            .search(&SearchQuery {
                query_text: "anything".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.total_results, 3);
        let starts: Vec<f64> = response.results.iter().map(|r| r.start_seconds).collect();
        assert_eq!(starts, vec![0.0, 150.0, 300.0]);
    }

    #[tokio::test]
    async fn test_episode_filter_excludes_other_episodes() {
        let engine = engine_with(
            vec![
                chunk("510", 0.0, "five ten a", vec![1.0, 0.0, 0.0]),
                chunk("510", 30.0, "five ten b", vec![1.0, 0.0, 0.0]),
                chunk("201", 0.0, "two oh one", vec![1.0, 0.0, 0.0]),
            ],
            "{}",
        )
        .await;

        let response = engine
            .search(&SearchQuery {
                query_text: "topic".to_string(),
                episode_number: Some(510),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.total_results, 2);
        assert!(response
            .results
            .iter()
            .all(|r| r.episode_number == "510"));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_search() {
        let store = std::sync::Arc::new(MemoryVectorStore::new());
        let extractor = MetadataExtractor::new(
            std::sync::Arc::new(CannedCompletion("{}".to_string())),
            Prompts::default(),
        );
        let engine =
            SearchEngine::new(std::sync::Arc::new(MockEmbedder::failing()), store, extractor);

        let result = engine
            .search(&SearchQuery {
                query_text: "anything".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(UndreError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_intent_search_ranks_by_relevance_and_caps() {
        let mut chunks = Vec::new();
        for i in 0..8 {
            chunks.push(chunk(
                "510",
                i as f64 * 30.0,
                &format!("chunk {}", i),
                vec![1.0, i as f32 * 0.05, 0.0],
            ));
        }
        let engine = engine_with(chunks, r#"{"episode_number": 510}"#).await;

        let response = engine.search_with_intent("episode 510 highlights").await.unwrap();

        assert!(response.results.len() <= 5);
        assert!(response
            .results
            .iter()
            .all(|r| r.relevance_score >= 0.7));
        let scores: Vec<f32> = response.results.iter().map(|r| r.relevance_score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(scores, sorted);
    }

    #[tokio::test]
    async fn test_intent_search_broadens_once_when_filters_miss() {
        // Metadata points at an episode that is not indexed; the fallback
        // drops the filter and finds the close match anyway.
        let engine = engine_with(
            vec![
                chunk("201", 0.0, "close match", vec![1.0, 0.0, 0.0]),
                chunk("201", 30.0, "far match", vec![0.0, 1.0, 0.0]),
            ],
            r#"{"episode_number": 999}"#,
        )
        .await;

        let response = engine.search_with_intent("something specific").await.unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].text, "close match");
        assert!(response.results[0].relevance_score >= 0.8);
    }

    #[tokio::test]
    async fn test_intent_search_returns_empty_when_fallback_misses_too() {
        let engine = engine_with(
            vec![chunk("201", 0.0, "far match", vec![0.0, 1.0, 0.0])],
            r#"{"episode_number": 999}"#,
        )
        .await;

        let response = engine.search_with_intent("something specific").await.unwrap();
        assert!(response.results.is_empty());
    }
}
