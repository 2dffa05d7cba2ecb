//! In-memory vector store implementation.
//!
//! The reference store for this crate. A durable backend can be swapped in
//! behind the same trait.

use super::{
    by_relevance, cosine_similarity, ChunkFilter, ScoredChunk, SearchPage, TranscriptChunk,
    VectorStore,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory vector store.
pub struct MemoryVectorStore {
    chunks: RwLock<HashMap<Uuid, TranscriptChunk>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, chunks: &[TranscriptChunk]) -> Result<Vec<Uuid>> {
        let mut store = self.chunks.write().unwrap();
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            store.insert(chunk.id, chunk.clone());
            ids.push(chunk.id);
        }
        Ok(ids)
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        top_k: usize,
        skip: usize,
    ) -> Result<SearchPage> {
        let chunks = self.chunks.read().unwrap();

        let mut results: Vec<ScoredChunk> = chunks
            .values()
            .filter(|chunk| filter.matches(chunk))
            .map(|chunk| ScoredChunk {
                score: cosine_similarity(query_embedding, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .collect();

        let total_matches = results.len();

        results.sort_by(by_relevance);
        let results = results.into_iter().skip(skip).take(top_k).collect();

        Ok(SearchPage {
            results,
            total_matches,
        })
    }

    async fn episode_numbers(&self) -> Result<Vec<String>> {
        let chunks = self.chunks.read().unwrap();
        let mut numbers: Vec<String> = chunks
            .values()
            .map(|c| c.episode_number.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        numbers.sort();
        Ok(numbers)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_chunk;
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_search() {
        let store = MemoryVectorStore::new();

        let mut doc1 = test_chunk("201", 0.0, "Hello world");
        doc1.embedding = vec![1.0, 0.0, 0.0];
        let mut doc2 = test_chunk("201", 30.0, "Goodbye world");
        doc2.embedding = vec![0.0, 1.0, 0.0];

        let ids = store.upsert_batch(&[doc1.clone(), doc2.clone()]).await.unwrap();
        assert_eq!(ids, vec![doc1.id, doc2.id]);
        assert_eq!(store.chunk_count().await.unwrap(), 2);

        let page = store
            .similarity_search(&[1.0, 0.0, 0.0], &ChunkFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total_matches, 2);
        assert_eq!(page.results.len(), 2);
        assert!(page.results[0].score > page.results[1].score);
        assert_eq!(page.results[0].chunk.text, "Hello world");
    }

    #[tokio::test]
    async fn test_upsert_same_id_overwrites() {
        let store = MemoryVectorStore::new();

        let chunk = test_chunk("201", 0.0, "Hello world");
        store.upsert_batch(&[chunk.clone()]).await.unwrap();
        store.upsert_batch(&[chunk]).await.unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_respects_episode_filter() {
        let store = MemoryVectorStore::new();

        let mut a = test_chunk("510", 0.0, "Episode five ten");
        a.embedding = vec![1.0, 0.0, 0.0];
        let mut b = test_chunk("201", 0.0, "Episode two oh one");
        b.embedding = vec![1.0, 0.0, 0.0];
        store.upsert_batch(&[a, b]).await.unwrap();

        let filter = ChunkFilter {
            episode_number: Some("510".to_string()),
            ..Default::default()
        };
        let page = store
            .similarity_search(&[1.0, 0.0, 0.0], &filter, 10, 0)
            .await
            .unwrap();

        assert_eq!(page.total_matches, 1);
        assert!(page.results.iter().all(|r| r.chunk.episode_number == "510"));
    }

    #[tokio::test]
    async fn test_top_k_and_skip_bound_the_page() {
        let store = MemoryVectorStore::new();

        let mut chunks = Vec::new();
        for i in 0..5 {
            let mut c = test_chunk("201", i as f64 * 30.0, &format!("chunk {}", i));
            c.embedding = vec![1.0, i as f32 * 0.1, 0.0];
            chunks.push(c);
        }
        store.upsert_batch(&chunks).await.unwrap();

        let page = store
            .similarity_search(&[1.0, 0.0, 0.0], &ChunkFilter::default(), 2, 1)
            .await
            .unwrap();
        assert_eq!(page.total_matches, 5);
        assert_eq!(page.results.len(), 2);
    }

    #[tokio::test]
    async fn test_episode_numbers_are_distinct_and_sorted() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                test_chunk("510", 0.0, "a"),
                test_chunk("201", 0.0, "b"),
                test_chunk("201", 30.0, "c"),
            ])
            .await
            .unwrap();

        let numbers = store.episode_numbers().await.unwrap();
        assert_eq!(numbers, vec!["201".to_string(), "510".to_string()]);
    }
}
