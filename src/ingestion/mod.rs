//! Transcript document ingestion pipeline.
//!
//! Parses transcript documents into chunk records, embeds them in batches,
//! and upserts them into the vector store. Every input item yields exactly
//! one outcome in the returned ledger, no matter which step failed.

use crate::config::IngestionSettings;
use crate::embedding::Embedder;
use crate::error::{Result, UndreError};
use crate::vector_store::{TranscriptChunk, VectorStore};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One item of the input document schema.
#[derive(Debug, Deserialize)]
struct TranscriptItem {
    text: String,
    metadata: ItemMetadata,
}

/// Per-item metadata as it appears on disk.
#[derive(Debug, Deserialize)]
struct ItemMetadata {
    date: String,
    episode_number: i64,
    #[serde(default)]
    episode_title: Option<String>,
    timestamp_start: f64,
    timestamp_end: f64,
    #[serde(default)]
    chunk_topic: Option<String>,
    #[serde(default)]
    topics: Option<String>,
}

/// Outcome of one attempted chunk (or of the document itself when it could
/// not be parsed at all).
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    /// Source file name.
    pub file_name: String,
    /// Identifier of the attempted chunk; absent for file-level failures.
    pub chunk_id: Option<Uuid>,
    /// Whether the chunk made it into the store.
    pub success: bool,
    /// Error detail when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionOutcome {
    fn stored(file_name: &str, chunk_id: Uuid) -> Self {
        Self {
            file_name: file_name.to_string(),
            chunk_id: Some(chunk_id),
            success: true,
            error: None,
        }
    }

    fn failed(file_name: &str, chunk_id: Option<Uuid>, error: String) -> Self {
        Self {
            file_name: file_name.to_string(),
            chunk_id,
            success: false,
            error: Some(error),
        }
    }
}

/// Full result of ingesting one document.
#[derive(Debug, Serialize)]
pub struct IngestionReport {
    /// One entry per attempted chunk.
    pub outcomes: Vec<IngestionOutcome>,
    /// Total outcomes recorded.
    pub total_processed: usize,
    /// Outcomes that succeeded.
    pub successful_count: usize,
}

impl IngestionReport {
    fn from_outcomes(outcomes: Vec<IngestionOutcome>) -> Self {
        let successful_count = outcomes.iter().filter(|o| o.success).count();
        Self {
            total_processed: outcomes.len(),
            successful_count,
            outcomes,
        }
    }
}

/// Check whether a file name carries a supported document extension.
pub fn is_supported_document(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// The batched ingestion pipeline.
pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    max_concurrent_batches: usize,
}

impl IngestionPipeline {
    /// Create a new pipeline over the given providers.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: &IngestionSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            batch_size: settings.batch_size.max(1),
            max_concurrent_batches: settings.max_concurrent_batches.max(1),
        }
    }

    /// Ingest a raw document.
    ///
    /// Rejects empty uploads and unsupported file types up front; after
    /// that, every failure is recorded in the ledger instead of propagated.
    #[instrument(skip(self, bytes, cancel), fields(file = %file_name))]
    pub async fn ingest_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport> {
        if bytes.is_empty() {
            return Err(UndreError::InvalidInput(format!(
                "Document '{}' is empty",
                file_name
            )));
        }
        if !is_supported_document(file_name) {
            return Err(UndreError::InvalidInput(format!(
                "Unsupported document type: '{}'",
                file_name
            )));
        }

        let items: Vec<TranscriptItem> = match serde_json::from_slice(bytes) {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to parse document '{}': {}", file_name, e);
                return Ok(IngestionReport::from_outcomes(vec![IngestionOutcome::failed(
                    file_name,
                    None,
                    format!("Failed to parse document: {}", e),
                )]));
            }
        };

        info!("Ingesting {} items from '{}'", items.len(), file_name);

        // Convert items up front; conversion failures go straight into the
        // ledger while valid siblings continue.
        let mut outcomes = Vec::with_capacity(items.len());
        let mut chunks = Vec::new();
        for item in items {
            match convert_item(item) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => outcomes.push(IngestionOutcome::failed(file_name, None, e)),
            }
        }

        let batches: Vec<Vec<TranscriptChunk>> = chunks
            .chunks(self.batch_size)
            .map(|b| b.to_vec())
            .collect();

        // Batches run with bounded fan-out; outcomes within a batch keep
        // input order, cross-batch order is not guaranteed.
        let batch_outcomes: Vec<Vec<IngestionOutcome>> = stream::iter(batches)
            .map(|batch| self.process_batch(batch, file_name, cancel))
            .buffer_unordered(self.max_concurrent_batches)
            .collect()
            .await;

        for batch in batch_outcomes {
            outcomes.extend(batch);
        }

        let report = IngestionReport::from_outcomes(outcomes);
        info!(
            "Ingested '{}': {}/{} chunks stored",
            file_name, report.successful_count, report.total_processed
        );
        Ok(report)
    }

    /// Ingest a document from disk.
    pub async fn ingest_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.json")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        self.ingest_bytes(&bytes, &file_name, cancel).await
    }

    /// Ingest every supported document in a directory.
    ///
    /// Per-file failures are logged and recorded; they never stop the scan.
    /// Cancellation stops scheduling further files.
    #[instrument(skip(self, cancel), fields(dir = %dir.display()))]
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, IngestionReport)>> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_supported_document)
            })
            .collect();
        entries.sort();

        if entries.is_empty() {
            info!("No documents found in {}", dir.display());
            return Ok(Vec::new());
        }

        info!("Found {} documents to ingest", entries.len());

        let mut reports = Vec::with_capacity(entries.len());
        for path in entries {
            if cancel.is_cancelled() {
                info!("Ingestion cancelled, skipping remaining documents");
                break;
            }
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document.json")
                .to_string();
            match self.ingest_file(&path, cancel).await {
                Ok(report) => reports.push((file_name, report)),
                Err(e) => {
                    warn!("Failed to ingest '{}': {}", file_name, e);
                    let outcome =
                        IngestionOutcome::failed(&file_name, None, e.to_string());
                    reports.push((file_name, IngestionReport::from_outcomes(vec![outcome])));
                }
            }
        }
        Ok(reports)
    }

    /// Embed and upsert one batch, producing one outcome per chunk.
    async fn process_batch(
        &self,
        mut batch: Vec<TranscriptChunk>,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Vec<IngestionOutcome> {
        if cancel.is_cancelled() {
            return batch
                .iter()
                .map(|c| {
                    IngestionOutcome::failed(
                        file_name,
                        Some(c.id),
                        "Ingestion cancelled before batch started".to_string(),
                    )
                })
                .collect();
        }

        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!("Embedding failed for batch from '{}': {}", file_name, e);
                return batch
                    .iter()
                    .map(|c| IngestionOutcome::failed(file_name, Some(c.id), e.to_string()))
                    .collect();
            }
        };

        for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        match self.store.upsert_batch(&batch).await {
            Ok(ids) => ids
                .into_iter()
                .map(|id| IngestionOutcome::stored(file_name, id))
                .collect(),
            Err(e) => {
                warn!("Upsert failed for batch from '{}': {}", file_name, e);
                batch
                    .iter()
                    .map(|c| IngestionOutcome::failed(file_name, Some(c.id), e.to_string()))
                    .collect()
            }
        }
    }
}

/// Convert a parsed document item into a chunk record.
fn convert_item(item: TranscriptItem) -> std::result::Result<TranscriptChunk, String> {
    if item.text.trim().is_empty() {
        return Err("Chunk text is empty".to_string());
    }

    let episode_date = NaiveDate::parse_from_str(&item.metadata.date, "%Y-%m-%d")
        .map_err(|e| format!("Invalid episode date '{}': {}", item.metadata.date, e))?;

    Ok(TranscriptChunk::new(
        item.text,
        item.metadata.timestamp_start,
        item.metadata.timestamp_end,
        episode_date,
        item.metadata.episode_number.to_string(),
        item.metadata.episode_title.unwrap_or_default(),
        item.metadata.chunk_topic.unwrap_or_default(),
        item.metadata.topics.unwrap_or_default(),
    ))
}
