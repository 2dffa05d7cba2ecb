//! Undre - Transcript Search and Question Suggestion
//!
//! A service core for retrieval-augmented question generation over timestamped
//! podcast transcript chunks.
//!
//! The name "Undre" comes from the Norwegian word for "wonder."
//!
//! # Overview
//!
//! Undre allows you to:
//! - Ingest transcript documents, embed their chunks, and index them
//! - Search chunks by semantic similarity with episode/topic metadata filters
//! - Turn free-text intent into structured filters before searching
//! - Generate and cache suggested questions from retrieved transcript text
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `embedding` - Embedding generation
//! - `completion` - Chat completion abstraction
//! - `vector_store` - Vector database abstraction
//! - `ingestion` - Transcript document ingestion pipeline
//! - `search` - Similarity search with metadata filters and intent handling
//! - `questions` - Concurrent store of generated question sets
//! - `generation` - Question generation pass and periodic scheduler
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use undre::config::Settings;
//! use undre::embedding::OpenAIEmbedder;
//! use undre::ingestion::IngestionPipeline;
//! use undre::vector_store::MemoryVectorStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store = Arc::new(MemoryVectorStore::new());
//!     let embedder = Arc::new(OpenAIEmbedder::with_config(
//!         &settings.embedding.model,
//!         settings.embedding.dimensions as usize,
//!     ));
//!
//!     let pipeline = IngestionPipeline::new(embedder, store, &settings.ingestion);
//!     let report = pipeline
//!         .ingest_bytes(
//!             std::fs::read("episode-201.json")?.as_slice(),
//!             "episode-201.json",
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!     println!("Indexed {}/{} chunks", report.successful_count, report.total_processed);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod openai;
pub mod questions;
pub mod search;
pub mod service;
pub mod vector_store;

pub use error::{Result, UndreError};
