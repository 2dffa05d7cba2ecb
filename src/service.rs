//! Composition root for Undre.
//!
//! Builds every component from settings and owns the shared stores, so no
//! state lives in process-wide globals.

use crate::completion::{CompletionProvider, OpenAICompletion};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::generation::QuestionGenerator;
use crate::ingestion::IngestionPipeline;
use crate::questions::QuestionStore;
use crate::search::{MetadataExtractor, SearchEngine, SearchOutcome, SearchQuery};
use crate::vector_store::{MemoryVectorStore, VectorStore};
use std::sync::Arc;

/// The assembled service: stores, pipeline, engine, and generator.
pub struct Service {
    settings: Settings,
    vector_store: Arc<dyn VectorStore>,
    question_store: Arc<QuestionStore>,
    pipeline: IngestionPipeline,
    engine: Arc<SearchEngine>,
    generator: Arc<QuestionGenerator>,
}

impl Service {
    /// Build the service with default (OpenAI + in-memory) components.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));
        let completion: Arc<dyn CompletionProvider> =
            Arc::new(OpenAICompletion::with_model(&settings.completion.model));
        let vector_store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());

        Self::with_components(settings, prompts, embedder, completion, vector_store)
    }

    /// Build the service with custom providers (used by tests and swap-ins).
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let question_store = Arc::new(QuestionStore::new());

        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            vector_store.clone(),
            &settings.ingestion,
        );

        let extractor = MetadataExtractor::new(completion.clone(), prompts.clone());
        let engine = Arc::new(SearchEngine::new(
            embedder,
            vector_store.clone(),
            extractor,
        ));

        let generator = Arc::new(QuestionGenerator::new(
            engine.clone(),
            vector_store.clone(),
            question_store.clone(),
            completion,
            prompts,
            settings.generation.clone(),
        ));

        Ok(Self {
            settings,
            vector_store,
            question_store,
            pipeline,
            engine,
            generator,
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the ingestion pipeline.
    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    /// Get the search engine.
    pub fn engine(&self) -> Arc<SearchEngine> {
        self.engine.clone()
    }

    /// Get the question generator.
    pub fn generator(&self) -> Arc<QuestionGenerator> {
        self.generator.clone()
    }

    /// Get the question store.
    pub fn question_store(&self) -> Arc<QuestionStore> {
        self.question_store.clone()
    }

    /// Get the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Structured search, wrapped in the boundary envelope.
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        self.engine.search(query).await.into()
    }

    /// Intent-driven search, wrapped in the boundary envelope.
    pub async fn search_with_intent(&self, text: &str) -> SearchOutcome {
        self.engine.search_with_intent(text).await.into()
    }
}
