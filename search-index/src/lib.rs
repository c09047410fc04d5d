#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! Per-tenant hybrid search index: one search document per entity carrying
//! assembled text content, structured metadata and a dense embedding.
//! Queries blend vector similarity with lexical (BM25) rank under
//! configured weights.

pub mod content;
pub mod indexer;
pub mod query;
pub mod scoring;

use std::sync::Arc;

use common::storage::db::SurrealDbClient;
use common::utils::config::AppConfig;
use common::utils::embedding::EmbeddingProvider;

pub use query::{HybridSearchRequest, HybridSearchResult, SearchFilters};

/// Handle bundling the store, the embedding collaborator and the ranking
/// weights. Cheap to clone.
#[derive(Clone)]
pub struct SearchIndex {
    db: Arc<SurrealDbClient>,
    embedder: Arc<EmbeddingProvider>,
    vector_weight: f32,
    lexical_weight: f32,
    max_results: usize,
}

impl SearchIndex {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedder: Arc<EmbeddingProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            vector_weight: config.search_vector_weight,
            lexical_weight: config.search_lexical_weight,
            max_results: config.search_max_results,
        }
    }

    pub fn db(&self) -> &Arc<SurrealDbClient> {
        &self.db
    }

    pub fn embedder(&self) -> &Arc<EmbeddingProvider> {
        &self.embedder
    }
}
