use std::sync::Arc;

use common::audit::AuditRecorder;
use common::resilience::{RateLimitConfig, RateLimiter};
use common::storage::{db::SurrealDbClient, store::StorageManager};
use common::utils::config::AppConfig;
use ingestion_pipeline::IngestionService;
use matching_engine::MatchingEngine;
use search_index::SearchIndex;

/// Rate-limit tiers applied at the edge before any work is accepted.
pub struct EdgeLimits {
    pub global: RateLimiter,
    pub tenant: RateLimiter,
    pub api_key: RateLimiter,
}

impl Default for EdgeLimits {
    fn default() -> Self {
        Self {
            global: RateLimiter::new(RateLimitConfig::global()),
            tenant: RateLimiter::new(RateLimitConfig::tenant()),
            api_key: RateLimiter::new(RateLimitConfig::api_key()),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub ingestion: Arc<IngestionService>,
    pub search: SearchIndex,
    pub matching: Arc<MatchingEngine>,
    pub audit: Arc<AuditRecorder>,
    pub limits: Arc<EdgeLimits>,
}

impl ApiState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        storage: StorageManager,
        ingestion: Arc<IngestionService>,
        search: SearchIndex,
        matching: Arc<MatchingEngine>,
        audit: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            db,
            config,
            storage,
            ingestion,
            search,
            matching,
            audit,
            limits: Arc::new(EdgeLimits::default()),
        }
    }
}
