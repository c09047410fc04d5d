//! Shared process wiring for the server/worker binaries. Start order is
//! store, blob storage, collaborators, queue workers, HTTP edge; teardown
//! runs in reverse. Not every binary uses every item.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use common::audit::AuditRecorder;
use common::resilience::CircuitBreakerRegistry;
use common::storage::db::SurrealDbClient;
use common::storage::indexes::ensure_runtime_indexes;
use common::storage::store::StorageManager;
use common::utils::config::{get_config, AppConfig, EmbeddingBackend};
use common::utils::crypto::PiiVaultCrypto;
use common::utils::embedding::EmbeddingProvider;
use ingestion_pipeline::ner::RegexNer;
use ingestion_pipeline::requirement::RuleBasedRequirementParser;
use ingestion_pipeline::{
    IngestionService, RequirementIngestionPipeline, ResumeIngestionPipeline,
};
use matching_engine::{MatchingEngine, RuleBasedSummariser};
use search_index::SearchIndex;

use common::queue::WorkerPool;

/// Long-lived process resources in dependency order.
pub struct Core {
    pub config: AppConfig,
    pub db: Arc<SurrealDbClient>,
    pub storage: StorageManager,
    pub audit: Arc<AuditRecorder>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub embedder: Arc<EmbeddingProvider>,
    pub search: SearchIndex,
    pub ingestion: Arc<IngestionService>,
    pub matching: Arc<MatchingEngine>,
}

pub async fn init() -> Result<Core, Box<dyn std::error::Error>> {
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_schema().await?;
    ensure_runtime_indexes(&db, config.embedding_dimensions as usize).await?;

    let storage = StorageManager::new(&config).await?;

    let openai_client = match config.embedding_backend {
        EmbeddingBackend::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or("openai embedding backend requires openai_api_key")?;
            Some(Arc::new(async_openai_client(&api_key, &config.openai_base_url)))
        }
        _ => None,
    };
    let embedder = Arc::new(EmbeddingProvider::from_config(&config, openai_client)?);
    info!(
        backend = ?config.embedding_backend,
        dimension = embedder.dimension(),
        "embedding provider initialized"
    );

    let search = SearchIndex::new(Arc::clone(&db), Arc::clone(&embedder), &config);
    let audit = Arc::new(AuditRecorder::new(Arc::clone(&db)));
    let breakers = Arc::new(CircuitBreakerRegistry::default());

    let ingestion = Arc::new(IngestionService::new(
        Arc::clone(&db),
        storage.clone(),
        Arc::clone(&audit),
        Arc::clone(&breakers),
        config.clone(),
    ));
    let matching = Arc::new(MatchingEngine::new(
        Arc::clone(&db),
        search.clone(),
        Arc::clone(&audit),
        Arc::new(RuleBasedSummariser),
        config.clone(),
    ));

    Ok(Core {
        config,
        db,
        storage,
        audit,
        breakers,
        embedder,
        search,
        ingestion,
        matching,
    })
}

fn async_openai_client(
    api_key: &str,
    base_url: &str,
) -> async_openai::Client<async_openai::config::OpenAIConfig> {
    async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url),
    )
}

/// Spawn the per-queue worker pools. Returned in spawn order; shut them
/// down in reverse.
pub fn spawn_workers(core: &Core) -> Vec<WorkerPool> {
    let backoff = Duration::from_millis(core.config.queue_backoff_base_ms);

    let resume_pipeline = Arc::new(ResumeIngestionPipeline::new(
        Arc::clone(&core.db),
        core.storage.clone(),
        core.search.clone(),
        Arc::clone(&core.audit),
        Arc::new(RegexNer::new()),
        None,
        PiiVaultCrypto::new(&core.config.pii_vault_secret, &core.config.pii_token_prefix),
        Arc::clone(&core.breakers),
    ));
    let requirement_pipeline = Arc::new(RequirementIngestionPipeline::new(
        Arc::clone(&core.db),
        core.search.clone(),
        Arc::clone(&core.audit),
        Arc::new(RuleBasedRequirementParser::new()),
        Arc::clone(&core.breakers),
    ));

    if core.config.mailbox_enabled {
        // The IMAP transport is a deploy-time collaborator behind
        // MailboxSource; this build ships the polling semantics only.
        warn!("mailbox_enabled is set but no mailbox transport is wired into this binary");
    }

    vec![
        WorkerPool::spawn(
            Arc::clone(&core.db),
            resume_pipeline,
            core.config.resume_queue_concurrency,
            backoff,
        ),
        WorkerPool::spawn(
            Arc::clone(&core.db),
            requirement_pipeline,
            core.config.requirement_queue_concurrency,
            backoff,
        ),
    ]
}

/// Drain in-flight jobs and stop the pools, newest first.
pub async fn shutdown_workers(pools: Vec<WorkerPool>) {
    for pool in pools.into_iter().rev() {
        pool.shutdown().await;
    }
}
