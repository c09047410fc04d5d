use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
    S3,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Remote embedding API via the OpenAI-compatible client.
    OpenAi,
    /// Deterministic feature-hashed embeddings, no network. Used in tests.
    Hashed,
    /// No embedder configured; search documents carry zero vectors.
    Disabled,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    #[serde(default)]
    pub s3_access_key_id: Option<String>,
    #[serde(default)]
    pub s3_secret_access_key: Option<String>,
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,

    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,

    #[serde(default = "default_vector_weight")]
    pub search_vector_weight: f32,
    #[serde(default = "default_lexical_weight")]
    pub search_lexical_weight: f32,
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    #[serde(default = "default_match_base_weight")]
    pub match_base_weight: f32,
    #[serde(default)]
    pub match_llm_rerank_enabled: bool,
    #[serde(default = "default_match_llm_weight")]
    pub match_llm_weight: f32,

    #[serde(default = "default_queue_concurrency")]
    pub resume_queue_concurrency: usize,
    #[serde(default = "default_queue_concurrency")]
    pub requirement_queue_concurrency: usize,
    #[serde(default = "default_queue_max_attempts")]
    pub queue_max_attempts: u32,
    #[serde(default = "default_queue_backoff_base_ms")]
    pub queue_backoff_base_ms: u64,
    #[serde(default = "default_queue_high_water")]
    pub queue_high_water: u64,

    #[serde(default = "default_pii_token_prefix")]
    pub pii_token_prefix: String,
    #[serde(default = "default_pii_vault_secret")]
    pub pii_vault_secret: String,

    #[serde(default)]
    pub mailbox_enabled: bool,
    /// Tenant the polled mailbox ingests into.
    #[serde(default)]
    pub mailbox_tenant: Option<String>,
    #[serde(default)]
    pub mailbox_host: Option<String>,
    #[serde(default = "default_mailbox_port")]
    pub mailbox_port: u16,
    #[serde(default = "default_true")]
    pub mailbox_tls: bool,
    #[serde(default)]
    pub mailbox_username: Option<String>,
    #[serde(default)]
    pub mailbox_password: Option<String>,
    #[serde(default = "default_mailbox_name")]
    pub mailbox_name: String,
    #[serde(default = "default_mailbox_poll_interval")]
    pub mailbox_poll_interval_ms: u64,
    #[serde(default = "default_attachment_whitelist")]
    pub mailbox_attachment_mime_whitelist: Vec<String>,

    #[serde(default = "default_eval_k")]
    pub eval_ndcg_k: usize,
    #[serde(default = "default_eval_relevance_threshold")]
    pub eval_relevance_threshold: f64,
    #[serde(default = "default_online_window_hours")]
    pub eval_online_window_hours: i64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

fn default_signed_url_ttl() -> u64 {
    900
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Disabled
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_embedding_dimensions() -> u32 {
    3072
}

fn default_vector_weight() -> f32 {
    0.6
}

fn default_lexical_weight() -> f32 {
    0.4
}

fn default_search_max_results() -> usize {
    100
}

fn default_match_base_weight() -> f32 {
    0.2
}

fn default_match_llm_weight() -> f32 {
    0.2
}

fn default_queue_concurrency() -> usize {
    4
}

fn default_queue_max_attempts() -> u32 {
    3
}

fn default_queue_backoff_base_ms() -> u64 {
    500
}

fn default_queue_high_water() -> u64 {
    10_000
}

fn default_pii_token_prefix() -> String {
    "pii".to_string()
}

fn default_pii_vault_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_mailbox_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_mailbox_name() -> String {
    "INBOX".to_string()
}

fn default_mailbox_poll_interval() -> u64 {
    60_000
}

fn default_attachment_whitelist() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "text/plain".to_string(),
        "application/msword".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string(),
    ]
}

fn default_eval_k() -> usize {
    10
}

fn default_eval_relevance_threshold() -> f64 {
    1.0
}

fn default_online_window_hours() -> i64 {
    24
}

impl AppConfig {
    /// Hybrid search weights must describe a convex combination.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let sum = self.search_vector_weight + self.search_lexical_weight;
        if (sum - 1.0).abs() > f32::EPSILON * 4.0 {
            return Err(ConfigError::Message(format!(
                "search_vector_weight + search_lexical_weight must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(any(test, feature = "test-utils"))]
impl AppConfig {
    /// Config suitable for unit tests: memory storage, hashed embeddings.
    pub fn test_defaults() -> Self {
        AppConfig {
            surrealdb_address: "mem://".into(),
            surrealdb_username: "root".into(),
            surrealdb_password: "root".into(),
            surrealdb_namespace: "test_ns".into(),
            surrealdb_database: "test_db".into(),
            http_port: 0,
            data_dir: "/tmp/unused".into(),
            storage: StorageKind::Memory,
            s3_bucket: None,
            s3_endpoint: None,
            s3_region: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
            signed_url_ttl_secs: default_signed_url_ttl(),
            openai_api_key: None,
            openai_base_url: default_base_url(),
            embedding_backend: EmbeddingBackend::Hashed,
            embedding_model: default_embedding_model(),
            embedding_dimensions: 64,
            search_vector_weight: default_vector_weight(),
            search_lexical_weight: default_lexical_weight(),
            search_max_results: default_search_max_results(),
            match_base_weight: default_match_base_weight(),
            match_llm_rerank_enabled: false,
            match_llm_weight: default_match_llm_weight(),
            resume_queue_concurrency: 1,
            requirement_queue_concurrency: 1,
            queue_max_attempts: default_queue_max_attempts(),
            queue_backoff_base_ms: 10,
            queue_high_water: default_queue_high_water(),
            pii_token_prefix: default_pii_token_prefix(),
            pii_vault_secret: "test-secret".into(),
            mailbox_enabled: false,
            mailbox_tenant: None,
            mailbox_host: None,
            mailbox_port: default_mailbox_port(),
            mailbox_tls: true,
            mailbox_username: None,
            mailbox_password: None,
            mailbox_name: default_mailbox_name(),
            mailbox_poll_interval_ms: 50,
            mailbox_attachment_mime_whitelist: default_attachment_whitelist(),
            eval_ndcg_k: default_eval_k(),
            eval_relevance_threshold: default_eval_relevance_threshold(),
            eval_online_window_hours: default_online_window_hours(),
        }
    }
}
