use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_openai::types::CreateEmbeddingRequestArgs;
use tracing::warn;

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackend},
};

type OpenAiClient = async_openai::Client<async_openai::config::OpenAIConfig>;

enum Backend {
    /// Remote embedding API via the OpenAI-compatible client.
    OpenAi { client: Arc<OpenAiClient>, model: String },
    /// Deterministic feature hashing; no network, used in tests.
    Hashed,
    /// No embedder configured.
    Disabled,
}

/// Embedding collaborator. Contract: `embed(text) -> [f32; D]`, idempotent
/// for identical input; a disabled or failing backend degrades to the zero
/// vector so lexical search keeps working.
pub struct EmbeddingProvider {
    backend: Backend,
    dimension: usize,
}

impl EmbeddingProvider {
    pub fn from_config(
        cfg: &AppConfig,
        openai_client: Option<Arc<OpenAiClient>>,
    ) -> Result<Self, AppError> {
        let dimension = cfg.embedding_dimensions as usize;
        let backend = match cfg.embedding_backend {
            EmbeddingBackend::OpenAi => {
                let client = openai_client.ok_or_else(|| {
                    AppError::Validation(
                        "openai embedding backend requires a configured client".into(),
                    )
                })?;
                Backend::OpenAi {
                    client,
                    model: cfg.embedding_model.clone(),
                }
            }
            EmbeddingBackend::Hashed => Backend::Hashed,
            EmbeddingBackend::Disabled => Backend::Disabled,
        };
        Ok(Self { backend, dimension })
    }

    /// Deterministic hashed embeddings of the given dimension.
    pub fn new_hashed(dimension: usize) -> Result<Self, AppError> {
        if dimension == 0 {
            return Err(AppError::Validation("embedding dimension must be > 0".into()));
        }
        Ok(Self {
            backend: Backend::Hashed,
            dimension,
        })
    }

    pub fn new_disabled(dimension: usize) -> Self {
        Self {
            backend: Backend::Disabled,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether query-time vector scoring is meaningful.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, Backend::Disabled)
    }

    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let raw = match &self.backend {
            Backend::Disabled => vec![0.0; self.dimension],
            Backend::Hashed => hashed_embedding(input, self.dimension),
            Backend::OpenAi { client, model } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .dimensions(self.dimension as u32)
                    .input([input])
                    .build()?;

                let response = client.embeddings().create(request).await?;
                response
                    .data
                    .first()
                    .ok_or_else(|| {
                        AppError::InternalError("no embedding data received from API".into())
                    })?
                    .embedding
                    .clone()
            }
        };

        Ok(fit_dimension(raw, self.dimension))
    }

    /// Embed with the zero-vector fallback the index contract mandates.
    pub async fn embed_or_zero(&self, input: &str) -> Vec<f32> {
        match self.embed(input).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %err, "embedding failed; falling back to zero vector");
                vec![0.0; self.dimension]
            }
        }
    }
}

/// Pad with zeros or truncate so `len == dimension` always holds.
pub fn fit_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    if vector.len() != dimension {
        vector.resize(dimension, 0.0);
    }
    vector
}

/// Feature-hash tokens into buckets, then L2-normalise. Deterministic for
/// identical input.
fn hashed_embedding(input: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    for token in input.split_whitespace() {
        let token = token.to_lowercase();
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() % dimension as u64) as usize;
        vector[bucket] += 1.0;
    }

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_embeddings_are_deterministic() {
        let provider = EmbeddingProvider::new_hashed(32).expect("provider");
        let a = provider.embed("senior rust engineer").await.expect("embed");
        let b = provider.embed("senior rust engineer").await.expect("embed");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        let c = provider.embed("junior sales associate").await.expect("embed");
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn disabled_backend_returns_zero_vector() {
        let provider = EmbeddingProvider::new_disabled(16);
        assert!(!provider.is_enabled());
        let vector = provider.embed("anything").await.expect("embed");
        assert_eq!(vector, vec![0.0; 16]);
    }

    #[test]
    fn fit_dimension_pads_and_truncates() {
        assert_eq!(fit_dimension(vec![1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_dimension(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }
}
