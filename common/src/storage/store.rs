use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::signer::Signer;
use object_store::{path::Path as ObjPath, ObjectStore};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::error::AppError;
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Blob storage manager over an S3-compatible, local filesystem or in-memory
/// backend. Object locations are logical paths relative to the store root,
/// `tenants/{tenant}/documents/{document}/{file}` for document payloads.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    signer: Option<Arc<AmazonS3>>,
    signed_url_ttl: Duration,
}

impl StorageManager {
    pub async fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let backend_kind = cfg.storage.clone();
        let (store, signer) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            signer,
            signed_url_ttl: Duration::from_secs(cfg.signed_url_ttl_secs),
        })
    }

    /// Inject a specific backend. Used by tests.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            signer: None,
            signed_url_ttl: Duration::from_secs(900),
        }
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Store bytes at the logical location. Writes are retried on transient
    /// backend failures with exponential backoff.
    pub async fn put(&self, location: &str, data: Bytes) -> Result<(), AppError> {
        let path = ObjPath::from(location);
        let strategy = ExponentialBackoff::from_millis(50).map(jitter).take(3);
        let store = Arc::clone(&self.store);
        RetryIf::spawn(
            strategy,
            move || {
                let store = Arc::clone(&store);
                let path = path.clone();
                let data = data.clone();
                async move {
                    let payload = object_store::PutPayload::from_bytes(data);
                    store.put(&path, payload).await.map(|_| ())
                }
            },
            is_retryable_store_error,
        )
        .await?;
        Ok(())
    }

    /// Retrieve the full object buffered in memory.
    pub async fn get(&self, location: &str) -> Result<Bytes, AppError> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }

    pub async fn exists(&self, location: &str) -> Result<bool, AppError> {
        let path = ObjPath::from(location);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete all objects below the prefix.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<(), AppError> {
        let prefix_path = ObjPath::from(prefix);
        let locations = self
            .store
            .list(Some(&prefix_path))
            .map_ok(|m| m.location)
            .boxed();
        self.store
            .delete_stream(locations)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<object_store::ObjectMeta>, AppError> {
        let prefix_path = prefix.map(ObjPath::from);
        Ok(self.store.list(prefix_path.as_ref()).try_collect().await?)
    }

    /// Presigned PUT for direct client uploads. Only the S3 backend can sign.
    pub async fn signed_upload_url(&self, location: &str) -> Result<String, AppError> {
        self.signed_url(Method::PUT, location).await
    }

    /// Presigned GET for direct client downloads. Only the S3 backend can sign.
    pub async fn signed_download_url(&self, location: &str) -> Result<String, AppError> {
        self.signed_url(Method::GET, location).await
    }

    async fn signed_url(&self, method: Method, location: &str) -> Result<String, AppError> {
        let Some(signer) = &self.signer else {
            return Err(AppError::Validation(
                "signed URLs require the s3 storage backend".into(),
            ));
        };
        let path = ObjPath::from(location);
        let url = signer
            .signed_url(method, &path, self.signed_url_ttl)
            .await?;
        Ok(url.to_string())
    }
}

fn is_retryable_store_error(error: &object_store::Error) -> bool {
    !matches!(
        error,
        object_store::Error::NotFound { .. }
            | object_store::Error::AlreadyExists { .. }
            | object_store::Error::InvalidPath { .. }
    )
}

async fn create_storage_backend(
    cfg: &AppConfig,
) -> Result<(DynStore, Option<Arc<AmazonS3>>), AppError> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await?;
            }
            let store = LocalFileSystem::new_with_prefix(base)?;
            Ok((Arc::new(store), None))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
        StorageKind::S3 => {
            let bucket = cfg.s3_bucket.as_deref().ok_or_else(|| {
                AppError::Validation("s3_bucket is required for the s3 storage backend".into())
            })?;
            let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
            if let Some(endpoint) = &cfg.s3_endpoint {
                builder = builder.with_endpoint(endpoint).with_allow_http(true);
            }
            if let Some(region) = &cfg.s3_region {
                builder = builder.with_region(region);
            }
            if let (Some(key), Some(secret)) = (&cfg.s3_access_key_id, &cfg.s3_secret_access_key) {
                builder = builder
                    .with_access_key_id(key)
                    .with_secret_access_key(secret);
            }
            let s3 = Arc::new(builder.build()?);
            Ok((s3.clone(), Some(s3)))
        }
    }
}

/// Resolve the absolute base directory used for local storage from config.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;

    /// In-memory storage for unit tests: fast and fully isolated.
    pub async fn memory_storage() -> StorageManager {
        let cfg = AppConfig::test_defaults();
        StorageManager::new(&cfg)
            .await
            .expect("failed to create memory storage manager")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trip() {
        let storage = testing::memory_storage().await;

        let location = "tenants/acme/documents/doc-1/resume.pdf";
        let data = b"resume bytes";

        storage
            .put(location, Bytes::from(data.to_vec()))
            .await
            .expect("put");
        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), data);

        assert!(storage.exists(location).await.expect("exists"));

        storage
            .delete_prefix("tenants/acme/documents/doc-1/")
            .await
            .expect("delete");
        assert!(!storage.exists(location).await.expect("exists after delete"));
    }

    #[tokio::test]
    async fn list_respects_prefix() {
        let storage = testing::memory_storage().await;

        for (location, data) in [
            ("tenants/acme/documents/a/x.txt", b"1".as_slice()),
            ("tenants/acme/documents/b/y.txt", b"2".as_slice()),
            ("tenants/globex/documents/c/z.txt", b"3".as_slice()),
        ] {
            storage
                .put(location, Bytes::from(data.to_vec()))
                .await
                .expect("put");
        }

        let acme = storage
            .list(Some("tenants/acme/"))
            .await
            .expect("list acme");
        assert_eq!(acme.len(), 2);

        let all = storage.list(None).await.expect("list all");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn signed_urls_need_s3_backend() {
        let storage = testing::memory_storage().await;
        let err = storage
            .signed_upload_url("tenants/acme/documents/d/f.pdf")
            .await
            .expect_err("memory backend cannot sign");
        assert!(matches!(err, AppError::Validation(_)));
    }
}
