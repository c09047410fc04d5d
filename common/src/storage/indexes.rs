use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::AppError, storage::db::SurrealDbClient};

const FTS_ANALYZER_NAME: &str = "app_en_fts_analyzer";
const SEARCH_FTS_INDEX: &str = "search_document_content_fts_idx";
const SEARCH_HNSW_INDEX: &str = "idx_embedding_search_document";
const SEARCH_TABLE: &str = "search_document";

/// Build runtime Surreal indexes (FTS + HNSW) over the search document table.
/// Idempotent: safe to call repeatedly; the HNSW definition is overwritten
/// when the embedding dimension changes.
pub async fn ensure_runtime_indexes(
    db: &SurrealDbClient,
    embedding_dimension: usize,
) -> Result<(), AppError> {
    ensure_runtime_indexes_inner(db, embedding_dimension)
        .await
        .map_err(|err| AppError::InternalError(err.to_string()))
}

/// Rebuild the search indexes after bulk writes, skipping missing ones.
pub async fn rebuild_indexes(db: &SurrealDbClient) -> Result<(), AppError> {
    let queries = [
        format!("REBUILD INDEX IF EXISTS {SEARCH_FTS_INDEX} ON {SEARCH_TABLE}"),
        format!("REBUILD INDEX IF EXISTS {SEARCH_HNSW_INDEX} ON {SEARCH_TABLE}"),
    ];
    for query in queries {
        db.client.query(query).await?.check()?;
    }
    Ok(())
}

async fn ensure_runtime_indexes_inner(
    db: &SurrealDbClient,
    embedding_dimension: usize,
) -> Result<()> {
    create_fts_analyzer(db).await?;

    let fts_definition = format!(
        "DEFINE INDEX IF NOT EXISTS {SEARCH_FTS_INDEX} ON TABLE {SEARCH_TABLE} \
         FIELDS content SEARCH ANALYZER {FTS_ANALYZER_NAME} BM25;"
    );
    db.client
        .query(fts_definition)
        .await
        .context("creating search FTS index")?
        .check()
        .context("search FTS index definition failed")?;

    let hnsw_definition = match existing_hnsw_dimension(db).await? {
        Some(current) if current == embedding_dimension => None,
        Some(current) => {
            debug!(
                existing_dimension = current,
                target_dimension = embedding_dimension,
                "Overwriting HNSW index to match new embedding dimension"
            );
            Some(format!(
                "DEFINE INDEX OVERWRITE {SEARCH_HNSW_INDEX} ON TABLE {SEARCH_TABLE} \
                 FIELDS embedding HNSW DIMENSION {embedding_dimension} DIST COSINE TYPE F32 EFC 100 M 8;"
            ))
        }
        None => Some(format!(
            "DEFINE INDEX IF NOT EXISTS {SEARCH_HNSW_INDEX} ON TABLE {SEARCH_TABLE} \
             FIELDS embedding HNSW DIMENSION {embedding_dimension} DIST COSINE TYPE F32 EFC 100 M 8;"
        )),
    };

    if let Some(definition) = hnsw_definition {
        db.client
            .query(definition)
            .await
            .context("creating search HNSW index")?
            .check()
            .context("search HNSW index definition failed")?;
    }

    Ok(())
}

async fn create_fts_analyzer(db: &SurrealDbClient) -> Result<()> {
    // Prefer snowball stemming; fall back to ascii-only when the filter is
    // unavailable in the running Surreal build.
    let snowball_query = format!(
        "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME}
            TOKENIZERS class
            FILTERS lowercase, ascii, snowball(english);"
    );

    match db.client.query(snowball_query).await {
        Ok(res) => {
            if res.check().is_ok() {
                return Ok(());
            }
            warn!(
                analyzer = FTS_ANALYZER_NAME,
                "Snowball analyzer check failed; attempting ascii fallback definition"
            );
        }
        Err(err) => {
            warn!(
                error = %err,
                "Snowball analyzer creation errored; attempting ascii fallback definition"
            );
        }
    }

    let fallback_query = format!(
        "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME}
            TOKENIZERS class
            FILTERS lowercase, ascii;"
    );

    db.client
        .query(fallback_query)
        .await
        .context("creating fallback FTS analyzer")?
        .check()
        .context("failed to create fallback FTS analyzer")?;

    Ok(())
}

async fn existing_hnsw_dimension(db: &SurrealDbClient) -> Result<Option<usize>> {
    let info_query = format!("INFO FOR TABLE {SEARCH_TABLE};");
    let mut response = db
        .client
        .query(info_query)
        .await
        .context("fetching search table info")?;

    let info: surrealdb::Value = response
        .take(0)
        .context("failed to take table info response")?;
    let info_json: Value =
        serde_json::to_value(info).context("serializing table info to JSON for parsing")?;

    let definition = info_json
        .get("Object")
        .and_then(|o| o.get("indexes"))
        .and_then(|i| i.get("Object"))
        .and_then(|i| i.get(SEARCH_HNSW_INDEX))
        .and_then(|d| d.get("Strand"))
        .and_then(|v| v.as_str());

    Ok(definition
        .and_then(extract_dimension)
        .and_then(|d| usize::try_from(d).ok()))
}

fn extract_dimension(definition: &str) -> Option<u64> {
    definition
        .split("DIMENSION")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.trim_end_matches(';').parse::<u64>().ok())
}
