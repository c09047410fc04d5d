//! Append-only, per-tenant audit log with a SHA-256 prev→cur hash chain.
//!
//! Entries are written under a per-tenant serialisation lock so the
//! SELECT-latest + INSERT pair cannot fork the chain under concurrency.
//! Payloads are redacted and truncated before hashing, so verification
//! replays exactly what was stored.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::storage::db::SurrealDbClient;
use crate::storage::types::audit_log::AuditLog;
use crate::storage::TenantContext;

const MAX_PAYLOAD_BYTES: usize = 2000;
const SENSITIVE_KEYS: [&str; 5] = ["password", "token", "access_token", "refresh_token", "secret"];
const REDACTED: &str = "[REDACTED]";

pub const RESULT_SUCCESS: &str = "SUCCESS";

/// Input for one audit entry.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor_role: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload: Value,
    pub result_code: String,
}

impl AuditEvent {
    pub fn success(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        payload: Value,
    ) -> Self {
        Self {
            actor_role: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id,
            payload,
            result_code: RESULT_SUCCESS.to_string(),
        }
    }

    pub fn failure(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        payload: Value,
        result_code: impl Into<String>,
    ) -> Self {
        Self {
            actor_role: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id,
            payload,
            result_code: result_code.into(),
        }
    }
}

/// Canonical hashed envelope. Field order is the canonical serialisation
/// order; changing it breaks every stored chain.
#[derive(Serialize)]
struct HashEnvelope<'a> {
    prev_hash: Option<&'a str>,
    tenant_id: &'a str,
    action: &'a str,
    entity_type: &'a str,
    entity_id: Option<&'a str>,
    payload: &'a Value,
    result_code: &'a str,
    timestamp: String,
}

fn canonical_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn compute_hash(
    prev_hash: Option<&str>,
    tenant_id: &str,
    action: &str,
    entity_type: &str,
    entity_id: Option<&str>,
    payload: &Value,
    result_code: &str,
    at: &DateTime<Utc>,
) -> Result<String, AppError> {
    let envelope = HashEnvelope {
        prev_hash,
        tenant_id,
        action,
        entity_type,
        entity_id,
        payload,
        result_code,
        timestamp: canonical_timestamp(at),
    };
    let serialized = serde_json::to_vec(&envelope)
        .map_err(|e| AppError::InternalError(format!("audit envelope serialisation: {e}")))?;
    let digest = Sha256::digest(&serialized);
    Ok(format!("{digest:x}"))
}

/// Replace sensitive keys (at any depth) before the payload is persisted.
fn redact_payload(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if SENSITIVE_KEYS
                    .iter()
                    .any(|sensitive| key.eq_ignore_ascii_case(sensitive))
                {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact_payload(entry);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_payload(item);
            }
        }
        _ => {}
    }
}

/// Cap the serialised payload at 2000 bytes; oversized payloads are
/// replaced by a marker carrying a preview.
fn truncate_payload(value: Value) -> Value {
    let serialized = match serde_json::to_string(&value) {
        Ok(s) => s,
        Err(_) => return Value::Null,
    };
    if serialized.len() <= MAX_PAYLOAD_BYTES {
        return value;
    }
    let preview: String = serialized.chars().take(256).collect();
    serde_json::json!({
        "truncated": true,
        "original_bytes": serialized.len(),
        "preview": preview,
    })
}

/// Sanitise an arbitrary payload for audit persistence.
pub fn sanitize_payload(payload: Value) -> Value {
    let mut payload = payload;
    redact_payload(&mut payload);
    truncate_payload(payload)
}

/// Writer and verifier for the per-tenant hash chain.
pub struct AuditRecorder {
    db: Arc<SurrealDbClient>,
    tenant_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuditRecorder {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self {
            db,
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, tenant: &TenantContext) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock().await;
        Arc::clone(
            locks
                .entry(tenant.tenant_id().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Append one entry to the tenant's chain.
    pub async fn record(
        &self,
        tenant: &TenantContext,
        event: AuditEvent,
    ) -> Result<AuditLog, AppError> {
        let chain_lock = self.lock_for(tenant).await;
        let _guard = chain_lock.lock().await;

        let prev = AuditLog::latest_for_tenant(&self.db, tenant).await?;
        let prev_hash = prev.as_ref().map(|entry| entry.hash.clone());

        let now = Utc::now();
        let payload = sanitize_payload(event.payload);
        let hash = compute_hash(
            prev_hash.as_deref(),
            tenant.tenant_id(),
            &event.action,
            &event.entity_type,
            event.entity_id.as_deref(),
            &payload,
            &event.result_code,
            &now,
        )?;

        let entry = AuditLog {
            id: AuditLog::fresh_id(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            actor_role: event.actor_role,
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            payload,
            result_code: event.result_code,
            prev_hash,
            hash,
        };

        let stored = self.db.store_tenant_item(tenant, entry).await?;
        stored.ok_or_else(|| AppError::InternalError("audit insert returned no row".into()))
    }

    /// Replay the tenant's chain and recompute every hash. Any mismatch or
    /// broken prev link is an Integrity error naming the offending index.
    pub async fn verify_chain(&self, tenant: &TenantContext) -> Result<usize, AppError> {
        let entries = AuditLog::list_for_tenant_asc(&self.db, tenant).await?;

        let mut expected_prev: Option<String> = None;
        for (index, entry) in entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                return Err(AppError::Integrity(format!(
                    "broken chain link at index {index} for tenant {}",
                    tenant.tenant_id()
                )));
            }

            let recomputed = compute_hash(
                entry.prev_hash.as_deref(),
                &entry.tenant_id,
                &entry.action,
                &entry.entity_type,
                entry.entity_id.as_deref(),
                &entry.payload,
                &entry.result_code,
                &entry.created_at,
            )?;
            if recomputed != entry.hash {
                return Err(AppError::Integrity(format!(
                    "hash mismatch at index {index} for tenant {}",
                    tenant.tenant_id()
                )));
            }

            expected_prev = Some(entry.hash.clone());
        }

        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn recorder() -> (AuditRecorder, Arc<SurrealDbClient>) {
        let database = uuid::Uuid::new_v4().to_string();
        let db = Arc::new(
            SurrealDbClient::memory("audit_ns", &database)
                .await
                .expect("in-memory surrealdb"),
        );
        db.ensure_schema().await.expect("schema");
        (AuditRecorder::new(Arc::clone(&db)), db)
    }

    #[tokio::test]
    async fn chain_links_and_verifies() {
        let (recorder, _db) = recorder().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        let e1 = recorder
            .record(
                &tenant,
                AuditEvent::success("resume.ingested", "document", Some("d1".into()), serde_json::json!({"sha256": "aa"})),
            )
            .await
            .expect("e1");
        let e2 = recorder
            .record(
                &tenant,
                AuditEvent::success("match.scored", "match", Some("m1".into()), serde_json::json!({"score": 0.9})),
            )
            .await
            .expect("e2");
        let e3 = recorder
            .record(
                &tenant,
                AuditEvent::failure("match.scored", "match", None, serde_json::json!({}), "VALIDATION_ERROR"),
            )
            .await
            .expect("e3");

        assert!(e1.prev_hash.is_none());
        assert_eq!(e2.prev_hash.as_deref(), Some(e1.hash.as_str()));
        assert_eq!(e3.prev_hash.as_deref(), Some(e2.hash.as_str()));

        let verified = recorder.verify_chain(&tenant).await.expect("verify");
        assert_eq!(verified, 3);
    }

    #[tokio::test]
    async fn tampering_breaks_verification() {
        let (recorder, db) = recorder().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        recorder
            .record(
                &tenant,
                AuditEvent::success("a", "t", None, serde_json::json!({"n": 1})),
            )
            .await
            .expect("e1");
        let e2 = recorder
            .record(
                &tenant,
                AuditEvent::success("b", "t", None, serde_json::json!({"n": 2})),
            )
            .await
            .expect("e2");
        recorder
            .record(
                &tenant,
                AuditEvent::success("c", "t", None, serde_json::json!({"n": 3})),
            )
            .await
            .expect("e3");

        // Tamper with the middle entry's payload.
        db.client
            .query("UPDATE type::thing('audit_log', $id) SET payload = $payload")
            .bind(("id", e2.id.clone()))
            .bind(("payload", serde_json::json!({"n": 99})))
            .await
            .expect("tamper")
            .check()
            .expect("check");

        let err = recorder
            .verify_chain(&tenant)
            .await
            .expect_err("tampered chain must fail");
        assert!(matches!(err, AppError::Integrity(_)));
    }

    #[tokio::test]
    async fn chains_are_per_tenant() {
        let (recorder, _db) = recorder().await;
        let acme = TenantContext::new("acme").expect("tenant");
        let globex = TenantContext::new("globex").expect("tenant");

        let a1 = recorder
            .record(&acme, AuditEvent::success("a", "t", None, Value::Null))
            .await
            .expect("a1");
        let g1 = recorder
            .record(&globex, AuditEvent::success("g", "t", None, Value::Null))
            .await
            .expect("g1");

        // Each tenant's chain starts fresh.
        assert!(a1.prev_hash.is_none());
        assert!(g1.prev_hash.is_none());

        recorder.verify_chain(&acme).await.expect("acme verifies");
        recorder.verify_chain(&globex).await.expect("globex verifies");
    }

    #[tokio::test]
    async fn concurrent_records_do_not_fork_the_chain() {
        let (recorder, _db) = recorder().await;
        let recorder = Arc::new(recorder);
        let tenant = TenantContext::new("acme").expect("tenant");

        let mut handles = Vec::new();
        for n in 0..8 {
            let recorder = Arc::clone(&recorder);
            let tenant = tenant.clone();
            handles.push(tokio::spawn(async move {
                recorder
                    .record(
                        &tenant,
                        AuditEvent::success("burst", "t", None, serde_json::json!({"n": n})),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("record");
        }

        let verified = recorder.verify_chain(&tenant).await.expect("verify");
        assert_eq!(verified, 8);
    }

    #[test]
    fn sensitive_keys_are_redacted_at_depth() {
        let payload = serde_json::json!({
            "user": "jane",
            "password": "hunter2",
            "nested": {"access_token": "abc", "detail": {"Secret": "s"}},
            "list": [{"refresh_token": "r"}],
        });
        let sanitized = sanitize_payload(payload);
        assert_eq!(sanitized["password"], REDACTED);
        assert_eq!(sanitized["nested"]["access_token"], REDACTED);
        assert_eq!(sanitized["nested"]["detail"]["Secret"], REDACTED);
        assert_eq!(sanitized["list"][0]["refresh_token"], REDACTED);
        assert_eq!(sanitized["user"], "jane");
    }

    #[test]
    fn oversized_payloads_are_truncated() {
        let big = "x".repeat(5000);
        let sanitized = sanitize_payload(serde_json::json!({"blob": big}));
        assert_eq!(sanitized["truncated"], true);
        assert!(sanitized["preview"].as_str().is_some());
        assert!(serde_json::to_string(&sanitized).expect("serialise").len() < 1000);
    }
}
