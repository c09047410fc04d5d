use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{storage::TenantContext, tenant_object};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingMetrics {
    pub ndcg_at_k: f64,
    pub hit_rate_at_k: f64,
    pub coverage: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BaselineDelta {
    pub ndcg_at_k: f64,
    pub hit_rate_at_k: f64,
}

tenant_object!(AnalyticsSnapshot, "analytics_snapshot", {
    #[serde(
        serialize_with = "crate::storage::types::serialize_datetime",
        deserialize_with = "crate::storage::types::deserialize_datetime",
        default
    )]
    window_start: chrono::DateTime<chrono::Utc>,
    #[serde(
        serialize_with = "crate::storage::types::serialize_datetime",
        deserialize_with = "crate::storage::types::deserialize_datetime",
        default
    )]
    window_end: chrono::DateTime<chrono::Utc>,
    offline: RankingMetrics,
    online: Option<RankingMetrics>,
    baseline_delta: Option<BaselineDelta>,
    human_review: Option<String>
});

impl AnalyticsSnapshot {
    pub fn new(
        tenant: &TenantContext,
        window_start: chrono::DateTime<chrono::Utc>,
        window_end: chrono::DateTime<chrono::Utc>,
        offline: RankingMetrics,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            window_start,
            window_end,
            offline,
            online: None,
            baseline_delta: None,
            human_review: None,
        }
    }
}
