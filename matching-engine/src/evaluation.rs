use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::analytics_snapshot::{AnalyticsSnapshot, BaselineDelta, RankingMetrics};
use common::storage::types::match_feedback::MatchFeedback;
use common::storage::types::match_record::MatchRecord;
use common::storage::types::submission::Submission;
use common::storage::TenantContext;

#[derive(Debug, Clone, Copy)]
pub struct EvaluationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Rank cutoff for nDCG and hit rate.
    pub k: usize,
    /// Minimum relevance counting as a hit.
    pub relevance_threshold: f64,
    /// Online metrics restrict to matches created this close to the window
    /// end.
    pub online_window_hours: i64,
    pub baseline: Option<RankingMetrics>,
    pub human_review: Option<String>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            k: 10,
            relevance_threshold: 1.0,
            online_window_hours: 24,
            baseline: None,
            human_review: None,
        }
    }
}

struct GradedMatch {
    record: MatchRecord,
    relevance: f64,
    has_feedback: bool,
}

/// `DCG@K = Σ relᵢ / log2(i+1)` over the first K ranks (1-based).
fn dcg_at_k(relevances: &[f64], k: usize) -> f64 {
    relevances
        .iter()
        .take(k)
        .enumerate()
        .map(|(index, relevance)| relevance / ((index + 2) as f64).log2())
        .sum()
}

fn ndcg_at_k(relevances: &[f64], k: usize) -> f64 {
    let dcg = dcg_at_k(relevances, k);
    let mut ideal: Vec<f64> = relevances.to_vec();
    ideal.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let ideal_dcg = dcg_at_k(&ideal, k);
    if ideal_dcg == 0.0 {
        0.0
    } else {
        dcg / ideal_dcg
    }
}

fn hit_at_k(relevances: &[f64], k: usize, threshold: f64) -> f64 {
    if relevances
        .iter()
        .take(k)
        .any(|relevance| *relevance >= threshold)
    {
        1.0
    } else {
        0.0
    }
}

fn metrics_over(graded: &[&GradedMatch], k: usize, threshold: f64) -> RankingMetrics {
    // Group by requirement, ranked by descending score within each.
    let mut by_requirement: HashMap<&str, Vec<&GradedMatch>> = HashMap::new();
    for graded_match in graded {
        by_requirement
            .entry(graded_match.record.requirement_id.as_str())
            .or_default()
            .push(graded_match);
    }

    let mut ndcg_sum = 0.0;
    let mut hit_sum = 0.0;
    for ranked in by_requirement.values_mut() {
        ranked.sort_by(|a, b| {
            b.record
                .score
                .partial_cmp(&a.record.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let relevances: Vec<f64> = ranked.iter().map(|g| g.relevance).collect();
        ndcg_sum += ndcg_at_k(&relevances, k);
        hit_sum += hit_at_k(&relevances, k, threshold);
    }

    let sample_size = by_requirement.len();
    let with_feedback = graded.iter().filter(|g| g.has_feedback).count();
    let coverage = if graded.is_empty() {
        0.0
    } else {
        with_feedback as f64 / graded.len() as f64
    };

    RankingMetrics {
        ndcg_at_k: if sample_size == 0 {
            0.0
        } else {
            ndcg_sum / sample_size as f64
        },
        hit_rate_at_k: if sample_size == 0 {
            0.0
        } else {
            hit_sum / sample_size as f64
        },
        coverage,
        sample_size,
    }
}

/// Run one evaluation over the tenant's matches in the window and persist
/// an analytics snapshot.
pub async fn evaluate(
    db: &SurrealDbClient,
    tenant: &TenantContext,
    window: EvaluationWindow,
    options: EvaluationOptions,
) -> Result<AnalyticsSnapshot, AppError> {
    let mut response = db
        .client
        .query(
            "SELECT * FROM match_record
             WHERE tenant_id = $tenant
               AND created_at >= $start AND created_at <= $end",
        )
        .bind(("tenant", tenant.tenant_id().to_owned()))
        .bind(("start", surrealdb::sql::Datetime::from(window.start)))
        .bind(("end", surrealdb::sql::Datetime::from(window.end)))
        .await?;
    let records: Vec<MatchRecord> = response.take(0)?;

    // Grade every match: max of feedback, match-status and submission
    // relevance.
    let mut graded = Vec::with_capacity(records.len());
    for record in records {
        let feedback = MatchFeedback::list_for_match(db, tenant, &record.id).await?;
        let feedback_relevance = feedback
            .iter()
            .map(|row| row.outcome.relevance())
            .fold(0.0, f64::max);

        let submissions = Submission::list_for_match(db, tenant, &record.id).await?;
        let submission_relevance = submissions
            .iter()
            .map(|row| row.status.relevance())
            .fold(0.0, f64::max);

        let relevance = feedback_relevance
            .max(record.status.relevance())
            .max(submission_relevance);

        graded.push(GradedMatch {
            has_feedback: !feedback.is_empty(),
            relevance,
            record,
        });
    }

    let offline_refs: Vec<&GradedMatch> = graded.iter().collect();
    let offline = metrics_over(&offline_refs, options.k, options.relevance_threshold);

    let online_start = window.end - Duration::hours(options.online_window_hours);
    let online_refs: Vec<&GradedMatch> = graded
        .iter()
        .filter(|g| g.record.created_at >= online_start && g.record.created_at <= window.end)
        .collect();
    let online = if online_refs.is_empty() {
        None
    } else {
        Some(metrics_over(
            &online_refs,
            options.k,
            options.relevance_threshold,
        ))
    };

    let baseline_delta = options.baseline.as_ref().map(|baseline| BaselineDelta {
        ndcg_at_k: offline.ndcg_at_k - baseline.ndcg_at_k,
        hit_rate_at_k: offline.hit_rate_at_k - baseline.hit_rate_at_k,
    });

    let mut snapshot = AnalyticsSnapshot::new(tenant, window.start, window.end, offline);
    snapshot.online = online;
    snapshot.baseline_delta = baseline_delta;
    snapshot.human_review = options.human_review;

    let stored = db
        .store_tenant_item(tenant, snapshot)
        .await?
        .ok_or_else(|| AppError::InternalError("snapshot insert returned no row".into()))?;

    info!(
        tenant = tenant.tenant_id(),
        ndcg = stored.offline.ndcg_at_k,
        hit_rate = stored.offline.hit_rate_at_k,
        coverage = stored.offline.coverage,
        sample_size = stored.offline.sample_size,
        "evaluation snapshot persisted"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::match_feedback::FeedbackOutcome;
    use common::storage::types::submission::SubmissionStatus;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn ndcg_of_ideal_ranking_is_one() {
        assert_eq!(ndcg_at_k(&[3.0, 2.0, 1.0], 10), 1.0);
        // Best item at the bottom: strictly below one.
        let inverted = ndcg_at_k(&[0.0, 0.0, 3.0], 10);
        assert!(inverted > 0.0 && inverted < 1.0);
        // No relevance anywhere: defined as zero.
        assert_eq!(ndcg_at_k(&[0.0, 0.0], 10), 0.0);
    }

    #[test]
    fn hit_respects_cutoff_and_threshold() {
        assert_eq!(hit_at_k(&[0.0, 2.0], 10, 1.0), 1.0);
        assert_eq!(hit_at_k(&[0.0, 2.0], 1, 1.0), 0.0);
        assert_eq!(hit_at_k(&[0.5], 10, 1.0), 0.0);
    }

    async fn fixture() -> (Arc<SurrealDbClient>, TenantContext) {
        let database = Uuid::new_v4().to_string();
        let db = Arc::new(
            SurrealDbClient::memory("eval_ns", &database)
                .await
                .expect("in-memory surrealdb"),
        );
        db.ensure_schema().await.expect("schema");
        (db, TenantContext::new("acme").expect("tenant"))
    }

    async fn seed_match(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant: &str,
        requirement: &str,
        score: f64,
    ) -> String {
        let record = MatchRecord::new(tenant, consultant, requirement, score, serde_json::json!({}));
        let id = record.id.clone();
        db.store_tenant_item(tenant, record).await.expect("match");
        id
    }

    #[tokio::test]
    async fn windowed_evaluation_matches_expected_metrics() {
        let (db, tenant) = fixture().await;

        // req-1: one match at rank 1 with positive feedback.
        let m1 = seed_match(&db, &tenant, "c1", "req-1", 0.9).await;
        db.store_tenant_item(
            &tenant,
            MatchFeedback::new(&tenant, m1.clone(), FeedbackOutcome::Positive),
        )
        .await
        .expect("feedback");

        // req-2: rank 1 submitted (no feedback), rank 2 negative feedback,
        // plus two unranked-relevant matches without feedback.
        let m2 = seed_match(&db, &tenant, "c2", "req-2", 0.8).await;
        db.store_tenant_item(
            &tenant,
            Submission::new(&tenant, m2.clone(), SubmissionStatus::Submitted),
        )
        .await
        .expect("submission");
        let m3 = seed_match(&db, &tenant, "c3", "req-2", 0.6).await;
        db.store_tenant_item(
            &tenant,
            MatchFeedback::new(&tenant, m3.clone(), FeedbackOutcome::Negative),
        )
        .await
        .expect("feedback");

        let window = EvaluationWindow {
            start: Utc::now() - Duration::hours(1),
            end: Utc::now() + Duration::hours(1),
        };
        let snapshot = evaluate(&db, &tenant, window, EvaluationOptions::default())
            .await
            .expect("evaluate");

        // Both requirements rank their relevant match first.
        assert_eq!(snapshot.offline.ndcg_at_k, 1.0);
        assert_eq!(snapshot.offline.hit_rate_at_k, 1.0);
        assert_eq!(snapshot.offline.sample_size, 2);
        // Two of three matches carry feedback rows.
        assert!((snapshot.offline.coverage - 2.0 / 3.0).abs() < 1e-9);
        // Fresh matches all fall inside the online window.
        assert!(snapshot.online.is_some());
    }

    #[tokio::test]
    async fn coverage_counts_matches_with_feedback() {
        let (db, tenant) = fixture().await;

        let covered = seed_match(&db, &tenant, "c1", "req-1", 0.9).await;
        db.store_tenant_item(
            &tenant,
            MatchFeedback::new(&tenant, covered, FeedbackOutcome::Positive),
        )
        .await
        .expect("feedback");
        for n in 0..3 {
            seed_match(&db, &tenant, &format!("c{}", n + 2), "req-1", 0.5).await;
        }

        let window = EvaluationWindow {
            start: Utc::now() - Duration::hours(1),
            end: Utc::now() + Duration::hours(1),
        };
        let snapshot = evaluate(&db, &tenant, window, EvaluationOptions::default())
            .await
            .expect("evaluate");
        assert!((snapshot.offline.coverage - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn baseline_delta_is_recorded() {
        let (db, tenant) = fixture().await;

        let m1 = seed_match(&db, &tenant, "c1", "req-1", 0.9).await;
        db.store_tenant_item(
            &tenant,
            MatchFeedback::new(&tenant, m1, FeedbackOutcome::Hired),
        )
        .await
        .expect("feedback");

        let window = EvaluationWindow {
            start: Utc::now() - Duration::hours(1),
            end: Utc::now() + Duration::hours(1),
        };
        let options = EvaluationOptions {
            baseline: Some(RankingMetrics {
                ndcg_at_k: 0.6,
                hit_rate_at_k: 0.5,
                coverage: 0.2,
                sample_size: 10,
            }),
            human_review: Some("weekly review".to_string()),
            ..EvaluationOptions::default()
        };
        let snapshot = evaluate(&db, &tenant, window, options).await.expect("evaluate");

        let delta = snapshot.baseline_delta.expect("delta");
        assert!((delta.ndcg_at_k - 0.4).abs() < 1e-9);
        assert!((delta.hit_rate_at_k - 0.5).abs() < 1e-9);
        assert_eq!(snapshot.human_review.as_deref(), Some("weekly review"));
    }

    #[tokio::test]
    async fn matches_outside_the_window_are_ignored() {
        let (db, tenant) = fixture().await;
        seed_match(&db, &tenant, "c1", "req-1", 0.9).await;

        let window = EvaluationWindow {
            start: Utc::now() - Duration::days(30),
            end: Utc::now() - Duration::days(29),
        };
        let snapshot = evaluate(&db, &tenant, window, EvaluationOptions::default())
            .await
            .expect("evaluate");
        assert_eq!(snapshot.offline.sample_size, 0);
        assert_eq!(snapshot.offline.ndcg_at_k, 0.0);
        assert!(snapshot.online.is_none());
    }
}
