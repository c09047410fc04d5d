use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{json, Value};

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::pii_vault::{PiiType, PiiVaultEntry};
use common::utils::crypto::PiiVaultCrypto;

use crate::ner::Entity;

/// One detected PII span with its minted replacement token.
#[derive(Debug, Clone, PartialEq)]
pub struct PiiFinding {
    pub pii_type: PiiType,
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub token: String,
}

/// Redaction output: the rewritten text plus the accepted findings.
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    pub redacted_text: String,
    pub findings: Vec<PiiFinding>,
}

impl RedactionOutcome {
    pub fn counts(&self) -> BTreeMap<PiiType, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.pii_type).or_insert(0) += 1;
        }
        counts
    }

    /// `pii_summary` payload persisted on document metadata.
    pub fn summary(&self, vault_ids: &[String]) -> Value {
        let counts: BTreeMap<String, usize> = self
            .counts()
            .into_iter()
            .map(|(pii_type, count)| (pii_type.token_label().to_string(), count))
            .collect();
        json!({
            "counts": counts,
            "tokens": self
                .findings
                .iter()
                .map(|f| json!({"token": f.token, "type": f.pii_type.token_label()}))
                .collect::<Vec<_>>(),
            "vault": vault_ids,
        })
    }
}

struct DetectedSpan {
    pii_type: PiiType,
    start: usize,
    end: usize,
}

/// PII detector: regex for Email/Phone/Ssn plus NER-derived Person spans.
pub struct PiiRedactor {
    email: Regex,
    phone: Regex,
    ssn: Regex,
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiRedactor {
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            phone: Regex::new(
                r"(?:\+?\d{1,2}[\s.-]?)?(?:\(\d{3}\)|\d{3})[\s.-]\d{3}[\s.-]?\d{4}",
            )
            .unwrap(),
            ssn: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
        }
    }

    /// Detect, tokenise and rewrite. Overlapping findings resolve by
    /// earliest start; a span covered by an accepted finding is dropped,
    /// never re-entered.
    pub fn redact(
        &self,
        text: &str,
        person_entities: &[Entity],
        crypto: &PiiVaultCrypto,
    ) -> RedactionOutcome {
        let mut spans: Vec<DetectedSpan> = Vec::new();

        for found in self.email.find_iter(text) {
            spans.push(DetectedSpan {
                pii_type: PiiType::Email,
                start: found.start(),
                end: found.end(),
            });
        }
        // SSNs before phones: a 123-45-6789 run also looks phone-shaped.
        for found in self.ssn.find_iter(text) {
            spans.push(DetectedSpan {
                pii_type: PiiType::Ssn,
                start: found.start(),
                end: found.end(),
            });
        }
        for found in self.phone.find_iter(text) {
            spans.push(DetectedSpan {
                pii_type: PiiType::Phone,
                start: found.start(),
                end: found.end(),
            });
        }
        for entity in person_entities {
            spans.push(DetectedSpan {
                pii_type: PiiType::Person,
                start: entity.start,
                end: entity.end,
            });
        }

        // Earliest start wins; for identical starts prefer the longer span.
        spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut accepted: Vec<DetectedSpan> = Vec::new();
        let mut covered_until = 0usize;
        for span in spans {
            if span.start < covered_until {
                continue;
            }
            covered_until = span.end;
            accepted.push(span);
        }

        let mut redacted_text = String::with_capacity(text.len());
        let mut findings = Vec::with_capacity(accepted.len());
        let mut cursor = 0usize;

        for span in accepted {
            let original = &text[span.start..span.end];
            let token = crypto.mint_token(span.pii_type);

            redacted_text.push_str(&text[cursor..span.start]);
            redacted_text.push_str("{{");
            redacted_text.push_str(&token);
            redacted_text.push_str("}}");
            cursor = span.end;

            findings.push(PiiFinding {
                pii_type: span.pii_type,
                start: span.start,
                end: span.end,
                original: original.to_string(),
                token,
            });
        }
        redacted_text.push_str(&text[cursor..]);

        RedactionOutcome {
            redacted_text,
            findings,
        }
    }
}

/// Seal every finding's original into the vault; returns vault row ids.
pub async fn vault_findings(
    db: &SurrealDbClient,
    crypto: &PiiVaultCrypto,
    findings: &[PiiFinding],
) -> Result<Vec<String>, AppError> {
    let mut vault_ids = Vec::with_capacity(findings.len());
    for finding in findings {
        let sealed = crypto.seal(&finding.original)?;
        let entry = PiiVaultEntry::new(finding.token.clone(), finding.pii_type, sealed);
        let entry_id = entry.id.clone();
        db.store_item(entry).await?;
        vault_ids.push(entry_id);
    }
    Ok(vault_ids)
}
