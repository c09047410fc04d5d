use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::error::AppError;

/// Grounded facts handed to the summariser. Everything a summary may state
/// must be present here; the collaborator contract forbids inventing facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSummaryFacts {
    pub consultant_name: String,
    pub availability: String,
    pub consultant_location: Option<String>,
    pub consultant_rate: Option<f64>,
    pub aligned_skills: Vec<String>,
    pub requirement_title: String,
    pub client_name: String,
    pub requirement_location: Option<String>,
    pub rate_range: Option<(f64, f64)>,
    pub skill_overlap: f64,
    pub location_match: f64,
    pub rate_alignment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub summary: String,
    pub highlights: Vec<String>,
    pub confidence: f64,
    pub grounded: bool,
    pub provider: String,
}

/// Summariser collaborator for the optional rerank stage.
#[async_trait]
pub trait MatchSummariser: Send + Sync {
    async fn summarise(&self, facts: &MatchSummaryFacts) -> Result<MatchSummary, AppError>;
}

/// Deterministic rule-based summariser, the default implementation. Builds
/// sentences strictly from the supplied facts.
pub struct RuleBasedSummariser;

#[async_trait]
impl MatchSummariser for RuleBasedSummariser {
    async fn summarise(&self, facts: &MatchSummaryFacts) -> Result<MatchSummary, AppError> {
        let mut highlights = Vec::new();

        if !facts.aligned_skills.is_empty() {
            highlights.push(format!(
                "Brings {} required skill{}: {}",
                facts.aligned_skills.len(),
                if facts.aligned_skills.len() == 1 { "" } else { "s" },
                facts.aligned_skills.join(", ")
            ));
        }
        highlights.push(format!("{} is {}", facts.consultant_name, facts.availability));

        if facts.location_match >= 0.99 {
            if let Some(location) = &facts.requirement_location {
                highlights.push(format!("Based in {location}, matching the requirement"));
            }
        } else if facts.location_match >= 0.8 {
            highlights.push("Remote arrangement covers the location gap".to_string());
        }

        if let (Some(rate), Some((min, max))) = (facts.consultant_rate, facts.rate_range) {
            if facts.rate_alignment >= 0.99 {
                highlights.push(format!(
                    "Rate ${rate:.0}/h sits inside the ${min:.0}-${max:.0} band"
                ));
            }
        }

        let summary = format!(
            "{} for {} at {}: {} aligned skill{} with {:.0}% skill coverage.",
            facts.consultant_name,
            facts.requirement_title,
            facts.client_name,
            facts.aligned_skills.len(),
            if facts.aligned_skills.len() == 1 { "" } else { "s" },
            facts.skill_overlap * 100.0
        );

        // Confidence grows with skill evidence and availability signals,
        // capped well below certainty.
        let confidence = (0.35
            + 0.1 * (facts.aligned_skills.len().min(3) as f64)
            + 0.15 * facts.skill_overlap
            + 0.1 * facts.rate_alignment)
            .clamp(0.0, 0.95);

        Ok(MatchSummary {
            summary,
            highlights,
            confidence,
            grounded: true,
            provider: "rules".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> MatchSummaryFacts {
        MatchSummaryFacts {
            consultant_name: "Dana Reyes".to_string(),
            availability: "available now".to_string(),
            consultant_location: Some("Austin, TX".to_string()),
            consultant_rate: Some(100.0),
            aligned_skills: vec!["TypeScript".to_string()],
            requirement_title: "Senior TypeScript Engineer".to_string(),
            client_name: "Initech".to_string(),
            requirement_location: Some("Austin, TX".to_string()),
            rate_range: Some((80.0, 120.0)),
            skill_overlap: 0.55,
            location_match: 1.0,
            rate_alignment: 1.0,
        }
    }

    #[tokio::test]
    async fn summary_is_deterministic_and_grounded() {
        let summariser = RuleBasedSummariser;
        let first = summariser.summarise(&facts()).await.expect("summarise");
        let second = summariser.summarise(&facts()).await.expect("summarise");

        assert_eq!(first, second);
        assert!(first.grounded);
        assert_eq!(first.provider, "rules");
        assert!((0.0..=1.0).contains(&first.confidence));
        assert!(first.summary.contains("Dana Reyes"));
        assert!(first.summary.contains("Initech"));
    }

    #[tokio::test]
    async fn highlights_only_state_supplied_facts() {
        let summariser = RuleBasedSummariser;
        let result = summariser.summarise(&facts()).await.expect("summarise");

        // Every named entity in the highlights appears in the input facts.
        let joined = result.highlights.join(" ");
        assert!(joined.contains("TypeScript"));
        assert!(joined.contains("Dana Reyes"));
        assert!(!joined.contains("Python"));
    }

    #[tokio::test]
    async fn sparse_facts_lower_confidence() {
        let summariser = RuleBasedSummariser;
        let sparse = MatchSummaryFacts {
            consultant_name: "Unknown Candidate".to_string(),
            availability: "unavailable".to_string(),
            requirement_title: "Role".to_string(),
            client_name: "Client".to_string(),
            ..MatchSummaryFacts::default()
        };
        let rich = summariser.summarise(&facts()).await.expect("summarise");
        let poor = summariser.summarise(&sparse).await.expect("summarise");
        assert!(rich.confidence > poor.confidence);
    }
}
