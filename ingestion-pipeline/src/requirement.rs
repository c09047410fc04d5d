use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use common::error::AppError;

/// Structured fields extracted from raw requirement text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRequirement {
    pub title: String,
    pub client_name: String,
    pub location: Option<String>,
    pub suggested_rate: Option<f64>,
    pub skills: Vec<String>,
}

/// Structured-extraction collaborator for requirement text. The default
/// implementation is deterministic and rule-based; an LLM-backed one can
/// sit behind the same trait.
#[async_trait]
pub trait RequirementParser: Send + Sync {
    async fn parse(&self, raw_content: &str) -> Result<ParsedRequirement, AppError>;
}

/// Rule-based parser over labelled lines (`Title:`, `Client:`, ...) with
/// first-line fallbacks.
pub struct RuleBasedRequirementParser {
    rate: Regex,
}

impl Default for RuleBasedRequirementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBasedRequirementParser {
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        Self {
            rate: Regex::new(r"\$\s*(\d+(?:\.\d+)?)\s*(?:/|per\s+)(?:hr|hour)").unwrap(),
        }
    }

    fn labelled_value<'t>(text: &'t str, labels: &[&str]) -> Option<&'t str> {
        for line in text.lines() {
            let trimmed = line.trim();
            for label in labels {
                if let Some(rest) = trimmed
                    .strip_prefix(label)
                    .or_else(|| trimmed.strip_prefix(&label.to_lowercase()))
                {
                    let value = rest.trim_start_matches(':').trim();
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
        }
        None
    }
}

#[async_trait]
impl RequirementParser for RuleBasedRequirementParser {
    async fn parse(&self, raw_content: &str) -> Result<ParsedRequirement, AppError> {
        let text = raw_content.trim();
        if text.is_empty() {
            return Err(AppError::Validation("requirement content is empty".into()));
        }

        let title = Self::labelled_value(text, &["Title", "Role", "Position"])
            .map(str::to_string)
            .or_else(|| text.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string))
            .unwrap_or_else(|| "Untitled requirement".to_string());

        let client_name = Self::labelled_value(text, &["Client", "Company", "Account"])
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown client".to_string());

        let location = Self::labelled_value(text, &["Location", "Site"]).map(str::to_string);

        let suggested_rate = self
            .rate
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());

        let skills = Self::labelled_value(text, &["Skills", "Stack", "Technologies"])
            .map(|value| {
                value
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ParsedRequirement {
            title,
            client_name,
            location,
            suggested_rate,
            skills,
        })
    }
}
