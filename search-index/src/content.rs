use serde_json::{json, Value};

use common::storage::types::consultant::{Availability, Consultant};
use common::storage::types::requirement::{Requirement, RequirementStatus};

/// Assembled text + metadata for one indexable entity.
pub struct AssembledDocument {
    pub content: String,
    pub metadata: Value,
}

fn availability_label(availability: Availability) -> &'static str {
    match availability {
        Availability::Available => "Available",
        Availability::Interviewing => "Interviewing",
        Availability::Assigned => "Assigned",
        Availability::Unavailable => "Unavailable",
    }
}

fn status_label(status: RequirementStatus) -> &'static str {
    match status {
        RequirementStatus::Open => "Open",
        RequirementStatus::InProgress => "InProgress",
        RequirementStatus::OnHold => "OnHold",
        RequirementStatus::Closed => "Closed",
    }
}

/// Consultant content: name, summary, skills, tags, one block per line.
pub fn assemble_consultant(consultant: &Consultant, skill_names: &[String]) -> AssembledDocument {
    let content = format!(
        "{} {}\n{}\n{}\n{}",
        consultant.first_name,
        consultant.last_name,
        consultant.summary.as_deref().unwrap_or_default(),
        skill_names.join(", "),
        consultant.tags.join(", "),
    );

    let metadata = json!({
        "availability": availability_label(consultant.availability),
        "rate": consultant.rate,
        "skills": skill_names,
        "tags": consultant.tags,
        "location": consultant.location,
        "updated_at": consultant.updated_at.to_rfc3339(),
    });

    AssembledDocument { content, metadata }
}

/// Requirement content: title, client, description, skills.
pub fn assemble_requirement(requirement: &Requirement, skill_names: &[String]) -> AssembledDocument {
    let content = format!(
        "{}\n{}\n{}\n{}",
        requirement.title,
        requirement.client_name,
        requirement.description,
        skill_names.join(", "),
    );

    let metadata = json!({
        "status": status_label(requirement.status),
        "location": requirement.location,
        "rate_range": rate_range(requirement),
        "skills": skill_names,
        "posted_at": requirement.posted_at.to_rfc3339(),
        "closes_at": requirement.closes_at.map(|at| at.to_rfc3339()),
    });

    AssembledDocument { content, metadata }
}

fn rate_range(requirement: &Requirement) -> Option<[f64; 2]> {
    match (requirement.min_rate, requirement.max_rate) {
        (Some(min), Some(max)) => Some([min, max]),
        (Some(min), None) => Some([min, min]),
        (None, Some(max)) => Some([max, max]),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::TenantContext;

    #[test]
    fn consultant_content_layout() {
        let tenant = TenantContext::new("acme").expect("tenant");
        let mut consultant = Consultant::new_stub(&tenant, "Dana", "Reyes");
        consultant.summary = Some("Ten years of frontend work".to_string());
        consultant.tags = vec!["contract".to_string()];

        let assembled = assemble_consultant(
            &consultant,
            &["TypeScript".to_string(), "React".to_string()],
        );
        assert_eq!(
            assembled.content,
            "Dana Reyes\nTen years of frontend work\nTypeScript, React\ncontract"
        );
        assert_eq!(assembled.metadata["availability"], "Available");
        assert_eq!(assembled.metadata["skills"][0], "TypeScript");
    }

    #[test]
    fn requirement_metadata_carries_rate_range() {
        let tenant = TenantContext::new("acme").expect("tenant");
        let mut requirement =
            Requirement::new(&tenant, "TS Engineer", "Initech", "Build things", "api");
        requirement.min_rate = Some(80.0);
        requirement.max_rate = Some(120.0);

        let assembled = assemble_requirement(&requirement, &["TypeScript".to_string()]);
        assert_eq!(assembled.metadata["rate_range"][0], 80.0);
        assert_eq!(assembled.metadata["rate_range"][1], 120.0);
        assert!(assembled.content.starts_with("TS Engineer\nInitech\n"));
    }
}
