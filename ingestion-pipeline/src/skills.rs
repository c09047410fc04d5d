use std::collections::{HashMap, HashSet};

use regex::RegexBuilder;
use tracing::debug;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::ontology_alias::OntologyAlias;
use common::storage::types::ontology_node::OntologyNode;
use common::storage::types::ontology_version::OntologyVersion;
use common::storage::types::skill::Skill;

/// Matched skills are capped; a resume listing every technology under the
/// sun should not produce an unbounded edge set.
pub const MAX_SKILL_MATCHES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillMatch {
    pub skill_id: String,
    pub name: String,
}

/// Case-insensitive, word-boundary matching of every known skill name
/// (and the active ontology version's aliases) against the text.
pub async fn match_skills(db: &SurrealDbClient, text: &str) -> Result<Vec<SkillMatch>, AppError> {
    let skills: Vec<Skill> = db.get_all_stored_items().await?;
    if skills.is_empty() {
        return Ok(Vec::new());
    }

    // name (lowercased) -> skill, direct names first.
    let mut lookup: HashMap<String, (String, String)> = HashMap::new();
    for skill in &skills {
        lookup
            .entry(skill.name.to_lowercase())
            .or_insert_with(|| (skill.id.clone(), skill.name.clone()));
    }

    // Active-ontology aliases map onto the skill linked to their node.
    if let Some(active) = OntologyVersion::active(db).await? {
        let nodes = OntologyNode::list_for_version(db, &active.id).await?;
        let node_to_skill: HashMap<&str, &Skill> = skills
            .iter()
            .filter_map(|skill| {
                skill
                    .ontology_node_id
                    .as_deref()
                    .map(|node_id| (node_id, skill))
            })
            .collect();
        let known_nodes: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();

        for alias in OntologyAlias::list_for_version(db, &active.id).await? {
            if !known_nodes.contains(alias.node_id.as_str()) {
                continue;
            }
            if let Some(skill) = node_to_skill.get(alias.node_id.as_str()) {
                lookup
                    .entry(alias.value.clone())
                    .or_insert_with(|| (skill.id.clone(), skill.name.clone()));
            }
        }
    }

    let mut matched: Vec<SkillMatch> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut names: Vec<&String> = lookup.keys().collect();
    // Deterministic scan order regardless of map iteration.
    names.sort();

    for name in names {
        if matched.len() >= MAX_SKILL_MATCHES {
            debug!(cap = MAX_SKILL_MATCHES, "skill match cap reached");
            break;
        }
        let Ok(pattern) = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(name)))
            .case_insensitive(true)
            .build()
        else {
            continue;
        };
        if pattern.is_match(text) {
            let (skill_id, canonical_name) = &lookup[name];
            if seen.insert(skill_id.clone()) {
                matched.push(SkillMatch {
                    skill_id: skill_id.clone(),
                    name: canonical_name.clone(),
                });
            }
        }
    }

    Ok(matched)
}

/// First ~N characters of the text on a char boundary, used as the resume
/// summary excerpt.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

/// First non-empty line, used as the resume headline.
pub fn headline(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
