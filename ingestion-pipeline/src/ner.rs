use async_trait::async_trait;
use regex::Regex;

use common::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    Person,
}

/// A recognised span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub label: EntityLabel,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Entity-recognition collaborator. Person detection is the minimum
/// contract; implementations may surface more.
#[async_trait]
pub trait NamedEntityRecognizer: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, AppError>;
}

/// Leading tokens that look like names but open salutations or section
/// headers instead.
const LEADING_STOPWORDS: [&str; 10] = [
    "Contact", "Dear", "Hello", "Hi", "Regards", "Sincerely", "Resume", "Curriculum", "From", "To",
];

/// Deterministic regex fallback: runs of two or more capitalised words,
/// with salutation-style leading tokens trimmed off.
pub struct RegexNer {
    pattern: Regex,
}

impl Default for RegexNer {
    fn default() -> Self {
        Self::new()
    }
}

impl RegexNer {
    pub fn new() -> Self {
        // Unwrap is fine on a literal pattern.
        #[allow(clippy::unwrap_used)]
        let pattern = Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)+\b").unwrap();
        Self { pattern }
    }

    fn trim_leading_stopwords<'t>(candidate: &'t str, match_start: usize) -> (&'t str, usize) {
        let mut remaining = candidate;
        let mut offset = 0;
        loop {
            let Some((head, tail)) = remaining.split_once(' ') else {
                break;
            };
            if LEADING_STOPWORDS.contains(&head) {
                offset += head.len() + 1;
                remaining = tail;
            } else {
                break;
            }
        }
        (remaining, match_start + offset)
    }
}

#[async_trait]
impl NamedEntityRecognizer for RegexNer {
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, AppError> {
        let mut entities = Vec::new();
        for found in self.pattern.find_iter(text) {
            let (candidate, start) = Self::trim_leading_stopwords(found.as_str(), found.start());
            // A person needs at least a first and last name after trimming.
            if candidate.split(' ').count() < 2 {
                continue;
            }
            entities.push(Entity {
                label: EntityLabel::Person,
                text: candidate.to_string(),
                start,
                end: start + candidate.len(),
            });
        }
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_person_after_salutation() {
        let ner = RegexNer::new();
        let entities = ner
            .recognize("Contact Jane Doe at jane.doe@acme.io or 415-555-0134")
            .await
            .expect("recognize");

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Jane Doe");
        assert_eq!(entities[0].label, EntityLabel::Person);
        assert_eq!(
            &"Contact Jane Doe at jane.doe@acme.io"[entities[0].start..entities[0].end],
            "Jane Doe"
        );
    }

    #[tokio::test]
    async fn single_capitalised_words_are_not_people() {
        let ner = RegexNer::new();
        let entities = ner
            .recognize("Resume submitted for review. Thanks!")
            .await
            .expect("recognize");
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn multiple_people_are_found() {
        let ner = RegexNer::new();
        let entities = ner
            .recognize("Jane Doe worked with Alex Moreno on the migration.")
            .await
            .expect("recognize");
        let names: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(names, vec!["Jane Doe", "Alex Moreno"]);
    }
}
