//! Name-to-person matching
//!
//! Resolves extracted attendee and author names against the person store.
//! Matching is "first exact, else first prefix hit" with fixed confidences;
//! soft-deleted persons are never candidates.

use blb_common::db::Person;
use blb_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// First and last token equal to first_name and last_name
pub const EXACT_CONFIDENCE: f64 = 0.7;
/// First-name or last-name prefix hit
pub const FUZZY_CONFIDENCE: f64 = 0.6;
/// Prefix candidates considered per name
pub const FUZZY_CANDIDATE_LIMIT: i64 = 5;

/// A person matched to an extracted name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonMatch {
    pub person_id: String,
    pub matched_name: String,
    pub confidence: f64,
}

/// Match result for one extracted name, matched or not
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedAttendee {
    pub name: String,
    pub person_id: Option<String>,
    pub matched_name: Option<String>,
    pub confidence: f64,
}

/// Entity Matcher
pub struct EntityMatcher {
    db: SqlitePool,
}

impl EntityMatcher {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Match one name; `None` when neither pass finds a candidate
    ///
    /// **Algorithm:**
    /// 1. Split into first token and last token
    /// 2. Exact (case-insensitive) match on both names
    /// 3. Otherwise first_name prefix OR last_name prefix, first of at most 5
    pub async fn match_name(&self, name: &str) -> Result<Option<PersonMatch>> {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let (first, last) = match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(None),
        };

        let exact = sqlx::query(&format!(
            r#"
            SELECT {} FROM persons
            WHERE deleted_at IS NULL
              AND first_name = ? COLLATE NOCASE
              AND last_name = ? COLLATE NOCASE
            ORDER BY created_at, id
            LIMIT 1
            "#,
            Person::COLUMNS
        ))
        .bind(first)
        .bind(last)
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = exact {
            let person = Person::from_row(&row)?;
            tracing::debug!(name = %name, person_id = %person.id, "Exact name match");
            return Ok(Some(to_match(&person, EXACT_CONFIDENCE)));
        }

        let candidates = sqlx::query(&format!(
            r#"
            SELECT {} FROM persons
            WHERE deleted_at IS NULL
              AND (first_name LIKE ? ESCAPE '\' OR last_name LIKE ? ESCAPE '\')
            ORDER BY last_name, first_name, id
            LIMIT ?
            "#,
            Person::COLUMNS
        ))
        .bind(prefix_pattern(first))
        .bind(prefix_pattern(last))
        .bind(FUZZY_CANDIDATE_LIMIT)
        .fetch_all(&self.db)
        .await?;

        match candidates.first() {
            Some(row) => {
                let person = Person::from_row(row)?;
                tracing::debug!(
                    name = %name,
                    person_id = %person.id,
                    candidates = candidates.len(),
                    "Prefix name match"
                );
                Ok(Some(to_match(&person, FUZZY_CONFIDENCE)))
            }
            None => {
                tracing::debug!(name = %name, "No person matched");
                Ok(None)
            }
        }
    }

    /// Match every name, preserving input order
    pub async fn match_names(&self, names: &[String]) -> Result<Vec<MatchedAttendee>> {
        let mut matched = Vec::with_capacity(names.len());

        for name in names {
            let attendee = match self.match_name(name).await? {
                Some(m) => MatchedAttendee {
                    name: name.clone(),
                    person_id: Some(m.person_id),
                    matched_name: Some(m.matched_name),
                    confidence: m.confidence,
                },
                None => MatchedAttendee {
                    name: name.clone(),
                    person_id: None,
                    matched_name: None,
                    confidence: 0.0,
                },
            };
            matched.push(attendee);
        }

        Ok(matched)
    }
}

fn to_match(person: &Person, confidence: f64) -> PersonMatch {
    PersonMatch {
        person_id: person.id.clone(),
        matched_name: person.display_name(),
        confidence,
    }
}

/// `token%` with LIKE wildcards in the token escaped
fn prefix_pattern(token: &str) -> String {
    let mut pattern = String::with_capacity(token.len() + 1);
    for c in token.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
