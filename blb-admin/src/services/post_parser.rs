//! Social post parser
//!
//! Turns a pasted session announcement into a structured session record with
//! a confidence score per field. Parsing is a pure function of the input and
//! never fails: anything unrecognized comes back as `None`/empty with zero
//! confidence.

use blb_common::db::SessionType;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Ordinal and type matched together
pub const SESSION_CONFIDENCE: f64 = 0.9;
/// Bare "<Type> Session" phrase
pub const BARE_SESSION_CONFIDENCE: f64 = 0.7;
pub const DATE_CONFIDENCE: f64 = 0.8;
pub const NAME_CONFIDENCE: f64 = 0.6;

static ORDINAL_SESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,6})(?:st|nd|rd|th)\s+(regular|special|inaugural)(?:\s+session)?\b")
        .unwrap()
});

static BARE_SESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(regular|special|inaugural)\s+session\b").unwrap());

static DATE_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
    )
    .unwrap()
});

static DATE_ABBREVIATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)\.?\s+\d{1,2},?\s+\d{4}\b")
        .unwrap()
});

static DATE_US: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap());

static DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());

/// Optional honorific, then two or more capitalized words (captured)
static ATTENDEE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:Hon\.?|Vice\s+Mayor|Mayor|Councilor)\s+)?([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+)+)",
    )
    .unwrap()
});

/// Fragments mentioning these describe the meeting, not who attended
const NON_NAME_VOCABULARY: [&str; 3] = ["session", "meeting", "agenda"];

/// Per-field confidence in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub session_type: f64,
    pub ordinal: f64,
    pub date: f64,
    pub attendee_names: f64,
}

/// Structured result of parsing one post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPost {
    pub session_type: Option<SessionType>,
    pub ordinal: Option<i64>,
    /// Date exactly as written in the post
    pub date: Option<String>,
    pub attendee_names: Vec<String>,
    pub confidence: Confidence,
}

impl ParsedPost {
    /// The matched date as `YYYY-MM-DD`, if it names a real calendar day
    pub fn iso_date(&self) -> Option<String> {
        self.date
            .as_deref()
            .and_then(normalize_date)
            .map(|d| d.format("%Y-%m-%d").to_string())
    }
}

/// Parse a pasted post
pub fn parse(content: &str) -> ParsedPost {
    let normalized = normalize_whitespace(content);
    let mut parsed = ParsedPost::default();

    if let Some((session_type, ordinal)) = match_ordinal_session(&normalized) {
        parsed.session_type = Some(session_type);
        parsed.ordinal = Some(ordinal);
        parsed.confidence.session_type = SESSION_CONFIDENCE;
        parsed.confidence.ordinal = SESSION_CONFIDENCE;
    } else if let Some(session_type) = match_bare_session(&normalized) {
        parsed.session_type = Some(session_type);
        parsed.confidence.session_type = BARE_SESSION_CONFIDENCE;
    }

    if let Some(date) = match_date(&normalized) {
        parsed.date = Some(date);
        parsed.confidence.date = DATE_CONFIDENCE;
    }

    parsed.attendee_names = extract_names(content);
    if !parsed.attendee_names.is_empty() {
        parsed.confidence.attendee_names = NAME_CONFIDENCE;
    }

    tracing::debug!(
        session_type = ?parsed.session_type,
        ordinal = ?parsed.ordinal,
        date = ?parsed.date,
        names = parsed.attendee_names.len(),
        "Parsed post"
    );

    parsed
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn match_ordinal_session(text: &str) -> Option<(SessionType, i64)> {
    let caps = ORDINAL_SESSION.captures(text)?;
    let ordinal = caps.get(1)?.as_str().parse().ok()?;
    let session_type = caps.get(2)?.as_str().parse().ok()?;
    Some((session_type, ordinal))
}

fn match_bare_session(text: &str) -> Option<SessionType> {
    let caps = BARE_SESSION.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// First hit wins, in the order long month, abbreviated month, US, ISO
fn match_date(text: &str) -> Option<String> {
    [&*DATE_LONG, &*DATE_ABBREVIATED, &*DATE_US, &*DATE_ISO]
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

fn extract_names(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for fragment in content.split(['.', '\n']) {
        let fragment = normalize_whitespace(fragment);
        if fragment.chars().count() < 3 {
            continue;
        }

        let lowered = fragment.to_lowercase();
        if NON_NAME_VOCABULARY.iter().any(|word| lowered.contains(word)) {
            continue;
        }

        if let Some(name) = ATTENDEE_NAME
            .captures(&fragment)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    names
}

fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.replace([',', '.'], "");
    let cleaned = normalize_whitespace(&cleaned);
    // chrono's %b only knows three-letter abbreviations
    let cleaned = match cleaned.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("sept ") => format!("Sep {}", &cleaned[5..]),
        _ => cleaned,
    };

    ["%B %d %Y", "%b %d %Y", "%m/%d/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "The 100th Regular Session of the Sangguniang Bayan was held on January 15, 2024.";

    #[test]
    fn test_sample_sentence() {
        let parsed = parse(SAMPLE);
        assert_eq!(parsed.session_type, Some(SessionType::Regular));
        assert_eq!(parsed.ordinal, Some(100));
        assert_eq!(parsed.date.as_deref(), Some("January 15, 2024"));
        assert!(parsed.confidence.session_type >= 0.8);
        assert!(parsed.confidence.ordinal >= 0.8);
        assert!(parsed.confidence.date >= 0.8);
    }

    #[test]
    fn test_no_session_phrase() {
        let parsed = parse("Thank you to everyone who joined the clean-up drive!");
        assert_eq!(parsed.session_type, None);
        assert_eq!(parsed.ordinal, None);
        assert_eq!(parsed.confidence.session_type, 0.0);
        assert_eq!(parsed.confidence.ordinal, 0.0);
    }

    #[test]
    fn test_bare_session_phrase_has_lower_confidence() {
        let parsed = parse("A Special Session was called this morning");
        assert_eq!(parsed.session_type, Some(SessionType::Special));
        assert_eq!(parsed.ordinal, None);
        assert_eq!(parsed.confidence.session_type, BARE_SESSION_CONFIDENCE);
        assert_eq!(parsed.confidence.ordinal, 0.0);
    }

    #[test]
    fn test_whitespace_is_normalized_before_matching() {
        let parsed = parse("the 3rd\n  inaugural   session on\tMarch   3,  2025");
        assert_eq!(parsed.session_type, Some(SessionType::Inaugural));
        assert_eq!(parsed.ordinal, Some(3));
        assert_eq!(parsed.date.as_deref(), Some("March 3, 2025"));
    }

    #[test]
    fn test_date_formats_in_priority_order() {
        assert_eq!(parse("held Feb. 2, 2024").date.as_deref(), Some("Feb. 2, 2024"));
        assert_eq!(parse("held 02/14/2024").date.as_deref(), Some("02/14/2024"));
        assert_eq!(parse("held 2024-02-14").date.as_deref(), Some("2024-02-14"));
        // Long month wins even when an ISO date appears first
        assert_eq!(
            parse("2024-01-01 recap of December 5, 2023").date.as_deref(),
            Some("December 5, 2023")
        );
        let none = parse("no date here");
        assert_eq!(none.date, None);
        assert_eq!(none.confidence.date, 0.0);
    }

    #[test]
    fn test_iso_date_normalization() {
        assert_eq!(parse(SAMPLE).iso_date().as_deref(), Some("2024-01-15"));
        assert_eq!(parse("on Sept. 9, 2024").iso_date().as_deref(), Some("2024-09-09"));
        assert_eq!(parse("on 07/04/2024").iso_date().as_deref(), Some("2024-07-04"));
        assert_eq!(parse("on 02/30/2024").iso_date(), None);
    }

    #[test]
    fn test_attendee_names_strip_honorifics_and_dedupe() {
        let content = "Present:\nHon. Maria Santos\nVice Mayor Jose Rizal\nCouncilor Ana Dela Cruz\nMaria Santos\nok";
        let parsed = parse(content);
        assert_eq!(
            parsed.attendee_names,
            vec![
                "Maria Santos".to_string(),
                "Jose Rizal".to_string(),
                "Ana Dela Cruz".to_string(),
            ]
        );
        assert_eq!(parsed.confidence.attendee_names, NAME_CONFIDENCE);
    }

    #[test]
    fn test_meeting_vocabulary_fragments_are_skipped() {
        let parsed = parse("Agenda Item Review\nRegular Meeting Minutes");
        assert!(parsed.attendee_names.is_empty());
        assert_eq!(parsed.confidence.attendee_names, 0.0);
    }

    #[test]
    fn test_malformed_input_never_panics() {
        for input in ["", "....", "\n\n\n", "99999999999th Regular Session", "🙂 Hon."] {
            let _ = parse(input);
        }
    }
}
