//! Database models
//!
//! Enumerated columns are stored as lowercase TEXT. Parsing a request value
//! goes through `FromStr` and yields [`Error::Validation`]; parsing a stored
//! value that fails indicates a corrupt row and yields [`Error::Internal`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

/// Declares a TEXT-backed enum with `as_str`, `FromStr` and `Display`
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Validation(format!(
                        "invalid {} '{}' (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Kind of legislative document
    DocumentType {
        Ordinance => "ordinance",
        Resolution => "resolution",
        ExecutiveOrder => "executive_order",
    }
);

text_enum!(
    /// Kind of legislative session
    SessionType {
        Regular => "regular",
        Special => "special",
        Inaugural => "inaugural",
    }
);

text_enum!(
    /// Ingestion channel that produced a record
    SourceType {
        Facebook => "facebook",
        Website => "website",
        Manual => "manual",
    }
);

text_enum!(
    /// Field a two-source conflict is about
    ConflictType {
        MovedBy => "moved_by",
        SecondedBy => "seconded_by",
        Authors => "authors",
        Title => "title",
        None => "none",
    }
);

text_enum!(
    /// Conflict lifecycle: `unresolved` → `resolved` | `skipped`
    ConflictStatus {
        Unresolved => "unresolved",
        Resolved => "resolved",
        Skipped => "skipped",
    }
);

text_enum!(
    /// What happens to merged-away persons
    DeletionMode {
        Delete => "delete",
        Flag => "flag",
        Skip => "skip",
    }
);

text_enum!(
    /// Requested field-merge strategy (recorded; behaviour is always `prefer_keep`)
    MergeStrategy {
        PreferKeep => "prefer_keep",
        PreferMerge => "prefer_merge",
        Newest => "newest",
        MostComplete => "most_complete",
    }
);

impl Default for DeletionMode {
    fn default() -> Self {
        DeletionMode::Delete
    }
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::PreferKeep
    }
}

/// Parse an enum column read back from the store
fn stored<T: FromStr<Err = Error>>(column: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|e| Error::Internal(format!("corrupt {} column: {}", column, e)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl Person {
    /// Columns expected by [`Person::from_row`]
    pub const COLUMNS: &'static str =
        "id, first_name, middle_name, last_name, suffix, aliases, created_at, deleted_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let aliases: Option<String> = row.try_get("aliases")?;
        let aliases = match aliases.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| Error::Internal(format!("corrupt aliases column: {}", e)))?,
        };

        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            middle_name: row.try_get("middle_name")?,
            last_name: row.try_get("last_name")?,
            suffix: row.try_get("suffix")?,
            aliases,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    /// "First Middle Last Suffix" with absent parts skipped
    pub fn display_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
            self.suffix.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub number: String,
    pub title: String,
    pub session_id: Option<String>,
    pub status: String,
    pub moved_by: Option<String>,
    pub seconded_by: Option<String>,
    pub source_type: SourceType,
    pub processed: bool,
    pub needs_review: bool,
}

impl Document {
    pub const COLUMNS: &'static str = "id, type, number, title, session_id, status, moved_by, \
         seconded_by, source_type, processed, needs_review";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let doc_type: String = row.try_get("type")?;
        let source_type: String = row.try_get("source_type")?;

        Ok(Self {
            id: row.try_get("id")?,
            doc_type: stored("documents.type", &doc_type)?,
            number: row.try_get("number")?,
            title: row.try_get("title")?,
            session_id: row.try_get("session_id")?,
            status: row.try_get("status")?,
            moved_by: row.try_get("moved_by")?,
            seconded_by: row.try_get("seconded_by")?,
            source_type: stored("documents.source_type", &source_type)?,
            processed: row.try_get::<i64, _>("processed")? != 0,
            needs_review: row.try_get::<i64, _>("needs_review")? != 0,
        })
    }
}

/// Field-level disagreement between the social post and the official site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConflict {
    pub id: String,
    pub document_id: String,
    pub conflict_type: ConflictType,
    pub social_value: Option<String>,
    pub official_value: Option<String>,
    pub resolved_value: Option<String>,
    pub status: ConflictStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl DataConflict {
    pub const COLUMNS: &'static str = "id, document_id, conflict_type, social_value, \
         official_value, resolved_value, status, notes, created_at, resolved_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let conflict_type: String = row.try_get("conflict_type")?;
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            document_id: row.try_get("document_id")?,
            conflict_type: stored("data_conflicts.conflict_type", &conflict_type)?,
            social_value: row.try_get("social_value")?,
            official_value: row.try_get("official_value")?,
            resolved_value: row.try_get("resolved_value")?,
            status: stored("data_conflicts.status", &status)?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub actor: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: String,
}

impl AuditEntry {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let details: String = row.try_get("details")?;

        Ok(Self {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            actor: row.try_get("actor")?,
            target_type: row.try_get("target_type")?,
            target_id: row.try_get("target_id")?,
            details: serde_json::from_str(&details)
                .map_err(|e| Error::Internal(format!("corrupt audit details: {}", e)))?,
            created_at: row.try_get("created_at")?,
        })
    }
}
