//! Bulk document ingestion
//!
//! Creates documents extracted from a post. Each item runs in its own
//! transaction so one bad item never aborts the batch. An item whose `number`
//! already exists is a duplicate, not an error:
//!
//! - with a per-item `duplicate_resolution` the existing row is left alone
//!   (`skip`), overwritten (`replace`) or merged (`merge`: authors are
//!   unioned, only the selected scalar fields are overwritten)
//! - without one, differing fields are recorded as unresolved conflicts and
//!   the item is returned in `duplicates`
//! - without one and with `skip_duplicates`, the item is reported in `errors`
//!   with code `DUPLICATE_KEY`

use crate::db::conflicts;
use crate::db::documents::{self, DocumentField, NewDocument};
use crate::db::persons::missing_person_ids;
use crate::db::sessions::session_exists;
use crate::db::audit;
use crate::utils::begin_monitored;
use blb_common::api::Actor;
use blb_common::db::{ConflictType, Document, DocumentType, SourceType};
use blb_common::{Error, IdGenerator, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

/// One document as submitted by the operator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentInput {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub number: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub moved_by: Option<String>,
    pub seconded_by: Option<String>,
    #[serde(default)]
    pub author_ids: Vec<String>,
    pub source_type: Option<String>,
    pub duplicate_resolution: Option<DuplicateResolution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateAction {
    Skip,
    Replace,
    Merge,
}

/// Document fields an operator can carry over onto an existing row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFieldChoice {
    Title,
    MovedBy,
    SecondedBy,
    Authors,
}

impl DocumentFieldChoice {
    const ALL: [DocumentFieldChoice; 4] = [
        DocumentFieldChoice::Title,
        DocumentFieldChoice::MovedBy,
        DocumentFieldChoice::SecondedBy,
        DocumentFieldChoice::Authors,
    ];
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateResolution {
    pub action: DuplicateAction,
    /// Fields to overwrite; empty means every field for `replace` and none for `merge`
    #[serde(default)]
    pub fields: Vec<DocumentFieldChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedDocument {
    pub index: usize,
    pub id: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedDocument {
    pub index: usize,
    pub id: String,
    pub number: String,
    pub action: DuplicateAction,
    pub fields: Vec<DocumentFieldChoice>,
}

/// Duplicate awaiting operator resolution
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateDocument {
    pub index: usize,
    pub number: String,
    pub existing: Document,
    pub differing_fields: Vec<ConflictType>,
    pub conflict_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub index: usize,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub success: bool,
    pub created: Vec<CreatedDocument>,
    pub updated: Vec<UpdatedDocument>,
    pub skipped: Vec<CreatedDocument>,
    pub duplicates: Vec<DuplicateDocument>,
    pub errors: Vec<ItemError>,
}

/// A validated input item
struct ValidItem {
    doc_type: DocumentType,
    number: String,
    title: String,
    status: String,
    moved_by: Option<String>,
    seconded_by: Option<String>,
    author_ids: Vec<String>,
    source_type: SourceType,
}

enum ItemOutcome {
    Created(CreatedDocument),
    Updated(UpdatedDocument),
    Skipped(CreatedDocument),
    Duplicate(DuplicateDocument),
}

/// Bulk document ingestion service
pub struct BulkDocumentIngester {
    db: SqlitePool,
    ids: Arc<dyn IdGenerator>,
}

impl BulkDocumentIngester {
    pub fn new(db: SqlitePool, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Create a batch of documents
    ///
    /// Only an unknown `session_id` fails the whole request (`NotFound`,
    /// before any write). Every per-item problem is reported by index.
    pub async fn bulk_create(
        &self,
        session_id: Option<&str>,
        items: &[DocumentInput],
        skip_duplicates: bool,
        actor: &Actor,
    ) -> Result<BulkOutcome> {
        if let Some(session_id) = session_id {
            let mut conn = self.db.acquire().await?;
            if !session_exists(&mut conn, session_id).await? {
                return Err(Error::NotFound(format!("Session not found: {}", session_id)));
            }
        }

        let mut outcome = BulkOutcome::default();

        for (index, input) in items.iter().enumerate() {
            match self.process_item(index, input, session_id, skip_duplicates).await {
                Ok(ItemOutcome::Created(doc)) => outcome.created.push(doc),
                Ok(ItemOutcome::Updated(doc)) => outcome.updated.push(doc),
                Ok(ItemOutcome::Skipped(doc)) => outcome.skipped.push(doc),
                Ok(ItemOutcome::Duplicate(dup)) => outcome.duplicates.push(dup),
                Err(e) => {
                    tracing::debug!(index = index, code = e.code(), error = %e, "Bulk item rejected");
                    outcome.errors.push(ItemError {
                        index,
                        error: e.to_string(),
                        code: e.code().to_string(),
                    });
                }
            }
        }

        outcome.success = outcome.errors.is_empty();

        // Items are already committed; an audit failure must not hide their outcome
        if let Err(e) = self.append_batch_audit(items.len(), &outcome, session_id, actor).await {
            tracing::error!(
                session = ?session_id,
                error = %e,
                "Failed to write bulk create audit entry"
            );
        }

        tracing::info!(
            session = ?session_id,
            created = outcome.created.len(),
            updated = outcome.updated.len(),
            skipped = outcome.skipped.len(),
            duplicates = outcome.duplicates.len(),
            errors = outcome.errors.len(),
            actor = %actor,
            "Bulk document create complete"
        );

        Ok(outcome)
    }

    async fn append_batch_audit(
        &self,
        submitted: usize,
        outcome: &BulkOutcome,
        session_id: Option<&str>,
        actor: &Actor,
    ) -> Result<()> {
        let mut tx = begin_monitored(&self.db, "bulk_documents::audit").await?;
        audit::append(
            &mut tx,
            &self.ids.new_id(),
            "bulk_create_documents",
            actor,
            "session",
            session_id,
            &json!({
                "submitted": submitted,
                "created": outcome.created.iter().map(|d| &d.id).collect::<Vec<_>>(),
                "updated": outcome.updated.iter().map(|d| &d.id).collect::<Vec<_>>(),
                "duplicates": outcome.duplicates.len(),
                "errors": outcome.errors.len(),
            }),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn process_item(
        &self,
        index: usize,
        input: &DocumentInput,
        session_id: Option<&str>,
        skip_duplicates: bool,
    ) -> Result<ItemOutcome> {
        let item = validate(input)?;

        let mut tx = begin_monitored(&self.db, "bulk_documents::item").await?;
        let result = self
            .process_valid(&mut tx, index, &item, input, session_id, skip_duplicates)
            .await;

        match result {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn process_valid(
        &self,
        conn: &mut SqliteConnection,
        index: usize,
        item: &ValidItem,
        input: &DocumentInput,
        session_id: Option<&str>,
        skip_duplicates: bool,
    ) -> Result<ItemOutcome> {
        check_person_references(conn, item).await?;

        let existing = match documents::find_by_number(conn, &item.number).await? {
            None => {
                let id = self.ids.new_id();
                documents::insert_document(
                    conn,
                    &NewDocument {
                        id: id.clone(),
                        doc_type: item.doc_type,
                        number: item.number.clone(),
                        title: item.title.clone(),
                        session_id: session_id.map(str::to_string),
                        status: item.status.clone(),
                        moved_by: item.moved_by.clone(),
                        seconded_by: item.seconded_by.clone(),
                        source_type: item.source_type,
                    },
                )
                .await?;
                documents::add_authors(conn, &id, &item.author_ids).await?;

                return Ok(ItemOutcome::Created(CreatedDocument {
                    index,
                    id,
                    number: item.number.clone(),
                }));
            }
            Some(existing) => existing,
        };

        match &input.duplicate_resolution {
            Some(resolution) => apply_resolution(conn, index, &existing, item, resolution).await,
            None if skip_duplicates => Err(Error::DuplicateKey(format!(
                "Document number already exists: {}",
                item.number
            ))),
            None => self.record_conflicts(conn, index, existing, item).await,
        }
    }

    /// Store each differing field as an unresolved conflict
    async fn record_conflicts(
        &self,
        conn: &mut SqliteConnection,
        index: usize,
        existing: Document,
        item: &ValidItem,
    ) -> Result<ItemOutcome> {
        let existing_authors = documents::author_ids(conn, &existing.id).await?;
        let mut differing: Vec<(ConflictType, Option<String>, Option<String>)> = Vec::new();

        if item.title != existing.title {
            differing.push((
                ConflictType::Title,
                Some(item.title.clone()),
                Some(existing.title.clone()),
            ));
        }
        if item.moved_by.is_some() && item.moved_by != existing.moved_by {
            differing.push((ConflictType::MovedBy, item.moved_by.clone(), existing.moved_by.clone()));
        }
        if item.seconded_by.is_some() && item.seconded_by != existing.seconded_by {
            differing.push((
                ConflictType::SecondedBy,
                item.seconded_by.clone(),
                existing.seconded_by.clone(),
            ));
        }
        if !item.author_ids.is_empty() && !same_set(&item.author_ids, &existing_authors) {
            differing.push((
                ConflictType::Authors,
                Some(conflicts::encode_authors(&item.author_ids)?),
                Some(conflicts::encode_authors(&existing_authors)?),
            ));
        }

        let mut conflict_ids = Vec::new();
        for (conflict_type, social, official) in &differing {
            if conflicts::unresolved_exists(conn, &existing.id, *conflict_type, social.as_deref())
                .await?
            {
                continue;
            }
            let id = self.ids.new_id();
            conflicts::insert_conflict(
                conn,
                &id,
                &existing.id,
                *conflict_type,
                social.as_deref(),
                official.as_deref(),
            )
            .await?;
            conflict_ids.push(id);
        }

        if !conflict_ids.is_empty() {
            documents::mark_needs_review(conn, &existing.id).await?;
            tracing::info!(
                document = %existing.id,
                number = %existing.number,
                conflicts = conflict_ids.len(),
                "Recorded conflicts for duplicate document"
            );
        }

        Ok(ItemOutcome::Duplicate(DuplicateDocument {
            index,
            number: item.number.clone(),
            differing_fields: differing.iter().map(|(t, _, _)| *t).collect(),
            conflict_ids,
            existing,
        }))
    }
}

/// Required fields and enum values, checked before touching the store
fn validate(input: &DocumentInput) -> Result<ValidItem> {
    let required = |value: &Option<String>, field: &str| -> Result<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Validation(format!("Missing required field: {}", field)))
    };

    let doc_type: DocumentType = required(&input.doc_type, "type")?.parse()?;
    let number = required(&input.number, "number")?;
    let title = required(&input.title, "title")?;
    let source_type = match input.source_type.as_deref() {
        Some(raw) => raw.parse()?,
        None => SourceType::Facebook,
    };

    let mut author_ids: Vec<String> = Vec::new();
    for id in &input.author_ids {
        let id = id.trim();
        if !id.is_empty() && !author_ids.iter().any(|a| a == id) {
            author_ids.push(id.to_string());
        }
    }

    let optional = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Ok(ValidItem {
        doc_type,
        number,
        title,
        status: optional(&input.status).unwrap_or_else(|| "active".to_string()),
        moved_by: optional(&input.moved_by),
        seconded_by: optional(&input.seconded_by),
        author_ids,
        source_type,
    })
}

async fn check_person_references(conn: &mut SqliteConnection, item: &ValidItem) -> Result<()> {
    let mut referenced: Vec<String> = item.author_ids.clone();
    referenced.extend(item.moved_by.iter().cloned());
    referenced.extend(item.seconded_by.iter().cloned());

    let missing = missing_person_ids(conn, &referenced).await?;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Unknown person ids: {}",
            missing.join(", ")
        )))
    }
}

async fn apply_resolution(
    conn: &mut SqliteConnection,
    index: usize,
    existing: &Document,
    item: &ValidItem,
    resolution: &DuplicateResolution,
) -> Result<ItemOutcome> {
    let fields: Vec<DocumentFieldChoice> = match resolution.action {
        DuplicateAction::Skip => {
            return Ok(ItemOutcome::Skipped(CreatedDocument {
                index,
                id: existing.id.clone(),
                number: existing.number.clone(),
            }));
        }
        DuplicateAction::Replace if resolution.fields.is_empty() => {
            DocumentFieldChoice::ALL.to_vec()
        }
        _ => resolution.fields.clone(),
    };

    for field in &fields {
        match field {
            DocumentFieldChoice::Title => {
                documents::update_field(conn, &existing.id, DocumentField::Title, Some(&item.title))
                    .await?
            }
            DocumentFieldChoice::MovedBy => {
                documents::update_field(
                    conn,
                    &existing.id,
                    DocumentField::MovedBy,
                    item.moved_by.as_deref(),
                )
                .await?
            }
            DocumentFieldChoice::SecondedBy => {
                documents::update_field(
                    conn,
                    &existing.id,
                    DocumentField::SecondedBy,
                    item.seconded_by.as_deref(),
                )
                .await?
            }
            DocumentFieldChoice::Authors if resolution.action == DuplicateAction::Replace => {
                documents::replace_authors(conn, &existing.id, &item.author_ids).await?
            }
            DocumentFieldChoice::Authors => {}
        }
    }

    // Merge always unions the author lists
    if resolution.action == DuplicateAction::Merge {
        documents::add_authors(conn, &existing.id, &item.author_ids).await?;
    }

    tracing::debug!(
        document = %existing.id,
        action = ?resolution.action,
        fields = fields.len(),
        "Applied duplicate resolution"
    );

    Ok(ItemOutcome::Updated(UpdatedDocument {
        index,
        id: existing.id.clone(),
        number: existing.number.clone(),
        action: resolution.action,
        fields,
    }))
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}
