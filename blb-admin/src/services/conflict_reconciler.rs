//! Two-source conflict reconciliation
//!
//! Conflict rows are recorded by bulk ingestion when a post disagrees with an
//! existing document. Each row moves `unresolved → resolved | skipped`; both
//! end states accept a later resolve, which overwrites the previous value.
//!
//! Resolving also writes the chosen value onto the owning document, in the
//! same transaction as the status change and its audit entry.

use crate::db::conflicts::{self, ConflictFilter, ConflictListItem};
use crate::db::documents::{self, DocumentField};
use crate::db::persons::{missing_person_ids, person_exists};
use crate::db::audit;
use crate::pagination::{calculate_pagination, PageInfo};
use crate::utils::begin_monitored;
use blb_common::api::Actor;
use blb_common::db::{ConflictStatus, ConflictType, DataConflict};
use blb_common::{Error, IdGenerator, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Which value the operator settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    /// Take the value captured from the social post
    AcceptSocial,
    /// Take the value from the official site
    AcceptOfficial,
    /// Take the operator-supplied `resolved_value`
    Manual,
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub conflict_id: String,
    pub resolved_value: Option<String>,
    pub choice: Option<ResolutionChoice>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictPage {
    pub items: Vec<ConflictListItem>,
    pub pagination: PageInfo,
}

/// Conflict Reconciler
pub struct ConflictReconciler {
    db: SqlitePool,
    ids: Arc<dyn IdGenerator>,
}

impl ConflictReconciler {
    pub fn new(db: SqlitePool, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// One filtered page of conflicts joined with their documents
    pub async fn list_conflicts(
        &self,
        filter: ConflictFilter,
        page: i64,
        limit: i64,
    ) -> Result<ConflictPage> {
        let total = conflicts::count_conflicts(&self.db, filter).await?;
        let pagination = calculate_pagination(total, page, limit);
        let items =
            conflicts::list_conflicts(&self.db, filter, pagination.limit, pagination.offset)
                .await?;

        Ok(ConflictPage {
            items,
            pagination: pagination.info(total),
        })
    }

    /// Resolve a conflict and apply the value to its document
    ///
    /// **Errors:**
    /// - `NotFound`: unknown conflict id
    /// - `Validation`: no value to apply, or the value is not valid for the
    ///   conflict type (unknown person id, malformed author list, empty title)
    pub async fn resolve(&self, request: &ResolveRequest, actor: &Actor) -> Result<DataConflict> {
        let mut tx = begin_monitored(&self.db, "conflict_reconciler::resolve").await?;

        match self.resolve_in(&mut tx, request, actor).await {
            Ok(conflict) => {
                tx.commit().await?;
                tracing::info!(
                    conflict = %conflict.id,
                    document = %conflict.document_id,
                    conflict_type = %conflict.conflict_type,
                    actor = %actor,
                    "Resolved conflict"
                );
                Ok(conflict)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn resolve_in(
        &self,
        conn: &mut SqliteConnection,
        request: &ResolveRequest,
        actor: &Actor,
    ) -> Result<DataConflict> {
        let conflict = load(conn, &request.conflict_id).await?;

        let (choice, value) = match (request.choice, &request.resolved_value) {
            (Some(ResolutionChoice::AcceptSocial), _) => {
                (ResolutionChoice::AcceptSocial, conflict.social_value.clone())
            }
            (Some(ResolutionChoice::AcceptOfficial), _) => {
                (ResolutionChoice::AcceptOfficial, conflict.official_value.clone())
            }
            (Some(ResolutionChoice::Manual), Some(value)) | (None, Some(value)) => {
                (ResolutionChoice::Manual, Some(value.clone()))
            }
            (Some(ResolutionChoice::Manual), None) | (None, None) => {
                return Err(Error::Validation(
                    "resolved_value is required unless choice is accept_social or accept_official"
                        .to_string(),
                ));
            }
        };

        apply_to_document(conn, &conflict, value.as_deref()).await?;

        let resolved_at = blb_common::time::now_text();
        conflicts::mark_resolved(
            conn,
            &conflict.id,
            value.as_deref(),
            request.notes.as_deref(),
            &resolved_at,
        )
        .await?;
        documents::clear_review_if_settled(conn, &conflict.document_id).await?;

        audit::append(
            conn,
            &self.ids.new_id(),
            "resolve_conflict",
            actor,
            "conflict",
            Some(&conflict.id),
            &json!({
                "document_id": conflict.document_id,
                "conflict_type": conflict.conflict_type,
                "choice": choice,
                "previous_status": conflict.status,
                "resolved_value": value,
                "notes": request.notes,
            }),
        )
        .await?;

        load(conn, &conflict.id).await
    }

    /// Mark a conflict skipped, leaving the document as it is
    ///
    /// A resolved conflict cannot be skipped: its value is already on the
    /// document. Resolve it again to correct it.
    pub async fn skip(&self, conflict_id: &str, notes: Option<&str>, actor: &Actor) -> Result<DataConflict> {
        let mut tx = begin_monitored(&self.db, "conflict_reconciler::skip").await?;

        let conflict = match load(&mut tx, conflict_id).await {
            Ok(conflict) if conflict.status == ConflictStatus::Resolved => {
                tx.rollback().await?;
                return Err(Error::Validation(format!(
                    "Conflict {} is already resolved; resolve it again to change its value",
                    conflict_id
                )));
            }
            Ok(conflict) => conflict,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        conflicts::mark_skipped(&mut tx, conflict_id, notes).await?;
        documents::clear_review_if_settled(&mut tx, &conflict.document_id).await?;
        audit::append(
            &mut tx,
            &self.ids.new_id(),
            "skip_conflict",
            actor,
            "conflict",
            Some(conflict_id),
            &json!({
                "document_id": conflict.document_id,
                "previous_status": conflict.status,
                "notes": notes,
            }),
        )
        .await?;

        let skipped = load(&mut tx, conflict_id).await?;
        tx.commit().await?;

        tracing::info!(conflict = %conflict_id, actor = %actor, "Skipped conflict");
        Ok(skipped)
    }
}

async fn load(conn: &mut SqliteConnection, conflict_id: &str) -> Result<DataConflict> {
    conflicts::fetch_conflict(conn, conflict_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Conflict not found: {}", conflict_id)))
}

/// Write a resolved value onto the owning document
async fn apply_to_document(
    conn: &mut SqliteConnection,
    conflict: &DataConflict,
    value: Option<&str>,
) -> Result<()> {
    match conflict.conflict_type {
        ConflictType::Title => {
            let title = value.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
                Error::Validation("Resolved title cannot be empty".to_string())
            })?;
            documents::update_field(conn, &conflict.document_id, DocumentField::Title, Some(title))
                .await
        }
        ConflictType::MovedBy | ConflictType::SecondedBy => {
            let field = if conflict.conflict_type == ConflictType::MovedBy {
                DocumentField::MovedBy
            } else {
                DocumentField::SecondedBy
            };
            let person_id = value.map(str::trim).filter(|v| !v.is_empty());
            if let Some(person_id) = person_id {
                if !person_exists(conn, person_id).await? {
                    return Err(Error::Validation(format!(
                        "Resolved value is not a known person id: {}",
                        person_id
                    )));
                }
            }
            documents::update_field(conn, &conflict.document_id, field, person_id).await
        }
        ConflictType::Authors => {
            let author_ids = parse_author_list(value)?;
            let missing = missing_person_ids(conn, &author_ids).await?;
            if !missing.is_empty() {
                return Err(Error::Validation(format!(
                    "Unknown author person ids: {}",
                    missing.join(", ")
                )));
            }
            documents::replace_authors(conn, &conflict.document_id, &author_ids).await
        }
        ConflictType::None => Ok(()),
    }
}

/// Author values are stored as a JSON array of person ids
pub(crate) fn parse_author_list(value: Option<&str>) -> Result<Vec<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            Error::Validation(format!("Authors value must be a JSON array of person ids: {}", e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::documents::author_ids;
    use crate::db::persons::{insert_person, NewPerson};
    use blb_common::db::{memory_pool, ConflictStatus};
    use blb_common::SequentialIds;

    async fn seeded() -> SqlitePool {
        let pool = memory_pool().await.unwrap();
        insert_person(&pool, "p1", &NewPerson::new("Maria", "Santos")).await.unwrap();
        insert_person(&pool, "p2", &NewPerson::new("Jose", "Rizal")).await.unwrap();
        for sql in [
            "INSERT INTO documents (id, type, number, title, moved_by, needs_review) VALUES ('d1', 'ordinance', 'ORD-1', 'Official Title', 'p1', 1)",
            "INSERT INTO data_conflicts (id, document_id, conflict_type, social_value, official_value, created_at) VALUES ('c-title', 'd1', 'title', 'Post Title', 'Official Title', '2024-01-01 00:00:00')",
            "INSERT INTO data_conflicts (id, document_id, conflict_type, social_value, official_value, created_at) VALUES ('c-moved', 'd1', 'moved_by', 'p2', 'p1', '2024-01-02 00:00:00')",
            "INSERT INTO data_conflicts (id, document_id, conflict_type, social_value, official_value, created_at) VALUES ('c-authors', 'd1', 'authors', '[\"p1\",\"p2\"]', '[\"p1\"]', '2024-01-03 00:00:00')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    fn reconciler(pool: &SqlitePool) -> ConflictReconciler {
        ConflictReconciler::new(pool.clone(), Arc::new(SequentialIds::new("audit")))
    }

    fn resolve_request(id: &str, choice: Option<ResolutionChoice>, value: Option<&str>) -> ResolveRequest {
        ResolveRequest {
            conflict_id: id.to_string(),
            resolved_value: value.map(str::to_string),
            choice,
            notes: Some("checked minutes".to_string()),
        }
    }

    async fn document_title(pool: &SqlitePool) -> String {
        sqlx::query_scalar("SELECT title FROM documents WHERE id = 'd1'")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_sets_status_value_and_timestamp() {
        let pool = seeded().await;
        let resolved = reconciler(&pool)
            .resolve(
                &resolve_request("c-title", Some(ResolutionChoice::AcceptSocial), None),
                &Actor::anonymous(),
            )
            .await
            .unwrap();

        assert_eq!(resolved.status, ConflictStatus::Resolved);
        assert_eq!(resolved.resolved_value.as_deref(), Some("Post Title"));
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.notes.as_deref(), Some("checked minutes"));
        assert_eq!(document_title(&pool).await, "Post Title");

        let updated_at: String = sqlx::query_scalar("SELECT updated_at FROM documents WHERE id = 'd1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&updated_at).is_ok());
    }

    #[tokio::test]
    async fn test_re_resolution_keeps_latest_value_only() {
        let pool = seeded().await;
        let reconciler = reconciler(&pool);
        reconciler
            .resolve(&resolve_request("c-title", None, Some("First")), &Actor::anonymous())
            .await
            .unwrap();
        let second = reconciler
            .resolve(
                &resolve_request("c-title", Some(ResolutionChoice::AcceptOfficial), None),
                &Actor::anonymous(),
            )
            .await
            .unwrap();

        assert_eq!(second.resolved_value.as_deref(), Some("Official Title"));
        assert_eq!(document_title(&pool).await, "Official Title");
    }

    #[tokio::test]
    async fn test_skip_leaves_resolved_value_null() {
        let pool = seeded().await;
        let skipped = reconciler(&pool)
            .skip("c-title", Some("not worth it"), &Actor::anonymous())
            .await
            .unwrap();

        assert_eq!(skipped.status, ConflictStatus::Skipped);
        assert_eq!(skipped.resolved_value, None);
        assert_eq!(document_title(&pool).await, "Official Title");
    }

    #[tokio::test]
    async fn test_skip_refused_once_resolved() {
        let pool = seeded().await;
        let reconciler = reconciler(&pool);
        reconciler
            .resolve(
                &resolve_request("c-title", Some(ResolutionChoice::AcceptSocial), None),
                &Actor::anonymous(),
            )
            .await
            .unwrap();

        let err = reconciler
            .skip("c-title", None, &Actor::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let conflict = conflicts::fetch_conflict(&mut *pool.acquire().await.unwrap(), "c-title")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.resolved_value.as_deref(), Some("Post Title"));
        assert_eq!(document_title(&pool).await, "Post Title");
    }

    #[tokio::test]
    async fn test_unknown_conflict_is_not_found() {
        let pool = seeded().await;
        let reconciler = reconciler(&pool);

        assert!(matches!(
            reconciler
                .resolve(&resolve_request("nope", None, Some("x")), &Actor::anonymous())
                .await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            reconciler.skip("nope", None, &Actor::anonymous()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_without_value_is_rejected() {
        let pool = seeded().await;
        let result = reconciler(&pool)
            .resolve(
                &resolve_request("c-title", Some(ResolutionChoice::Manual), None),
                &Actor::anonymous(),
            )
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_moved_by_resolution_updates_document_and_checks_person() {
        let pool = seeded().await;
        let reconciler = reconciler(&pool);

        let bad = reconciler
            .resolve(&resolve_request("c-moved", None, Some("ghost")), &Actor::anonymous())
            .await;
        assert!(matches!(bad, Err(Error::Validation(_))));
        let conflict = {
            let mut conn = pool.acquire().await.unwrap();
            conflicts::fetch_conflict(&mut conn, "c-moved").await.unwrap().unwrap()
        };
        assert_eq!(conflict.status, ConflictStatus::Unresolved);

        reconciler
            .resolve(
                &resolve_request("c-moved", Some(ResolutionChoice::AcceptSocial), None),
                &Actor::anonymous(),
            )
            .await
            .unwrap();
        let moved_by: Option<String> =
            sqlx::query_scalar("SELECT moved_by FROM documents WHERE id = 'd1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(moved_by.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_authors_resolution_replaces_author_set() {
        let pool = seeded().await;
        reconciler(&pool)
            .resolve(
                &resolve_request("c-authors", Some(ResolutionChoice::AcceptSocial), None),
                &Actor::anonymous(),
            )
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(
            author_ids(&mut conn, "d1").await.unwrap(),
            vec!["p1".to_string(), "p2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_review_flag_clears_when_all_settled() {
        let pool = seeded().await;
        let reconciler = reconciler(&pool);
        for id in ["c-title", "c-moved", "c-authors"] {
            reconciler.skip(id, None, &Actor::anonymous()).await.unwrap();
        }

        let needs_review: i64 =
            sqlx::query_scalar("SELECT needs_review FROM documents WHERE id = 'd1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(needs_review, 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let pool = seeded().await;
        let reconciler = reconciler(&pool);
        reconciler.skip("c-title", None, &Actor::anonymous()).await.unwrap();

        let unresolved = reconciler
            .list_conflicts(
                ConflictFilter {
                    status: Some(ConflictStatus::Unresolved),
                    conflict_type: None,
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(unresolved.pagination.total, 2);
        assert_eq!(unresolved.items[0].conflict.id, "c-authors");
        assert_eq!(unresolved.items[0].document_number, "ORD-1");

        let by_type = reconciler
            .list_conflicts(
                ConflictFilter {
                    status: None,
                    conflict_type: Some(ConflictType::Title),
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(by_type.items.len(), 1);

        let paged = reconciler
            .list_conflicts(ConflictFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(paged.pagination.total_pages, 2);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].conflict.id, "c-title");
    }
}
