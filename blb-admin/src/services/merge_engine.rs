//! Person merge engine
//!
//! Folds one or more "merge-away" persons into a "keep" person:
//!
//! 1. Repoint every foreign-key reference to the keep person, along with
//!    person ids held in recorded conflict values
//! 2. Collapse rows that became identical, keeping the lowest row id
//! 3. Dispose of the merge-away persons per [`DeletionMode`]
//! 4. Append one audit entry
//!
//! All four steps run in a single monitored transaction. Validation and
//! existence checks happen before the first write; any later failure rolls
//! the whole merge back.
//!
//! The requested [`MergeStrategy`] is recorded in the audit entry only. Scalar
//! fields of the keep person are never overwritten.

use crate::db::persons::{missing_person_ids, person_exists, reference_counts};
use crate::db::{audit, conflicts, push_id_list};
use crate::utils::begin_monitored;
use blb_common::api::Actor;
use blb_common::db::{DeletionMode, MergeStrategy};
use blb_common::{Error, IdGenerator, Result};
use serde::Serialize;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Every column that references persons, as (report key, table, column)
const PERSON_REFERENCES: [(&str, &str, &str); 6] = [
    ("memberships", "memberships", "person_id"),
    ("document_authors", "document_authors", "person_id"),
    ("session_absences", "session_absences", "person_id"),
    ("committee_memberships", "committee_memberships", "person_id"),
    ("documents.moved_by", "documents", "moved_by"),
    ("documents.seconded_by", "documents", "seconded_by"),
];

/// Join tables and the columns that, with person_id, identify a duplicate row
const DEDUP_KEYS: [(&str, &str); 4] = [
    ("committee_memberships", "committee_id, term_id, role"),
    ("session_absences", "session_id"),
    ("memberships", "term_id"),
    ("document_authors", "document_id"),
];

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub keep_id: String,
    pub merge_ids: Vec<String>,
    pub strategy: MergeStrategy,
    pub deletion_mode: DeletionMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub merged_count: usize,
    /// Rows repointed per table/column
    pub updated_tables: BTreeMap<String, u64>,
    /// Duplicate rows collapsed per join table
    pub duplicates_removed: BTreeMap<String, u64>,
    /// Persons removed (`delete`) or soft-deleted (`flag`); empty for `skip`
    pub deleted_ids: Vec<String>,
}

/// Merge Engine
pub struct MergeEngine {
    db: SqlitePool,
    ids: Arc<dyn IdGenerator>,
}

impl MergeEngine {
    pub fn new(db: SqlitePool, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Merge persons atomically
    ///
    /// **Errors:**
    /// - `Validation`: empty merge list, or keep id among merge ids
    /// - `NotFound`: keep or any merge id has no persons row
    /// - `Database`: any store failure (nothing is committed)
    pub async fn merge(&self, request: &MergeRequest, actor: &Actor) -> Result<MergeOutcome> {
        let (keep_id, merge_ids) = validate(request)?;

        let mut tx = begin_monitored(&self.db, "merge_engine::merge").await?;

        if !person_exists(&mut tx, &keep_id).await? {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("Person not found: {}", keep_id)));
        }
        let missing = missing_person_ids(&mut tx, &merge_ids).await?;
        if !missing.is_empty() {
            tx.rollback().await?;
            return Err(Error::NotFound(format!(
                "Person not found: {}",
                missing.join(", ")
            )));
        }

        let mut outcome = MergeOutcome {
            merged_count: merge_ids.len(),
            ..Default::default()
        };

        for (key, table, column) in PERSON_REFERENCES {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("UPDATE {} SET {} = ", table, column));
            builder
                .push_bind(keep_id.as_str())
                .push(format!(" WHERE {} IN ", column));
            push_id_list(&mut builder, &merge_ids);

            let result = builder.build().execute(&mut *tx).await?;
            outcome
                .updated_tables
                .insert(key.to_string(), result.rows_affected());
        }
        let conflicts_repointed =
            conflicts::repoint_person_values(&mut tx, &keep_id, &merge_ids).await?;
        outcome
            .updated_tables
            .insert("data_conflicts".to_string(), conflicts_repointed);

        outcome.duplicates_removed = dedupe_person_rows(&mut tx, &keep_id).await?;

        match request.deletion_mode {
            DeletionMode::Delete => {
                let mut builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new("DELETE FROM persons WHERE id IN ");
                push_id_list(&mut builder, &merge_ids);
                builder.build().execute(&mut *tx).await?;
                outcome.deleted_ids = merge_ids.clone();
            }
            DeletionMode::Flag => {
                let now = blb_common::time::now_text();
                let mut builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new("UPDATE persons SET updated_at = ");
                builder
                    .push_bind(now.clone())
                    .push(", deleted_at = COALESCE(deleted_at, ")
                    .push_bind(now)
                    .push(") WHERE id IN ");
                push_id_list(&mut builder, &merge_ids);
                builder.build().execute(&mut *tx).await?;
                outcome.deleted_ids = merge_ids.clone();
            }
            DeletionMode::Skip => {}
        }

        let details = json!({
            "keep_person_id": keep_id,
            "merge_person_ids": merge_ids,
            "merge_strategy": request.strategy,
            "deletion_mode": request.deletion_mode,
            "updated_tables": outcome.updated_tables,
            "duplicates_removed": outcome.duplicates_removed,
            "deleted_ids": outcome.deleted_ids,
        });
        audit::append(
            &mut tx,
            &self.ids.new_id(),
            "merge_persons",
            actor,
            "person",
            Some(&keep_id),
            &details,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            keep = %keep_id,
            merged = outcome.merged_count,
            deletion_mode = %request.deletion_mode,
            strategy = %request.strategy,
            actor = %actor,
            "Merged persons"
        );

        Ok(outcome)
    }

    /// Permanently delete a person with no remaining references
    pub async fn purge_person(&self, person_id: &str, actor: &Actor) -> Result<()> {
        let mut tx = begin_monitored(&self.db, "merge_engine::purge_person").await?;

        if !person_exists(&mut tx, person_id).await? {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("Person not found: {}", person_id)));
        }

        let counts = reference_counts(&mut tx, person_id).await?;
        if counts.total() > 0 {
            tx.rollback().await?;
            tracing::warn!(person = %person_id, references = counts.total(), "Purge refused");
            return Err(Error::ReferentialIntegrity(format!(
                "Person {} is still referenced (memberships: {}, document_authors: {}, \
                 session_absences: {}, committee_memberships: {}, documents: {})",
                person_id,
                counts.memberships,
                counts.document_authors,
                counts.session_absences,
                counts.committee_memberships,
                counts.documents
            )));
        }

        sqlx::query("DELETE FROM persons WHERE id = ?")
            .bind(person_id)
            .execute(&mut *tx)
            .await?;

        audit::append(
            &mut tx,
            &self.ids.new_id(),
            "purge_person",
            actor,
            "person",
            Some(person_id),
            &json!({}),
        )
        .await?;

        tx.commit().await?;
        tracing::info!(person = %person_id, actor = %actor, "Purged person");

        Ok(())
    }

    /// Clear a soft-deletion flag
    pub async fn restore_person(&self, person_id: &str, actor: &Actor) -> Result<()> {
        let mut tx = begin_monitored(&self.db, "merge_engine::restore_person").await?;

        let result = sqlx::query(
            "UPDATE persons SET deleted_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(blb_common::time::now_text())
        .bind(person_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("Person not found: {}", person_id)));
        }

        audit::append(
            &mut tx,
            &self.ids.new_id(),
            "restore_person",
            actor,
            "person",
            Some(person_id),
            &json!({}),
        )
        .await?;

        tx.commit().await?;
        tracing::info!(person = %person_id, actor = %actor, "Restored person");

        Ok(())
    }
}

/// Trimmed keep id and de-duplicated merge ids, or a validation error
fn validate(request: &MergeRequest) -> Result<(String, Vec<String>)> {
    let keep_id = request.keep_id.trim().to_string();
    if keep_id.is_empty() {
        return Err(Error::Validation("keep_person_id is required".to_string()));
    }

    let mut merge_ids: Vec<String> = Vec::with_capacity(request.merge_ids.len());
    for id in &request.merge_ids {
        let id = id.trim();
        if !id.is_empty() && !merge_ids.iter().any(|m| m == id) {
            merge_ids.push(id.to_string());
        }
    }

    if merge_ids.is_empty() {
        return Err(Error::Validation(
            "merge_person_ids must contain at least one id".to_string(),
        ));
    }
    if merge_ids.contains(&keep_id) {
        return Err(Error::Validation(
            "keep_person_id cannot also be a merge id".to_string(),
        ));
    }

    Ok((keep_id, merge_ids))
}

/// Collapse duplicate join rows of one person, keeping the lowest row id
///
/// Returns removals per table. A second pass over the same person removes nothing.
pub async fn dedupe_person_rows(
    conn: &mut SqliteConnection,
    person_id: &str,
) -> Result<BTreeMap<String, u64>> {
    let mut removed = BTreeMap::new();

    for (table, key) in DEDUP_KEYS {
        let sql = format!(
            "DELETE FROM {table} WHERE person_id = ? AND id NOT IN \
             (SELECT MIN(id) FROM {table} WHERE person_id = ? GROUP BY {key})",
            table = table,
            key = key
        );
        let result = sqlx::query(&sql)
            .bind(person_id)
            .bind(person_id)
            .execute(&mut *conn)
            .await?;
        removed.insert(table.to_string(), result.rows_affected());
    }

    Ok(removed)
}
