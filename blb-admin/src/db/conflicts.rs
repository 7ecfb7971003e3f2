//! Conflict record queries

use super::push_id_list;
use blb_common::db::{ConflictStatus, ConflictType, DataConflict, DocumentType};
use blb_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

/// Optional list filters; `None` means "any"
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictFilter {
    pub status: Option<ConflictStatus>,
    pub conflict_type: Option<ConflictType>,
}

impl ConflictFilter {
    fn push_where<'a>(&self, builder: &mut QueryBuilder<'a, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(status) = self.status {
            builder.push(" AND c.status = ").push_bind(status.as_str());
        }
        if let Some(conflict_type) = self.conflict_type {
            builder
                .push(" AND c.conflict_type = ")
                .push_bind(conflict_type.as_str());
        }
    }
}

/// Conflict joined with its owning document for display
#[derive(Debug, Clone, Serialize)]
pub struct ConflictListItem {
    #[serde(flatten)]
    pub conflict: DataConflict,
    pub document_number: String,
    pub document_title: String,
    pub document_type: DocumentType,
}

impl ConflictListItem {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let document_type: String = row.try_get("document_type")?;

        Ok(Self {
            conflict: DataConflict::from_row(row)?,
            document_number: row.try_get("document_number")?,
            document_title: row.try_get("document_title")?,
            document_type: document_type.parse().map_err(|e| {
                Error::Internal(format!("corrupt documents.type column: {}", e))
            })?,
        })
    }
}

pub async fn insert_conflict(
    conn: &mut SqliteConnection,
    id: &str,
    document_id: &str,
    conflict_type: ConflictType,
    social_value: Option<&str>,
    official_value: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO data_conflicts (
            id, document_id, conflict_type, social_value, official_value, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(document_id)
    .bind(conflict_type.as_str())
    .bind(social_value)
    .bind(official_value)
    .bind(blb_common::time::now_text())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_conflict(conn: &mut SqliteConnection, id: &str) -> Result<Option<DataConflict>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM data_conflicts WHERE id = ?",
        DataConflict::COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(DataConflict::from_row).transpose()
}

pub async fn count_conflicts(pool: &SqlitePool, filter: ConflictFilter) -> Result<i64> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM data_conflicts c");
    filter.push_where(&mut builder);

    let total: i64 = builder.build_query_scalar().fetch_one(pool).await?;
    Ok(total)
}

/// One page of conflicts, newest first
pub async fn list_conflicts(
    pool: &SqlitePool,
    filter: ConflictFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<ConflictListItem>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT c.id, c.document_id, c.conflict_type, c.social_value, c.official_value,
               c.resolved_value, c.status, c.notes, c.created_at, c.resolved_at,
               d.number AS document_number, d.title AS document_title, d.type AS document_type
        FROM data_conflicts c
        JOIN documents d ON d.id = c.document_id
        "#,
    );
    filter.push_where(&mut builder);
    builder
        .push(" ORDER BY c.created_at DESC, c.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(ConflictListItem::from_row).collect()
}

/// Terminal `resolved` state; overwrites any earlier resolution
pub async fn mark_resolved(
    conn: &mut SqliteConnection,
    id: &str,
    resolved_value: Option<&str>,
    notes: Option<&str>,
    resolved_at: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE data_conflicts
        SET status = 'resolved', resolved_value = ?, notes = COALESCE(?, notes), resolved_at = ?
        WHERE id = ?
        "#,
    )
    .bind(resolved_value)
    .bind(notes)
    .bind(resolved_at)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Terminal `skipped` state; clears any resolved value
pub async fn mark_skipped(conn: &mut SqliteConnection, id: &str, notes: Option<&str>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE data_conflicts
        SET status = 'skipped', resolved_value = NULL, resolved_at = NULL,
            notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(notes)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Whether the same unresolved disagreement is already on record
pub async fn unresolved_exists(
    conn: &mut SqliteConnection,
    document_id: &str,
    conflict_type: ConflictType,
    social_value: Option<&str>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM data_conflicts
        WHERE document_id = ? AND conflict_type = ? AND status = 'unresolved'
          AND social_value IS ?
        "#,
    )
    .bind(document_id)
    .bind(conflict_type.as_str())
    .bind(social_value)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

/// Author lists are stored in conflicts as a sorted JSON array
pub fn encode_authors(ids: &[String]) -> Result<String> {
    let mut sorted = ids.to_vec();
    sorted.sort();
    serde_json::to_string(&sorted)
        .map_err(|e| Error::Internal(format!("Failed to encode author list: {}", e)))
}

/// Columns of a conflict row that may hold person ids
const VALUE_COLUMNS: [&str; 3] = ["social_value", "official_value", "resolved_value"];

/// Rewrite person ids held in conflict values from `merge_ids` to `keep_id`
///
/// Covers every status, so a later resolve or re-resolve never writes a
/// merged-away id back onto a document. Returns the number of rows changed.
pub async fn repoint_person_values<'a>(
    conn: &mut SqliteConnection,
    keep_id: &'a str,
    merge_ids: &'a [String],
) -> Result<u64> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE data_conflicts SET ");
    for (i, column) in VALUE_COLUMNS.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(format!("{} = CASE WHEN {} IN ", column, column));
        push_id_list(&mut builder, merge_ids);
        builder
            .push(" THEN ")
            .push_bind(keep_id)
            .push(format!(" ELSE {} END", column));
    }
    builder.push(" WHERE conflict_type IN ('moved_by', 'seconded_by') AND (");
    for (i, column) in VALUE_COLUMNS.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(format!("{} IN ", column));
        push_id_list(&mut builder, merge_ids);
    }
    builder.push(")");

    let mut changed = builder.build().execute(&mut *conn).await?.rows_affected();

    let rows: Vec<(String, Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT id, social_value, official_value, resolved_value
        FROM data_conflicts
        WHERE conflict_type = 'authors'
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    for (id, social, official, resolved) in rows {
        let social = repoint_author_value(&id, social.as_deref(), keep_id, merge_ids)?;
        let official = repoint_author_value(&id, official.as_deref(), keep_id, merge_ids)?;
        let resolved = repoint_author_value(&id, resolved.as_deref(), keep_id, merge_ids)?;
        if social.is_none() && official.is_none() && resolved.is_none() {
            continue;
        }

        sqlx::query(
            r#"
            UPDATE data_conflicts
            SET social_value = COALESCE(?, social_value),
                official_value = COALESCE(?, official_value),
                resolved_value = COALESCE(?, resolved_value)
            WHERE id = ?
            "#,
        )
        .bind(social)
        .bind(official)
        .bind(resolved)
        .bind(&id)
        .execute(&mut *conn)
        .await?;
        changed += 1;
    }

    Ok(changed)
}

/// New encoded author list, or `None` when the value needs no change
fn repoint_author_value(
    conflict_id: &str,
    value: Option<&str>,
    keep_id: &str,
    merge_ids: &[String],
) -> Result<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let ids: Vec<String> = match serde_json::from_str(value) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(conflict_id, error = %e, "Author list in conflict is not a JSON array; left unchanged");
            return Ok(None);
        }
    };
    if !ids.iter().any(|id| merge_ids.contains(id)) {
        return Ok(None);
    }

    let mut repointed: Vec<String> = ids
        .into_iter()
        .map(|id| if merge_ids.contains(&id) { keep_id.to_string() } else { id })
        .collect();
    repointed.sort();
    repointed.dedup();
    encode_authors(&repointed).map(Some)
}
