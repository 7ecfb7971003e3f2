//! Document and authorship queries

use blb_common::db::{Document, DocumentType, SourceType};
use blb_common::time::now_text;
use blb_common::{Error, Result};
use sqlx::SqliteConnection;

/// Fields for a new document row
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub doc_type: DocumentType,
    pub number: String,
    pub title: String,
    pub session_id: Option<String>,
    pub status: String,
    pub moved_by: Option<String>,
    pub seconded_by: Option<String>,
    pub source_type: SourceType,
}

/// Scalar document columns an operator may overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentField {
    Title,
    MovedBy,
    SecondedBy,
}

impl DocumentField {
    fn column(&self) -> &'static str {
        match self {
            DocumentField::Title => "title",
            DocumentField::MovedBy => "moved_by",
            DocumentField::SecondedBy => "seconded_by",
        }
    }
}

pub async fn fetch_document(conn: &mut SqliteConnection, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query(&format!("SELECT {} FROM documents WHERE id = ?", Document::COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Document::from_row).transpose()
}

/// Look up a document by its business key
pub async fn find_by_number(conn: &mut SqliteConnection, number: &str) -> Result<Option<Document>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM documents WHERE number = ?",
        Document::COLUMNS
    ))
    .bind(number)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(Document::from_row).transpose()
}

/// Insert a document, mapping a number collision to [`Error::DuplicateKey`]
pub async fn insert_document(conn: &mut SqliteConnection, doc: &NewDocument) -> Result<()> {
    let now = now_text();
    let result = sqlx::query(
        r#"
        INSERT INTO documents (
            id, type, number, title, session_id, status, moved_by, seconded_by, source_type,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(doc.doc_type.as_str())
    .bind(&doc.number)
    .bind(&doc.title)
    .bind(&doc.session_id)
    .bind(&doc.status)
    .bind(&doc.moved_by)
    .bind(&doc.seconded_by)
    .bind(doc.source_type.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            Error::DuplicateKey(format!("Document number already exists: {}", doc.number)),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Overwrite one scalar column
pub async fn update_field(
    conn: &mut SqliteConnection,
    document_id: &str,
    field: DocumentField,
    value: Option<&str>,
) -> Result<()> {
    // Column name comes from a closed enum, never from input
    let sql = format!(
        "UPDATE documents SET {} = ?, updated_at = ? WHERE id = ?",
        field.column()
    );

    sqlx::query(&sql)
        .bind(value)
        .bind(now_text())
        .bind(document_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Raise the review flag after an unresolved conflict was recorded
pub async fn mark_needs_review(conn: &mut SqliteConnection, document_id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE documents SET needs_review = 1, updated_at = ? WHERE id = ?",
    )
    .bind(now_text())
    .bind(document_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Author person ids in insertion order
pub async fn author_ids(conn: &mut SqliteConnection, document_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT person_id FROM document_authors WHERE document_id = ? ORDER BY id",
    )
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

/// Add authors not already linked; returns the number added
pub async fn add_authors(
    conn: &mut SqliteConnection,
    document_id: &str,
    person_ids: &[String],
) -> Result<u64> {
    let mut existing = author_ids(conn, document_id).await?;
    let mut added = 0;

    for person_id in person_ids {
        if existing.contains(person_id) {
            continue;
        }
        sqlx::query("INSERT INTO document_authors (document_id, person_id) VALUES (?, ?)")
            .bind(document_id)
            .bind(person_id)
            .execute(&mut *conn)
            .await?;
        existing.push(person_id.clone());
        added += 1;
    }

    Ok(added)
}

/// Replace the author set wholesale
pub async fn replace_authors(
    conn: &mut SqliteConnection,
    document_id: &str,
    person_ids: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM document_authors WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;

    add_authors(conn, document_id, person_ids).await?;

    Ok(())
}

/// Clear the review flag once no unresolved conflict remains
pub async fn clear_review_if_settled(conn: &mut SqliteConnection, document_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE documents SET needs_review = 0, updated_at = ?
        WHERE id = ?
          AND NOT EXISTS (
              SELECT 1 FROM data_conflicts WHERE document_id = ? AND status = 'unresolved'
          )
        "#,
    )
    .bind(now_text())
    .bind(document_id)
    .bind(document_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
