//! Session, term and attendance queries

use blb_common::db::{SessionType, SourceType};
use blb_common::Result;
use sqlx::SqliteConnection;

/// Fields for a new session row
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub term_id: Option<String>,
    pub session_type: Option<SessionType>,
    pub ordinal_number: Option<i64>,
    pub date: Option<String>,
    pub source_type: SourceType,
}

pub async fn session_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

pub async fn term_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM terms WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

pub async fn insert_session(conn: &mut SqliteConnection, session: &NewSession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, term_id, type, ordinal_number, date, source_type, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(&session.term_id)
    .bind(session.session_type.map(|t| t.as_str()))
    .bind(session.ordinal_number)
    .bind(&session.date)
    .bind(session.source_type.as_str())
    .bind(blb_common::time::now_text())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Distinct non-deleted members of a term, by last then first name
pub async fn term_roster(conn: &mut SqliteConnection, term_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT p.id
        FROM persons p
        WHERE p.deleted_at IS NULL
          AND p.id IN (SELECT person_id FROM memberships WHERE term_id = ?)
        ORDER BY p.last_name, p.first_name, p.id
        "#,
    )
    .bind(term_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

pub async fn insert_absences(
    conn: &mut SqliteConnection,
    session_id: &str,
    person_ids: &[String],
) -> Result<()> {
    for person_id in person_ids {
        sqlx::query("INSERT INTO session_absences (session_id, person_id) VALUES (?, ?)")
            .bind(session_id)
            .bind(person_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
