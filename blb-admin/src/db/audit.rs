//! Append-only audit log

use blb_common::api::Actor;
use blb_common::db::AuditEntry;
use blb_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Append one audit entry inside the caller's transaction
pub async fn append(
    conn: &mut SqliteConnection,
    id: &str,
    action: &str,
    actor: &Actor,
    target_type: &str,
    target_id: Option<&str>,
    details: &serde_json::Value,
) -> Result<()> {
    let details = serde_json::to_string(details)
        .map_err(|e| Error::Internal(format!("Failed to encode audit details: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO audit_log (id, action, actor, target_type, target_id, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(action)
    .bind(actor.as_str())
    .bind(target_type)
    .bind(target_id)
    .bind(details)
    .bind(blb_common::time::now_text())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Entries for one target, oldest first
pub async fn entries_for_target(
    pool: &SqlitePool,
    target_type: &str,
    target_id: &str,
) -> Result<Vec<AuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, action, actor, target_type, target_id, details, created_at
        FROM audit_log
        WHERE target_type = ? AND target_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(target_type)
    .bind(target_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(AuditEntry::from_row).collect()
}
