//! Session review flagging
//!
//! Scans sessions for data-quality problems and queues them in
//! `review_queue` for an operator. Queueing is idempotent: the queue is
//! unique on (item, issue), and a session already queued for an issue still
//! counts as flagged.

use crate::db::audit;
use crate::utils::begin_monitored;
use blb_common::api::Actor;
use blb_common::{Error, IdGenerator, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCriterion {
    /// Null date, type or term
    MissingData,
    /// More than one session on the same date
    DuplicateDates,
    /// Session in a term that has members, so attendance should be on record
    IncompleteAttendance,
    /// Not yet marked resolved in the review queue
    AutoImported,
}

impl ReviewCriterion {
    pub const ALL: [ReviewCriterion; 4] = [
        ReviewCriterion::MissingData,
        ReviewCriterion::DuplicateDates,
        ReviewCriterion::IncompleteAttendance,
        ReviewCriterion::AutoImported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewCriterion::MissingData => "missing_data",
            ReviewCriterion::DuplicateDates => "duplicate_dates",
            ReviewCriterion::IncompleteAttendance => "incomplete_attendance",
            ReviewCriterion::AutoImported => "auto_imported",
        }
    }
}

impl FromStr for ReviewCriterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReviewCriterion::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown review criterion '{}' (expected one of: missing_data, \
                     duplicate_dates, incomplete_attendance, auto_imported, all)",
                    s
                ))
            })
    }
}

/// Expand a requested criteria list; empty or `all` selects every criterion
pub fn parse_criteria(requested: &[String]) -> Result<Vec<ReviewCriterion>> {
    if requested.is_empty() || requested.iter().any(|c| c.trim() == "all") {
        return Ok(ReviewCriterion::ALL.to_vec());
    }

    let mut criteria = Vec::new();
    for raw in requested {
        let criterion: ReviewCriterion = raw.parse()?;
        if !criteria.contains(&criterion) {
            criteria.push(criterion);
        }
    }
    Ok(criteria)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CriterionSummary {
    pub found: usize,
    pub flagged: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewSummary {
    pub dry_run: bool,
    pub total_flagged: usize,
    pub by_criteria: BTreeMap<String, CriterionSummary>,
}

#[derive(Debug, Clone, FromRow)]
struct SessionRow {
    id: String,
    date: Option<String>,
    #[sqlx(rename = "type")]
    session_type: Option<String>,
    term_id: Option<String>,
    absence_count: i64,
    member_count: i64,
}

impl SessionRow {
    fn describe(&self, criterion: ReviewCriterion) -> String {
        match criterion {
            ReviewCriterion::MissingData => {
                let missing: Vec<&str> = [
                    ("date", self.date.is_none()),
                    ("type", self.session_type.is_none()),
                    ("term_id", self.term_id.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(field, _)| field)
                .collect();
                format!("Missing required fields: {}", missing.join(", "))
            }
            ReviewCriterion::DuplicateDates => format!(
                "Duplicate session date: {}",
                self.date.as_deref().unwrap_or("unknown")
            ),
            ReviewCriterion::IncompleteAttendance => format!(
                "Incomplete attendance: {} absences recorded for {} term members",
                self.absence_count, self.member_count
            ),
            ReviewCriterion::AutoImported => "Session flagged for auto_imported".to_string(),
        }
    }
}

const SESSION_COLUMNS: &str = r#"
    s.id, s.date, s.type, s.term_id,
    (SELECT COUNT(*) FROM session_absences sa WHERE sa.session_id = s.id) AS absence_count,
    (SELECT COUNT(*) FROM memberships m WHERE m.term_id = s.term_id) AS member_count
"#;

/// Session review flagger
pub struct SessionReviewer {
    db: SqlitePool,
    ids: Arc<dyn IdGenerator>,
}

impl SessionReviewer {
    pub fn new(db: SqlitePool, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Run the selected checks and queue what they find (unless `dry_run`)
    pub async fn flag_sessions(
        &self,
        criteria: &[ReviewCriterion],
        dry_run: bool,
        actor: &Actor,
    ) -> Result<ReviewSummary> {
        let mut summary = ReviewSummary {
            dry_run,
            ..Default::default()
        };

        let mut found_by_criterion = Vec::with_capacity(criteria.len());
        for &criterion in criteria {
            found_by_criterion.push((criterion, self.detect(criterion).await?));
        }

        let mut tx = if dry_run {
            None
        } else {
            Some(begin_monitored(&self.db, "session_review::flag_sessions").await?)
        };

        for (criterion, sessions) in &found_by_criterion {
            if let Some(tx) = tx.as_mut() {
                for session in sessions {
                    sqlx::query(
                        r#"
                        INSERT OR IGNORE INTO review_queue
                            (id, item_type, item_id, issue_type, description, status, created_at)
                        VALUES (?, 'session', ?, ?, ?, 'pending', ?)
                        "#,
                    )
                    .bind(self.ids.new_id())
                    .bind(&session.id)
                    .bind(criterion.as_str())
                    .bind(session.describe(*criterion))
                    .bind(blb_common::time::now_text())
                    .execute(&mut **tx)
                    .await?;
                }
            }

            tracing::info!(
                criterion = criterion.as_str(),
                found = sessions.len(),
                dry_run = dry_run,
                "Session review check complete"
            );

            summary.by_criteria.insert(
                criterion.as_str().to_string(),
                CriterionSummary {
                    found: sessions.len(),
                    flagged: sessions.len(),
                },
            );
            summary.total_flagged += sessions.len();
        }

        if let Some(mut tx) = tx {
            let details = json!({
                "criteria": criteria,
                "by_criteria": summary.by_criteria,
                "total_flagged": summary.total_flagged,
            });
            audit::append(
                &mut tx,
                &self.ids.new_id(),
                "flag_sessions",
                actor,
                "review_queue",
                None,
                &details,
            )
            .await?;
            tx.commit().await?;
        }

        Ok(summary)
    }

    async fn detect(&self, criterion: ReviewCriterion) -> Result<Vec<SessionRow>> {
        let filter = match criterion {
            ReviewCriterion::MissingData => {
                "WHERE s.date IS NULL OR s.type IS NULL OR s.term_id IS NULL ORDER BY s.created_at DESC, s.id"
            }
            ReviewCriterion::DuplicateDates => {
                r#"WHERE s.date IN (
                       SELECT date FROM sessions WHERE date IS NOT NULL
                       GROUP BY date HAVING COUNT(*) > 1
                   )
                   ORDER BY s.date, s.id"#
            }
            ReviewCriterion::IncompleteAttendance => {
                r#"WHERE s.term_id IS NOT NULL
                     AND EXISTS (SELECT 1 FROM memberships m WHERE m.term_id = s.term_id)
                   ORDER BY s.date DESC, s.id"#
            }
            ReviewCriterion::AutoImported => {
                r#"WHERE s.id NOT IN (
                       SELECT item_id FROM review_queue
                       WHERE item_type = 'session' AND status = 'resolved'
                   )
                   ORDER BY s.created_at DESC, s.id"#
            }
        };

        let sql = format!("SELECT {} FROM sessions s {}", SESSION_COLUMNS, filter);
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blb_common::db::memory_pool;
    use blb_common::SequentialIds;

    async fn seeded() -> SqlitePool {
        let pool = memory_pool().await.unwrap();
        for sql in [
            "INSERT INTO terms (id, name) VALUES ('t1', '2022-2025')",
            "INSERT INTO terms (id, name) VALUES ('t2', '2019-2022')",
            "INSERT INTO persons (id, first_name, last_name) VALUES ('p1', 'Ana', 'Abad')",
            "INSERT INTO memberships (person_id, term_id) VALUES ('p1', 't1')",
            "INSERT INTO sessions (id, term_id, type, date) VALUES ('s1', 't1', 'regular', '2024-01-15')",
            "INSERT INTO sessions (id, term_id, type, date) VALUES ('s2', 't1', 'special', '2024-01-15')",
            "INSERT INTO sessions (id, term_id, type, date) VALUES ('s3', 't2', 'regular', '2021-05-01')",
            "INSERT INTO sessions (id, term_id, type, date) VALUES ('s4', NULL, 'regular', NULL)",
            "INSERT INTO review_queue (id, item_type, item_id, issue_type, status) VALUES ('r0', 'session', 's3', 'manual', 'resolved')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    fn reviewer(pool: &SqlitePool) -> SessionReviewer {
        SessionReviewer::new(pool.clone(), Arc::new(SequentialIds::new("review")))
    }

    async fn queued(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM review_queue WHERE status = 'pending'")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_criteria() {
        assert_eq!(parse_criteria(&[]).unwrap().len(), 4);
        assert_eq!(parse_criteria(&["all".to_string()]).unwrap().len(), 4);
        assert_eq!(
            parse_criteria(&["missing_data".to_string(), "missing_data".to_string()]).unwrap(),
            vec![ReviewCriterion::MissingData]
        );
        assert!(matches!(
            parse_criteria(&["bogus".to_string()]),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_each_criterion_finds_expected_sessions() {
        let pool = seeded().await;
        let summary = reviewer(&pool)
            .flag_sessions(&ReviewCriterion::ALL, true, &Actor::anonymous())
            .await
            .unwrap();

        assert_eq!(summary.by_criteria["missing_data"].found, 1);
        assert_eq!(summary.by_criteria["duplicate_dates"].found, 2);
        // Only t1 has members
        assert_eq!(summary.by_criteria["incomplete_attendance"].found, 2);
        // s3 was already resolved in the queue
        assert_eq!(summary.by_criteria["auto_imported"].found, 3);
        assert_eq!(summary.total_flagged, 8);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let pool = seeded().await;
        reviewer(&pool)
            .flag_sessions(&ReviewCriterion::ALL, true, &Actor::anonymous())
            .await
            .unwrap();

        assert_eq!(queued(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_flagging_is_idempotent() {
        let pool = seeded().await;
        let reviewer = reviewer(&pool);
        let criteria = [ReviewCriterion::MissingData, ReviewCriterion::DuplicateDates];

        reviewer.flag_sessions(&criteria, false, &Actor::anonymous()).await.unwrap();
        assert_eq!(queued(&pool).await, 3);

        let again = reviewer.flag_sessions(&criteria, false, &Actor::anonymous()).await.unwrap();
        assert_eq!(again.total_flagged, 3);
        assert_eq!(queued(&pool).await, 3);

        let description: String = sqlx::query_scalar(
            "SELECT description FROM review_queue WHERE item_id = 's4' AND issue_type = 'missing_data'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(description, "Missing required fields: date, term_id");
    }
}
