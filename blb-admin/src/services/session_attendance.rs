//! Session creation with attendance
//!
//! Only absences are stored: presence is the term roster minus the
//! session's absences. When the operator submits who was present, absences
//! are derived from the roster; an explicit absent list overrides that.

use crate::db::audit;
use crate::db::persons::missing_person_ids;
use crate::db::sessions::{self, NewSession};
use crate::utils::begin_monitored;
use blb_common::api::Actor;
use blb_common::db::{SessionType, SourceType};
use blb_common::{Error, IdGenerator, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInput {
    pub term_id: Option<String>,
    #[serde(rename = "type")]
    pub session_type: Option<String>,
    pub ordinal_number: Option<i64>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    #[serde(default)]
    pub present_person_ids: Vec<String>,
    pub absent_person_ids: Option<Vec<String>>,
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub absent_person_ids: Vec<String>,
}

struct ValidSession {
    term_id: String,
    session_type: SessionType,
    ordinal_number: Option<i64>,
    date: String,
    present: Vec<String>,
    absent: Option<Vec<String>>,
    source_type: SourceType,
}

pub struct SessionRecorder {
    db: SqlitePool,
    ids: Arc<dyn IdGenerator>,
}

impl SessionRecorder {
    pub fn new(db: SqlitePool, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Create a session and its absence rows in one transaction
    pub async fn create_session(&self, input: &SessionInput, actor: &Actor) -> Result<SessionOutcome> {
        let session = validate(input)?;

        let mut tx = begin_monitored(&self.db, "session_attendance::create_session").await?;
        match self.create_in(&mut tx, &session, actor).await {
            Ok(outcome) => {
                tx.commit().await?;
                tracing::info!(
                    session = %outcome.session_id,
                    term = %session.term_id,
                    absent = outcome.absent_person_ids.len(),
                    actor = %actor,
                    "Created session"
                );
                Ok(outcome)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn create_in(
        &self,
        conn: &mut SqliteConnection,
        session: &ValidSession,
        actor: &Actor,
    ) -> Result<SessionOutcome> {
        if !sessions::term_exists(conn, &session.term_id).await? {
            return Err(Error::NotFound(format!("Term not found: {}", session.term_id)));
        }

        let mut referenced = session.present.clone();
        referenced.extend(session.absent.iter().flatten().cloned());
        let missing = missing_person_ids(conn, &referenced).await?;
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "Unknown person ids: {}",
                missing.join(", ")
            )));
        }

        let absent_person_ids = match &session.absent {
            Some(absent) => absent.clone(),
            None => sessions::term_roster(conn, &session.term_id)
                .await?
                .into_iter()
                .filter(|id| !session.present.contains(id))
                .collect(),
        };

        let session_id = self.ids.new_id();
        sessions::insert_session(
            conn,
            &NewSession {
                id: session_id.clone(),
                term_id: Some(session.term_id.clone()),
                session_type: Some(session.session_type),
                ordinal_number: session.ordinal_number,
                date: Some(session.date.clone()),
                source_type: session.source_type,
            },
        )
        .await?;
        sessions::insert_absences(conn, &session_id, &absent_person_ids).await?;

        audit::append(
            conn,
            &self.ids.new_id(),
            "create_session",
            actor,
            "session",
            Some(&session_id),
            &json!({
                "term_id": session.term_id,
                "type": session.session_type,
                "ordinal_number": session.ordinal_number,
                "date": session.date,
                "present_person_ids": session.present,
                "absent_person_ids": absent_person_ids,
            }),
        )
        .await?;

        Ok(SessionOutcome {
            session_id,
            absent_person_ids,
        })
    }
}

fn validate(input: &SessionInput) -> Result<ValidSession> {
    let term_id = input
        .term_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation("Missing required field: term_id".to_string()))?
        .to_string();

    let session_type: SessionType = input
        .session_type
        .as_deref()
        .ok_or_else(|| Error::Validation("Missing required field: type".to_string()))?
        .parse()?;

    let raw_date = input
        .date
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| Error::Validation("Missing required field: date".to_string()))?;
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("date must be YYYY-MM-DD, got '{}'", raw_date)))?
        .format("%Y-%m-%d")
        .to_string();

    if let Some(ordinal) = input.ordinal_number {
        if ordinal < 1 {
            return Err(Error::Validation(format!(
                "ordinal_number must be positive, got {}",
                ordinal
            )));
        }
    }

    let source_type = match input.source_type.as_deref() {
        Some(raw) => raw.parse()?,
        None => SourceType::Manual,
    };

    let present = dedupe(&input.present_person_ids);
    let absent = input.absent_person_ids.as_deref().map(dedupe);
    if let Some(absent) = &absent {
        if let Some(both) = absent.iter().find(|id| present.contains(id)) {
            return Err(Error::Validation(format!(
                "Person {} cannot be both present and absent",
                both
            )));
        }
    }

    Ok(ValidSession {
        term_id,
        session_type,
        ordinal_number: input.ordinal_number,
        date,
        present,
        absent,
        source_type,
    })
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !unique.iter().any(|u| u == id) {
            unique.push(id.to_string());
        }
    }
    unique
}
