//! Session creation and review flagging

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use blb_common::api::Actor;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::session_attendance::SessionInput;
use crate::services::session_review::{parse_criteria, ReviewSummary};
use crate::services::{SessionRecorder, SessionReviewer};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub absent_person_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/admin/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<SessionInput>, JsonRejection>,
) -> ApiResult<Json<CreateSessionResponse>> {
    let Json(input) = payload?;

    let recorder = SessionRecorder::new(state.db.clone(), state.ids.clone());
    let outcome = recorder.create_session(&input, &actor).await?;

    Ok(Json(CreateSessionResponse {
        success: true,
        session_id: outcome.session_id,
        absent_person_ids: outcome.absent_person_ids,
    }))
}

/// POST /api/admin/review/sessions
///
/// Empty `criteria` (or `"all"`) runs every check.
pub async fn flag_sessions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<ReviewBody>, JsonRejection>,
) -> ApiResult<Json<ReviewSummary>> {
    let Json(body) = payload?;
    let criteria = parse_criteria(&body.criteria)?;

    let reviewer = SessionReviewer::new(state.db.clone(), state.ids.clone());
    let summary = reviewer.flag_sessions(&criteria, body.dry_run, &actor).await?;

    Ok(Json(summary))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/sessions", post(create_session))
        .route("/api/admin/review/sessions", post(flag_sessions))
}
