//! Person duplicate detection, merge, purge and restore

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use blb_common::api::Actor;
use blb_common::db::{DeletionMode, MergeStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ApiResult;
use crate::services::duplicate_detector::DuplicateGroup;
use crate::services::merge_engine::MergeRequest;
use crate::services::{DuplicateDetector, MergeEngine};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DuplicatesResponse {
    pub duplicates: Vec<DuplicateGroup>,
}

/// Body of `POST /api/admin/persons/merge`
///
/// Enum fields arrive as text so a bad value is reported as a validation
/// error with the accepted values listed.
#[derive(Debug, Deserialize)]
pub struct MergeBody {
    pub keep_person_id: String,
    #[serde(default)]
    pub merge_person_ids: Vec<String>,
    pub merge_strategy: Option<String>,
    pub deletion_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub success: bool,
    pub merged_count: usize,
    pub updated_tables: BTreeMap<String, u64>,
    pub duplicates_removed: BTreeMap<String, u64>,
    pub deleted_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /api/admin/persons/duplicates
pub async fn list_duplicates(State(state): State<AppState>) -> ApiResult<Json<DuplicatesResponse>> {
    let detector = DuplicateDetector::new(state.db.clone(), state.config.near_duplicate_limit);
    let duplicates = detector.find_duplicate_groups().await?;

    Ok(Json(DuplicatesResponse { duplicates }))
}

/// POST /api/admin/persons/merge
pub async fn merge_persons(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<MergeBody>, JsonRejection>,
) -> ApiResult<Json<MergeResponse>> {
    let Json(body) = payload?;

    let request = MergeRequest {
        keep_id: body.keep_person_id,
        merge_ids: body.merge_person_ids,
        strategy: match body.merge_strategy.as_deref() {
            Some(raw) => raw.parse::<MergeStrategy>()?,
            None => MergeStrategy::default(),
        },
        deletion_mode: match body.deletion_mode.as_deref() {
            Some(raw) => raw.parse::<DeletionMode>()?,
            None => DeletionMode::default(),
        },
    };

    let engine = MergeEngine::new(state.db.clone(), state.ids.clone());
    let outcome = engine.merge(&request, &actor).await?;

    Ok(Json(MergeResponse {
        success: true,
        merged_count: outcome.merged_count,
        updated_tables: outcome.updated_tables,
        duplicates_removed: outcome.duplicates_removed,
        deleted_ids: outcome.deleted_ids,
    }))
}

/// DELETE /api/admin/persons/:id
///
/// Refused with 409 while any row still references the person.
pub async fn purge_person(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(person_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let engine = MergeEngine::new(state.db.clone(), state.ids.clone());
    engine.purge_person(&person_id, &actor).await?;

    Ok(Json(DeleteResponse {
        success: true,
        deleted_id: person_id,
    }))
}

/// POST /api/admin/persons/:id/restore
pub async fn restore_person(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(person_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let engine = MergeEngine::new(state.db.clone(), state.ids.clone());
    engine.restore_person(&person_id, &actor).await?;

    Ok(Json(SuccessResponse { success: true }))
}

pub fn person_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/persons/duplicates", get(list_duplicates))
        .route("/api/admin/persons/merge", post(merge_persons))
        .route("/api/admin/persons/:id", delete(purge_person))
        .route("/api/admin/persons/:id/restore", post(restore_person))
}
