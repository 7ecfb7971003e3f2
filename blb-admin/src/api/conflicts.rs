//! Conflict listing and resolution

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use blb_common::api::Actor;
use blb_common::db::{ConflictStatus, ConflictType, DataConflict};
use serde::{Deserialize, Serialize};

use crate::db::conflicts::ConflictFilter;
use crate::error::ApiResult;
use crate::services::conflict_reconciler::{ConflictPage, ResolutionChoice, ResolveRequest};
use crate::services::ConflictReconciler;
use crate::AppState;

/// Query parameters for `GET /api/admin/conflicts`
#[derive(Debug, Default, Deserialize)]
pub struct ConflictQuery {
    pub status: Option<String>,
    pub conflict_type: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ConflictQuery {
    fn filter(&self) -> blb_common::Result<ConflictFilter> {
        Ok(ConflictFilter {
            status: non_empty(&self.status)
                .map(str::parse::<ConflictStatus>)
                .transpose()?,
            conflict_type: non_empty(&self.conflict_type)
                .map(str::parse::<ConflictType>)
                .transpose()?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub conflict_id: String,
    pub resolved_value: Option<String>,
    pub choice: Option<ResolutionChoice>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkipBody {
    pub conflict_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConflictResponse {
    pub success: bool,
    pub conflict: DataConflict,
}

/// GET /api/admin/conflicts
///
/// Newest first. `limit` defaults to the configured page size.
pub async fn list_conflicts(
    State(state): State<AppState>,
    query: Result<Query<ConflictQuery>, QueryRejection>,
) -> ApiResult<Json<ConflictPage>> {
    let Query(query) = query?;
    let filter = query.filter()?;

    let reconciler = ConflictReconciler::new(state.db.clone(), state.ids.clone());
    let page = reconciler
        .list_conflicts(
            filter,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(state.config.conflict_page_size),
        )
        .await?;

    Ok(Json(page))
}

/// POST /api/admin/conflicts/resolve
pub async fn resolve_conflict(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<ResolveBody>, JsonRejection>,
) -> ApiResult<Json<ConflictResponse>> {
    let Json(body) = payload?;

    let request = ResolveRequest {
        conflict_id: body.conflict_id,
        resolved_value: body.resolved_value,
        choice: body.choice,
        notes: body.notes,
    };

    let reconciler = ConflictReconciler::new(state.db.clone(), state.ids.clone());
    let conflict = reconciler.resolve(&request, &actor).await?;

    Ok(Json(ConflictResponse {
        success: true,
        conflict,
    }))
}

/// POST /api/admin/conflicts/skip
pub async fn skip_conflict(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<SkipBody>, JsonRejection>,
) -> ApiResult<Json<ConflictResponse>> {
    let Json(body) = payload?;

    let reconciler = ConflictReconciler::new(state.db.clone(), state.ids.clone());
    let conflict = reconciler
        .skip(&body.conflict_id, body.notes.as_deref(), &actor)
        .await?;

    Ok(Json(ConflictResponse {
        success: true,
        conflict,
    }))
}

pub fn conflict_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/conflicts", get(list_conflicts))
        .route("/api/admin/conflicts/resolve", post(resolve_conflict))
        .route("/api/admin/conflicts/skip", post(skip_conflict))
}
