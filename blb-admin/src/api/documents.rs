//! Bulk document creation

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use blb_common::api::Actor;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::bulk_documents::{BulkOutcome, DocumentInput};
use crate::services::BulkDocumentIngester;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    pub session_id: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentInput>,
    #[serde(default)]
    pub skip_duplicates: bool,
}

/// POST /api/admin/documents/bulk
///
/// Per-item failures come back in `errors[]` with a 200; only an unknown
/// session fails the request.
pub async fn bulk_create_documents(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<BulkBody>, JsonRejection>,
) -> ApiResult<Json<BulkOutcome>> {
    let Json(body) = payload?;

    let ingester = BulkDocumentIngester::new(state.db.clone(), state.ids.clone());
    let outcome = ingester
        .bulk_create(
            body.session_id.as_deref(),
            &body.documents,
            body.skip_duplicates,
            &actor,
        )
        .await?;

    Ok(Json(outcome))
}

pub fn document_routes() -> Router<AppState> {
    Router::new().route("/api/admin/documents/bulk", post(bulk_create_documents))
}
