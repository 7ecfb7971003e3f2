//! Post extraction endpoint
//!
//! Parses a pasted social post and resolves the attendee names it finds
//! against the person store. Nothing is written.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::entity_matcher::MatchedAttendee;
use crate::services::post_parser::{self, ParsedPost};
use crate::services::EntityMatcher;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    #[serde(flatten)]
    pub parsed: ParsedPost,
    /// Matched date as `YYYY-MM-DD` when it is a real calendar day
    pub iso_date: Option<String>,
    pub matched_attendees: Vec<MatchedAttendee>,
}

/// POST /api/admin/posts/parse
pub async fn parse_post(
    State(state): State<AppState>,
    payload: Result<Json<ParseBody>, JsonRejection>,
) -> ApiResult<Json<ParseResponse>> {
    let Json(body) = payload?;

    let parsed = post_parser::parse(&body.content);
    let matcher = EntityMatcher::new(state.db.clone());
    let matched_attendees = matcher.match_names(&parsed.attendee_names).await?;

    tracing::debug!(
        names = parsed.attendee_names.len(),
        matched = matched_attendees.iter().filter(|m| m.person_id.is_some()).count(),
        "Parsed post"
    );

    Ok(Json(ParseResponse {
        iso_date: parsed.iso_date(),
        parsed,
        matched_attendees,
    }))
}

pub fn post_routes() -> Router<AppState> {
    Router::new().route("/api/admin/posts/parse", post(parse_post))
}
