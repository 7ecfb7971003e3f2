//! Actor middleware for blb-admin
//!
//! Applied to every `/api/admin` route. The upstream auth layer has already
//! verified the operator; this layer checks the forwarded identity against
//! the configured allow-list and hands the resulting [`Actor`] to handlers
//! as a request extension.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use blb_common::api::{Actor, ActorAuthError, ACTOR_HEADER};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Actor middleware
///
/// Returns 401 when the header is missing and 403 when the identity is not
/// allowed. An empty allow-list passes every request through.
pub async fn actor_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok());

    let actor: Actor = state.allowed_actors.authorize(header_value).map_err(|e| {
        warn!(path = %request.uri().path(), "Actor rejected: {}", e);
        match e {
            ActorAuthError::MissingActor => ApiError::Unauthorized(e.to_string()),
            ActorAuthError::Forbidden(_) => ApiError::Forbidden(e.to_string()),
        }
    })?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}
