//! blb-admin library - admin reconciliation service
//!
//! Turns pasted social posts and operator input into canonical legislative
//! records: person de-duplication and merge, bulk document ingestion with
//! conflict capture, conflict resolution, session attendance and review
//! flagging. Every mutation is attributed to an [`Actor`] in the audit log.
//!
//! [`Actor`]: blb_common::api::Actor

use axum::Router;
use blb_common::api::AllowedActors;
use blb_common::config::AdminConfig;
use blb_common::IdGenerator;
use sqlx::SqlitePool;
use std::sync::Arc;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;
pub mod utils;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Source of new record identifiers
    pub ids: Arc<dyn IdGenerator>,
    pub config: Arc<AdminConfig>,
    /// Empty list disables actor checking
    pub allowed_actors: AllowedActors,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, ids: Arc<dyn IdGenerator>, config: AdminConfig) -> Self {
        let allowed_actors = AllowedActors::new(&config.allowed_actors);
        Self {
            db,
            ids,
            config: Arc::new(config),
            allowed_actors,
        }
    }
}

/// Build application router
///
/// `/api/admin/*` routes pass through the actor middleware; `/health` does not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    // Admin routes (require an allowed actor)
    let admin = Router::new()
        .merge(api::person_routes())
        .merge(api::conflict_routes())
        .merge(api::post_routes())
        .merge(api::document_routes())
        .merge(api::session_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::actor_middleware,
        ));

    // Public routes
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(admin)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
