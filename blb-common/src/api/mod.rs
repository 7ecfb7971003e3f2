//! API module for shared HTTP API functionality
//!
//! Contains only framework-independent pieces: actor attribution and the
//! error body shape. Each service wraps these in its own axum middleware.

pub mod auth;
pub mod types;

pub use auth::{Actor, ActorAuthError, AllowedActors, ACTOR_HEADER};
pub use types::{ErrorBody, ErrorResponse};
