//! HTTP API handlers for blb-admin

pub mod auth;
pub mod conflicts;
pub mod documents;
pub mod health;
pub mod persons;
pub mod posts;
pub mod sessions;

pub use auth::actor_middleware;
pub use conflicts::conflict_routes;
pub use documents::document_routes;
pub use health::health_routes;
pub use persons::person_routes;
pub use posts::post_routes;
pub use sessions::session_routes;
