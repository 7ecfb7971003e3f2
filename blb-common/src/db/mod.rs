//! Database schema, initialization and models

pub mod init;
pub mod models;

pub use init::{init_database, init_schema, memory_pool};
pub use models::*;
