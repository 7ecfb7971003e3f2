//! # BetterLB Common Library
//!
//! Shared code for BetterLB services including:
//! - Database schema, initialization and models
//! - Error taxonomy
//! - Configuration resolution
//! - Actor attribution helpers
//! - Identifier and timestamp utilities

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
