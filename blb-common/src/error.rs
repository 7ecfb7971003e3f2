//! Common error types for BetterLB services

use thiserror::Error;

/// Common result type for BetterLB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across BetterLB services
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying store failure (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested person, document, session or conflict does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing required field or malformed enum value
    #[error("Validation error: {0}")]
    Validation(String),

    /// Permanent delete attempted while references remain
    #[error("Referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// Business key collision (document number)
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in API error bodies and batch reports
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::ReferentialIntegrity(_) => "REFERENTIAL_INTEGRITY",
            Error::DuplicateKey(_) => "DUPLICATE_KEY",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
