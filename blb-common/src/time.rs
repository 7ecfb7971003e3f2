//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as stored in TEXT timestamp columns (`deleted_at`, `resolved_at`, ...)
pub fn now_text() -> String {
    now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
