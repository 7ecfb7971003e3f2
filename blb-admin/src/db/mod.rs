//! Database access layer for blb-admin
//!
//! Free functions over `&SqlitePool` for reads and `&mut SqliteConnection`
//! for anything that runs inside a monitored transaction. All user input is
//! bound as a parameter; IN-lists go through [`push_id_list`].

pub mod audit;
pub mod conflicts;
pub mod documents;
pub mod persons;
pub mod sessions;

use sqlx::{QueryBuilder, Sqlite};

/// Append `(?, ?, ...)` binding every id
///
/// Callers must not pass an empty slice: `IN ()` is a syntax error in SQLite.
pub(crate) fn push_id_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, ids: &'a [String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}
