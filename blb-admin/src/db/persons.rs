//! Person queries

use super::push_id_list;
use blb_common::db::Person;
use blb_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

/// Fields for a new person row
#[derive(Debug, Clone, Default)]
pub struct NewPerson {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    pub aliases: Vec<String>,
}

impl NewPerson {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    pub fn with_middle(mut self, middle_name: impl Into<String>) -> Self {
        self.middle_name = Some(middle_name.into());
        self
    }
}

/// Insert a person row under the given id
pub async fn insert_person(pool: &SqlitePool, id: &str, person: &NewPerson) -> Result<()> {
    let aliases = if person.aliases.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&person.aliases).map_err(|e| {
            blb_common::Error::Internal(format!("Failed to encode aliases: {}", e))
        })?)
    };
    let now = blb_common::time::now_text();

    sqlx::query(
        r#"
        INSERT INTO persons (
            id, first_name, middle_name, last_name, suffix, aliases, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&person.first_name)
    .bind(&person.middle_name)
    .bind(&person.last_name)
    .bind(&person.suffix)
    .bind(aliases)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a person by id, soft-deleted or not
pub async fn fetch_person(pool: &SqlitePool, id: &str) -> Result<Option<Person>> {
    let row = sqlx::query(&format!("SELECT {} FROM persons WHERE id = ?", Person::COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Person::from_row).transpose()
}

/// Load persons by id list, ordered by creation then id
pub async fn fetch_persons(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Person>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM persons WHERE id IN ",
        Person::COLUMNS
    ));
    push_id_list(&mut builder, ids);
    builder.push(" ORDER BY created_at, id");

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(Person::from_row).collect()
}

/// Ids from `ids` with no persons row (deleted flag is ignored)
pub async fn missing_person_ids(conn: &mut SqliteConnection, ids: &[String]) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM persons WHERE id IN ");
    push_id_list(&mut builder, ids);

    let found: Vec<String> = builder.build_query_scalar().fetch_all(&mut *conn).await?;

    Ok(ids
        .iter()
        .filter(|id| !found.contains(id))
        .cloned()
        .collect())
}

/// Whether a person row exists, soft-deleted or not
pub async fn person_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

/// Rows in other tables still pointing at a person
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceCounts {
    pub memberships: i64,
    pub document_authors: i64,
    pub session_absences: i64,
    pub committee_memberships: i64,
    pub documents: i64,
}

impl ReferenceCounts {
    pub fn total(&self) -> i64 {
        self.memberships
            + self.document_authors
            + self.session_absences
            + self.committee_memberships
            + self.documents
    }
}

/// Count every foreign-key reference to a person
pub async fn reference_counts(conn: &mut SqliteConnection, id: &str) -> Result<ReferenceCounts> {
    let (memberships, document_authors, session_absences, committee_memberships, documents): (
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM memberships WHERE person_id = ?),
            (SELECT COUNT(*) FROM document_authors WHERE person_id = ?),
            (SELECT COUNT(*) FROM session_absences WHERE person_id = ?),
            (SELECT COUNT(*) FROM committee_memberships WHERE person_id = ?),
            (SELECT COUNT(*) FROM documents WHERE moved_by = ? OR seconded_by = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .bind(id)
    .bind(id)
    .bind(id)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ReferenceCounts {
        memberships,
        document_authors,
        session_absences,
        committee_memberships,
        documents,
    })
}
