//! Duplicate person detection
//!
//! Two passes over non-deleted persons:
//! - **exact**: identical (first_name, last_name), one group per collision set,
//!   newest earliest-member first
//! - **near**: same first/last name but a different middle name, one group per
//!   pair, bounded by the configured pair limit
//!
//! Every group carries the full person rows and aggregate reference counts so
//! the operator can judge how much a merge will touch. Pure read.

use crate::db::persons::fetch_persons;
use crate::db::push_id_list;
use blb_common::db::Person;
use blb_common::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Exact,
    Near,
}

/// One candidate set of duplicate persons
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub kind: DuplicateKind,
    pub person_ids: Vec<String>,
    pub persons: Vec<Person>,
    /// document_authors rows referencing any person in the group
    pub document_count: i64,
    pub membership_count: i64,
    pub committee_count: i64,
}

/// Duplicate Detector
pub struct DuplicateDetector {
    db: SqlitePool,
    near_duplicate_limit: i64,
}

impl DuplicateDetector {
    pub fn new(db: SqlitePool, near_duplicate_limit: i64) -> Self {
        Self {
            db,
            near_duplicate_limit,
        }
    }

    /// Exact groups followed by near pairs
    pub async fn find_duplicate_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let mut groups = Vec::new();

        for person_ids in self.exact_groups().await? {
            groups.push(self.build_group(DuplicateKind::Exact, person_ids).await?);
        }
        let exact_count = groups.len();

        for person_ids in self.near_pairs().await? {
            groups.push(self.build_group(DuplicateKind::Near, person_ids).await?);
        }

        tracing::info!(
            exact = exact_count,
            near = groups.len() - exact_count,
            near_limit = self.near_duplicate_limit,
            "Duplicate scan complete"
        );

        Ok(groups)
    }

    async fn exact_groups(&self) -> Result<Vec<Vec<String>>> {
        let keys: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT first_name, last_name
            FROM persons
            WHERE deleted_at IS NULL
            GROUP BY first_name, last_name
            HAVING COUNT(*) > 1
            ORDER BY MIN(created_at) DESC, last_name, first_name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut groups = Vec::with_capacity(keys.len());
        for (first_name, last_name) in keys {
            let ids: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT id FROM persons
                WHERE deleted_at IS NULL AND first_name = ? AND last_name = ?
                ORDER BY created_at, id
                "#,
            )
            .bind(&first_name)
            .bind(&last_name)
            .fetch_all(&self.db)
            .await?;
            groups.push(ids);
        }

        Ok(groups)
    }

    async fn near_pairs(&self) -> Result<Vec<Vec<String>>> {
        let pairs: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT p1.id, p2.id
            FROM persons p1
            JOIN persons p2
              ON p1.first_name = p2.first_name
             AND p1.last_name = p2.last_name
             AND p1.id < p2.id
            WHERE p1.deleted_at IS NULL
              AND p2.deleted_at IS NULL
              AND COALESCE(p1.middle_name, '') <> COALESCE(p2.middle_name, '')
            ORDER BY p1.last_name, p1.first_name, p1.id, p2.id
            LIMIT ?
            "#,
        )
        .bind(self.near_duplicate_limit)
        .fetch_all(&self.db)
        .await?;

        Ok(pairs.into_iter().map(|(a, b)| vec![a, b]).collect())
    }

    async fn build_group(&self, kind: DuplicateKind, person_ids: Vec<String>) -> Result<DuplicateGroup> {
        let persons = fetch_persons(&self.db, &person_ids).await?;

        Ok(DuplicateGroup {
            kind,
            document_count: self.count_references("document_authors", &person_ids).await?,
            membership_count: self.count_references("memberships", &person_ids).await?,
            committee_count: self
                .count_references("committee_memberships", &person_ids)
                .await?,
            person_ids,
            persons,
        })
    }

    /// One aggregate query for the whole group
    async fn count_references(&self, table: &'static str, person_ids: &[String]) -> Result<i64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE person_id IN ", table));
        push_id_list(&mut builder, person_ids);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::persons::{insert_person, NewPerson};
    use blb_common::db::memory_pool;

    async fn set_created(pool: &SqlitePool, id: &str, created_at: &str) {
        sqlx::query("UPDATE persons SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exact_group_contains_both_persons() {
        let pool = memory_pool().await.unwrap();
        insert_person(&pool, "p1", &NewPerson::new("Juan", "Cruz")).await.unwrap();
        insert_person(&pool, "p2", &NewPerson::new("Juan", "Cruz")).await.unwrap();
        insert_person(&pool, "p3", &NewPerson::new("Pedro", "Cruz")).await.unwrap();

        let groups = DuplicateDetector::new(pool, 50).find_duplicate_groups().await.unwrap();
        let exact: Vec<_> = groups.iter().filter(|g| g.kind == DuplicateKind::Exact).collect();

        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].person_ids, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(exact[0].persons.len(), 2);
    }

    #[tokio::test]
    async fn test_exact_groups_ordered_by_earliest_member_desc() {
        let pool = memory_pool().await.unwrap();
        for (id, first) in [("a1", "Ana"), ("a2", "Ana"), ("b1", "Ben"), ("b2", "Ben")] {
            insert_person(&pool, id, &NewPerson::new(first, "Reyes")).await.unwrap();
        }
        set_created(&pool, "a1", "2020-01-01 00:00:00").await;
        set_created(&pool, "a2", "2024-01-01 00:00:00").await;
        set_created(&pool, "b1", "2022-01-01 00:00:00").await;
        set_created(&pool, "b2", "2022-06-01 00:00:00").await;

        let groups = DuplicateDetector::new(pool, 50).find_duplicate_groups().await.unwrap();
        assert_eq!(groups[0].person_ids[0], "b1");
        assert_eq!(groups[1].person_ids[0], "a1");
    }

    #[tokio::test]
    async fn test_soft_deleted_persons_are_excluded() {
        let pool = memory_pool().await.unwrap();
        insert_person(&pool, "p1", &NewPerson::new("Juan", "Cruz")).await.unwrap();
        insert_person(&pool, "p2", &NewPerson::new("Juan", "Cruz")).await.unwrap();
        sqlx::query("UPDATE persons SET deleted_at = '2024-01-01T00:00:00.000Z' WHERE id = 'p2'")
            .execute(&pool)
            .await
            .unwrap();

        let groups = DuplicateDetector::new(pool, 50).find_duplicate_groups().await.unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_near_pairs_differ_in_middle_name_and_respect_limit() {
        let pool = memory_pool().await.unwrap();
        insert_person(&pool, "p1", &NewPerson::new("Juan", "Cruz").with_middle("A")).await.unwrap();
        insert_person(&pool, "p2", &NewPerson::new("Juan", "Cruz").with_middle("B")).await.unwrap();
        insert_person(&pool, "p3", &NewPerson::new("Juan", "Cruz")).await.unwrap();

        let groups = DuplicateDetector::new(pool.clone(), 50)
            .find_duplicate_groups()
            .await
            .unwrap();
        let near: Vec<_> = groups.iter().filter(|g| g.kind == DuplicateKind::Near).collect();
        assert_eq!(near.len(), 3);
        assert!(near.iter().all(|g| g.person_ids.len() == 2));

        let capped = DuplicateDetector::new(pool, 2).find_duplicate_groups().await.unwrap();
        let near = capped.iter().filter(|g| g.kind == DuplicateKind::Near).count();
        assert_eq!(near, 2);
    }

    #[tokio::test]
    async fn test_group_reference_counts() {
        let pool = memory_pool().await.unwrap();
        insert_person(&pool, "p1", &NewPerson::new("Juan", "Cruz")).await.unwrap();
        insert_person(&pool, "p2", &NewPerson::new("Juan", "Cruz")).await.unwrap();
        for sql in [
            "INSERT INTO terms (id, name) VALUES ('t1', '2022-2025')",
            "INSERT INTO committees (id, name) VALUES ('c1', 'Finance')",
            "INSERT INTO documents (id, type, number, title) VALUES ('d1', 'ordinance', 'ORD-1', 'T')",
            "INSERT INTO documents (id, type, number, title) VALUES ('d2', 'resolution', 'RES-1', 'T')",
            "INSERT INTO document_authors (document_id, person_id) VALUES ('d1', 'p1')",
            "INSERT INTO document_authors (document_id, person_id) VALUES ('d2', 'p2')",
            "INSERT INTO memberships (person_id, term_id) VALUES ('p1', 't1')",
            "INSERT INTO committee_memberships (person_id, committee_id, term_id) VALUES ('p2', 'c1', 't1')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        let groups = DuplicateDetector::new(pool, 50).find_duplicate_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].document_count, 2);
        assert_eq!(groups[0].membership_count, 1);
        assert_eq!(groups[0].committee_count, 1);
    }
}
