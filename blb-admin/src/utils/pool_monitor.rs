//! Monitored transactions
//!
//! Every multi-step admin mutation (merge, conflict resolution, per-item bulk
//! create, session creation) runs inside one of these. The wrapper logs how
//! long the connection waited and how long it was held, and a transaction
//! dropped without commit is rolled back by sqlx and reported here.

use blb_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::ops::{Deref, DerefMut};
use std::time::Instant;

/// Transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    fn new(tx: Transaction<'c, Sqlite>, caller: &'static str, acquired_at: Instant) -> Self {
        Self {
            tx: Some(tx),
            caller,
            acquired_at,
        }
    }

    fn take(&mut self) -> Result<Transaction<'c, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already consumed", self.caller)))
    }

    /// Commit and log how long the connection was held
    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await.map_err(Error::Database)?;

        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms,
                "LONG TRANSACTION - connection held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms = held_ms, "Transaction committed");
        }

        Ok(())
    }

    /// Roll back explicitly (dropping has the same effect)
    pub async fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback().await.map_err(Error::Database)?;

        tracing::debug!(
            caller = self.caller,
            held_ms = self.acquired_at.elapsed().as_millis(),
            "Transaction rolled back"
        );

        Ok(())
    }
}

impl<'c> Deref for MonitoredTransaction<'c> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self.tx.as_ref() {
            Some(tx) => &**tx,
            None => unreachable!("transaction is only taken by commit/rollback, which consume self"),
        }
    }
}

impl<'c> DerefMut for MonitoredTransaction<'c> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self.tx.as_mut() {
            Some(tx) => &mut **tx,
            None => unreachable!("transaction is only taken by commit/rollback, which consume self"),
        }
    }
}

impl<'c> Drop for MonitoredTransaction<'c> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                caller = self.caller,
                held_ms = self.acquired_at.elapsed().as_millis(),
                "Transaction dropped without commit - changes rolled back"
            );
        }
    }
}

/// Begin a monitored transaction
///
/// # Example
/// ```ignore
/// let mut tx = begin_monitored(&pool, "merge_engine::merge").await?;
/// sqlx::query("UPDATE ...").execute(&mut *tx).await?;
/// tx.commit().await?;
/// ```
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();

    let tx = pool.begin().await.map_err(Error::Database)?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(
            caller = caller,
            wait_ms = wait_ms,
            "SLOW CONNECTION ACQUISITION - pool may be saturated"
        );
    } else {
        tracing::debug!(caller = caller, wait_ms = wait_ms, "Transaction started");
    }

    Ok(MonitoredTransaction::new(tx, caller, Instant::now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let pool = blb_common::db::memory_pool().await.unwrap();

        {
            let mut tx = begin_monitored(&pool, "test::drop").await.unwrap();
            sqlx::query("INSERT INTO terms (id, name) VALUES ('t1', '2022-2025')")
                .execute(&mut *tx)
                .await
                .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM terms")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_committed_transaction_persists() {
        let pool = blb_common::db::memory_pool().await.unwrap();

        let mut tx = begin_monitored(&pool, "test::commit").await.unwrap();
        sqlx::query("INSERT INTO terms (id, name) VALUES ('t1', '2022-2025')")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM terms")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
