use super::{LockRepository, format_table_name};
use crate::error::PgbeeError;
use sqlx::PgPool;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// The lock table holds a single well-known row per deployment.
const LOCK_KEY: &str = "LOCK";

/// PostgreSQL-backed [`LockRepository`].
///
/// Acquisition is one conditional upsert: the row transitions to locked only
/// when it is absent or currently unlocked, so two processes starting at the
/// same instant cannot both win.
pub struct PgLockRepository {
    table: String,
    pool: Mutex<Option<PgPool>>,
}

impl PgLockRepository {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            pool: Mutex::new(None),
        }
    }

    fn pool(&self) -> Result<PgPool, PgbeeError> {
        self.pool
            .lock()
            .expect("lock repository pool mutex poisoned")
            .clone()
            .ok_or_else(|| {
                PgbeeError::Configuration(
                    "lock repository is not connected to a database".to_string(),
                )
            })
    }

    fn owner_token() -> String {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        format!("{host}:{}:{}", std::process::id(), Uuid::new_v4())
    }
}

impl LockRepository for PgLockRepository {
    async fn connect(&self, pool: &PgPool) -> Result<(), PgbeeError> {
        let table = format_table_name(&self.table)?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                lock_key TEXT PRIMARY KEY,
                locked BOOLEAN NOT NULL,
                owner TEXT NOT NULL,
                locked_at TIMESTAMPTZ NOT NULL
            )
            "#
        ))
        .execute(pool)
        .await?;

        *self
            .pool
            .lock()
            .expect("lock repository pool mutex poisoned") = Some(pool.clone());
        Ok(())
    }

    async fn acquire(&self) -> Result<Option<String>, PgbeeError> {
        let pool = self.pool()?;
        let table = format_table_name(&self.table)?;
        let owner = Self::owner_token();

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (lock_key, locked, owner, locked_at)
            VALUES ($1, TRUE, $2, now())
            ON CONFLICT (lock_key) DO UPDATE
            SET locked = TRUE, owner = EXCLUDED.owner, locked_at = EXCLUDED.locked_at
            WHERE {table}.locked = FALSE
            "#
        ))
        .bind(LOCK_KEY)
        .bind(&owner)
        .execute(&pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!("acquired process lock as {owner}");
            Ok(Some(owner))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, owner: &str) -> Result<(), PgbeeError> {
        let pool = self.pool()?;
        let table = format_table_name(&self.table)?;

        let result = sqlx::query(&format!(
            "UPDATE {table} SET locked = FALSE, owner = '', locked_at = now() \
             WHERE lock_key = $1 AND owner = $2 AND locked"
        ))
        .bind(LOCK_KEY)
        .bind(owner)
        .execute(&pool)
        .await?;

        if result.rows_affected() == 0 {
            // Already released, or taken over by another owner in the
            // meantime; either way there is nothing of ours to clear.
            debug!("process lock was not held by {owner}, nothing released");
        }
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, PgbeeError> {
        let pool = self.pool()?;
        let table = format_table_name(&self.table)?;

        let locked: Option<(bool,)> =
            sqlx::query_as(&format!("SELECT locked FROM {table} WHERE lock_key = $1"))
                .bind(LOCK_KEY)
                .fetch_optional(&pool)
                .await?;

        Ok(locked.map(|(locked,)| locked).unwrap_or(false))
    }
}
