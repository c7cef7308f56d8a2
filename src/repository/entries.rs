use super::{ChangeEntryRepository, format_table_name};
use crate::entry::ChangeEntry;
use crate::error::PgbeeError;
use sqlx::PgPool;
use std::sync::Mutex;

/// PostgreSQL-backed [`ChangeEntryRepository`].
///
/// The `(changeset_id, author)` primary key enforces the idempotency
/// uniqueness rule at the storage layer; a duplicate save surfaces as a
/// database error rather than an overwrite.
pub struct PgChangeEntryRepository {
    table: String,
    pool: Mutex<Option<PgPool>>,
}

impl PgChangeEntryRepository {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            pool: Mutex::new(None),
        }
    }

    fn pool(&self) -> Result<PgPool, PgbeeError> {
        self.pool
            .lock()
            .expect("changelog repository pool mutex poisoned")
            .clone()
            .ok_or_else(|| {
                PgbeeError::Configuration(
                    "changelog repository is not connected to a database".to_string(),
                )
            })
    }
}

impl ChangeEntryRepository for PgChangeEntryRepository {
    async fn connect(&self, pool: &PgPool) -> Result<(), PgbeeError> {
        let table = format_table_name(&self.table)?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                changeset_id TEXT NOT NULL,
                author TEXT NOT NULL,
                changelog_class TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL,
                custom_data JSONB,
                PRIMARY KEY (changeset_id, author)
            )
            "#
        ))
        .execute(pool)
        .await?;

        *self
            .pool
            .lock()
            .expect("changelog repository pool mutex poisoned") = Some(pool.clone());
        Ok(())
    }

    async fn is_new_change(&self, entry: &ChangeEntry) -> Result<bool, PgbeeError> {
        let pool = self.pool()?;
        let table = format_table_name(&self.table)?;

        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {table} WHERE changeset_id = $1 AND author = $2"
        ))
        .bind(&entry.changeset_id)
        .bind(&entry.author)
        .fetch_one(&pool)
        .await?;

        Ok(count == 0)
    }

    async fn save(&self, entry: &ChangeEntry) -> Result<(), PgbeeError> {
        let pool = self.pool()?;
        let table = format_table_name(&self.table)?;

        sqlx::query(&format!(
            "INSERT INTO {table} (changeset_id, author, changelog_class, applied_at, custom_data) \
             VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(&entry.changeset_id)
        .bind(&entry.author)
        .bind(&entry.changelog_class)
        .bind(entry.applied_at)
        .bind(&entry.custom_data)
        .execute(&pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{ChangeSet, ChangeSetHandler};

    #[tokio::test]
    async fn operations_require_connect() {
        let repo = PgChangeEntryRepository::new("dbchangelog");
        let changeset = ChangeSet::new(
            "a",
            "alice",
            "01",
            ChangeSetHandler::no_args(|| async { Ok(()) }),
        );
        let entry = ChangeEntry::from_changeset(&changeset);
        let err = repo.is_new_change(&entry).await.unwrap_err();
        assert!(matches!(err, PgbeeError::Configuration(_)));
    }
}
