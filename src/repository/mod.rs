mod entries;
mod lock;

pub use entries::PgChangeEntryRepository;
pub use lock::PgLockRepository;

use crate::entry::ChangeEntry;
use crate::error::PgbeeError;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Persistent single-row mutual exclusion across runner processes.
///
/// `acquire` must be a single atomic conditional write against the backing
/// store; two processes racing on an empty store must never both win.
#[allow(async_fn_in_trait)]
pub trait LockRepository {
    /// Bind the store to a live database session and prepare its table.
    /// Must be called before any other operation; repeated calls rebind.
    async fn connect(&self, pool: &PgPool) -> Result<(), PgbeeError>;

    /// Attempt to take the lock. Returns a freshly generated owner token on
    /// success, `None` when another process holds it.
    async fn acquire(&self) -> Result<Option<String>, PgbeeError>;

    /// Clear the lock if `owner` matches the stored token. A mismatch means
    /// the lock has since been taken by someone else and is silently ignored.
    async fn release(&self, owner: &str) -> Result<(), PgbeeError>;

    /// Non-authoritative read of the lock state, for diagnostics only.
    async fn is_held(&self) -> Result<bool, PgbeeError>;

    /// Poll [`acquire`](Self::acquire) at `poll_interval` cadence until it
    /// succeeds or `max_wait` elapses. The sleep between attempts is the only
    /// suspension point in the runner.
    async fn acquire_with_wait(
        &self,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Option<String>, PgbeeError> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(owner) = self.acquire().await? {
                return Ok(Some(owner));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

/// Append-only record of applied changesets, queried for idempotency checks.
#[allow(async_fn_in_trait)]
pub trait ChangeEntryRepository {
    /// Bind the store to a live database session and prepare its table.
    /// Must be called before any other operation; repeated calls rebind.
    async fn connect(&self, pool: &PgPool) -> Result<(), PgbeeError>;

    /// True iff no entry exists with the same `(changeset_id, author)` pair.
    async fn is_new_change(&self, entry: &ChangeEntry) -> Result<bool, PgbeeError>;

    /// Append an entry. Logically insert-only: the table's primary key makes
    /// a duplicate write fail rather than overwrite.
    async fn save(&self, entry: &ChangeEntry) -> Result<(), PgbeeError>;
}

/// Validate a configurable table name and quote it for interpolation into
/// DDL/DML. Bind parameters cannot carry identifiers, so the name is checked
/// against PostgreSQL identifier rules instead.
pub(crate) fn format_table_name(name: &str) -> Result<String, PgbeeError> {
    fn is_valid_sql_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    }

    if !is_valid_sql_identifier(name) {
        return Err(PgbeeError::Configuration(format!(
            "invalid table name '{name}': must contain only letters, numbers, underscores, \
             and dollar signs, starting with a letter or underscore"
        )));
    }

    Ok(format!(r#""{name}""#))
}
