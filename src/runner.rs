use crate::config::Config;
use crate::db;
use crate::discovery::ChangeSetProvider;
use crate::entry::ChangeEntry;
use crate::error::PgbeeError;
use crate::invoker::{InvocationFailure, invoke};
use crate::repository::{
    ChangeEntryRepository, LockRepository, PgChangeEntryRepository, PgLockRepository,
};
use sqlx::PgPool;
use tracing::{error, info, warn};

enum DatabaseHandle {
    /// Pool supplied by the caller; never closed by the runner.
    External(PgPool),
    /// Connection the runner opens itself on first use and closes in
    /// [`Pgbee::close`].
    Internal { url: String, pool: Option<PgPool> },
}

/// The migration engine.
///
/// Drives a run end to end: validate configuration, connect the stores,
/// acquire the process lock, walk the discovered changesets in order, and
/// release the lock on every exit path.
///
/// Multiple instances may start concurrently against the same database; the
/// lock row guarantees at most one of them executes changesets. Within one
/// process execution is strictly sequential in discovery order.
pub struct Pgbee<P, L = PgLockRepository, C = PgChangeEntryRepository> {
    config: Config,
    provider: P,
    database: DatabaseHandle,
    lock: L,
    entries: C,
}

impl<P> Pgbee<P> {
    /// Runner over an externally supplied connection pool.
    pub fn new(pool: PgPool, provider: P, config: Config) -> Self {
        let lock = PgLockRepository::new(config.lock_table_name.clone());
        let entries = PgChangeEntryRepository::new(config.changelog_table_name.clone());
        Self {
            config,
            provider,
            database: DatabaseHandle::External(pool),
            lock,
            entries,
        }
    }

    /// Runner that opens its own connection on first use. The connection is
    /// closed by [`close`](Self::close).
    pub fn from_url(url: impl Into<String>, provider: P, config: Config) -> Self {
        let lock = PgLockRepository::new(config.lock_table_name.clone());
        let entries = PgChangeEntryRepository::new(config.changelog_table_name.clone());
        Self {
            config,
            provider,
            database: DatabaseHandle::Internal {
                url: url.into(),
                pool: None,
            },
            lock,
            entries,
        }
    }
}

impl<P, L, C> Pgbee<P, L, C>
where
    P: ChangeSetProvider,
    L: LockRepository,
    C: ChangeEntryRepository,
{
    /// Runner over caller-provided storage backends. The stock Postgres
    /// repositories cover normal use; this seam exists for embedders that
    /// keep the audit trail elsewhere, and for tests.
    pub fn with_repositories(pool: PgPool, provider: P, lock: L, entries: C, config: Config) -> Self {
        Self {
            config,
            provider,
            database: DatabaseHandle::External(pool),
            lock,
            entries,
        }
    }

    /// Execute the migration run.
    ///
    /// Completes silently when disabled, when the lock is held elsewhere
    /// (unless configured to fail), and when every changeset is applied or
    /// passed over. Changeset business failures are logged and skipped; all
    /// other failures propagate after the lock is released.
    pub async fn run(&mut self) -> Result<(), PgbeeError> {
        if !self.config.enabled {
            info!("pgbee is disabled, exiting");
            return Ok(());
        }

        self.config.validate()?;

        let pool = self.connect_database().await?;
        self.entries.connect(&pool).await?;
        self.lock.connect(&pool).await?;

        let owner = if self.config.wait_for_lock {
            self.lock
                .acquire_with_wait(self.config.lock_wait_time, self.config.lock_poll_rate)
                .await?
        } else {
            self.lock.acquire().await?
        };
        let Some(owner) = owner else {
            if self.config.throw_exception_if_cannot_obtain_lock {
                return Err(PgbeeError::Lock(
                    "process lock is held by another instance".to_string(),
                ));
            }
            info!("pgbee did not acquire the process lock, exiting");
            return Ok(());
        };

        info!("pgbee acquired the process lock, starting the migration sequence");

        // The lock must be released on every exit path of the sequence,
        // including discovery failures and structural changeset failures.
        let result = self.execute_migration(&pool).await;

        info!("pgbee is releasing the process lock");
        if let Err(release_err) = self.lock.release(&owner).await {
            warn!("failed to release the process lock: {release_err}");
        }
        result?;

        info!("pgbee has finished its job");
        Ok(())
    }

    /// Best-effort read of the lock state for external monitoring. Can race
    /// with a concurrent run; never used for correctness.
    pub async fn is_execution_in_progress(&mut self) -> Result<bool, PgbeeError> {
        let pool = self.connect_database().await?;
        self.lock.connect(&pool).await?;
        self.lock.is_held().await
    }

    /// Close the connection the runner created internally. No-op when the
    /// pool was supplied externally.
    pub async fn close(&mut self) {
        if let DatabaseHandle::Internal { pool, .. } = &mut self.database
            && let Some(pool) = pool.take()
        {
            pool.close().await;
        }
    }

    async fn connect_database(&mut self) -> Result<PgPool, PgbeeError> {
        match &mut self.database {
            DatabaseHandle::External(pool) => Ok(pool.clone()),
            DatabaseHandle::Internal { url, pool } => {
                if let Some(pool) = pool.as_ref() {
                    return Ok(pool.clone());
                }
                let connected = db::connect_to_database(url).await?;
                *pool = Some(connected.clone());
                Ok(connected)
            }
        }
    }

    async fn execute_migration(&self, pool: &PgPool) -> Result<(), PgbeeError> {
        // Presence was checked by validate(); discovery revalidates anyway.
        let scan_target = self
            .config
            .changelogs_scan_target
            .as_deref()
            .unwrap_or_default();
        let changesets = self.provider.discover(scan_target)?;

        for changeset in &changesets {
            let entry = ChangeEntry::from_changeset(changeset);
            if self.entries.is_new_change(&entry).await? {
                match invoke(changeset, pool, self.config.environment_context.as_ref()).await {
                    Ok(()) => {
                        self.entries.save(&entry).await?;
                        info!("{entry} applied");
                    }
                    Err(failure) => Self::handle_failure(failure, &entry)?,
                }
            } else if changeset.is_run_always() {
                match invoke(changeset, pool, self.config.environment_context.as_ref()).await {
                    Ok(()) => info!("{entry} reapplied"),
                    Err(failure) => Self::handle_failure(failure, &entry)?,
                }
            } else {
                info!("{entry} passed over");
            }
        }

        Ok(())
    }

    fn handle_failure(failure: InvocationFailure, entry: &ChangeEntry) -> Result<(), PgbeeError> {
        match failure {
            // Domain failure of the unit itself: tolerated so unrelated later
            // changesets still run. No audit entry is written.
            InvocationFailure::Business(err) => {
                error!("{entry} failed: {err:#}");
                Ok(())
            }
            // Malformed declaration: the migration set is broken, stop the
            // run rather than silently skipping work.
            InvocationFailure::Structural(message) => Err(PgbeeError::ChangeSet(message)),
        }
    }
}
