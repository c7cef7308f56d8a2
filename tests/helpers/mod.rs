#![allow(dead_code)]

use pgbee::repository::{ChangeEntryRepository, LockRepository};
use pgbee::{ChangeEntry, ChangeSet, ChangeSetHandler, PgbeeError};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Pool that parses its URL but never connects. Good enough for changesets
/// that don't touch the database handle.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://pgbee@localhost:5432/pgbee")
        .expect("lazy pool URL must parse")
}

/// Changeset whose only effect is bumping a counter.
pub fn counting_changeset(
    id: &str,
    author: &str,
    order: &str,
    counter: Arc<AtomicUsize>,
) -> ChangeSet {
    ChangeSet::new(
        id,
        author,
        order,
        ChangeSetHandler::no_args(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
}

#[derive(Default)]
struct LockInner {
    owner: Mutex<Option<String>>,
    connects: AtomicUsize,
    token_seq: AtomicUsize,
}

/// In-memory stand-in for the lock table. The mutex makes acquire a true
/// compare-and-set, mirroring the atomic conditional write of the Postgres
/// implementation.
#[derive(Clone, Default)]
pub struct MemoryLockRepository {
    inner: Arc<LockInner>,
}

impl MemoryLockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend another process holds the lock.
    pub fn seize(&self, owner: &str) {
        *self.inner.owner.lock().unwrap() = Some(owner.to_string());
    }

    pub fn is_locked(&self) -> bool {
        self.inner.owner.lock().unwrap().is_some()
    }

    pub fn current_owner(&self) -> Option<String> {
        self.inner.owner.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

impl LockRepository for MemoryLockRepository {
    async fn connect(&self, _pool: &PgPool) -> Result<(), PgbeeError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn acquire(&self) -> Result<Option<String>, PgbeeError> {
        let mut owner = self.inner.owner.lock().unwrap();
        if owner.is_some() {
            return Ok(None);
        }
        let token = format!("owner-{}", self.inner.token_seq.fetch_add(1, Ordering::SeqCst) + 1);
        *owner = Some(token.clone());
        Ok(Some(token))
    }

    async fn release(&self, owner: &str) -> Result<(), PgbeeError> {
        let mut current = self.inner.owner.lock().unwrap();
        if current.as_deref() == Some(owner) {
            *current = None;
        }
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, PgbeeError> {
        Ok(self.inner.owner.lock().unwrap().is_some())
    }
}

#[derive(Default)]
struct EntriesInner {
    entries: Mutex<Vec<ChangeEntry>>,
    connects: AtomicUsize,
}

/// In-memory stand-in for the changelog table.
#[derive(Clone, Default)]
pub struct MemoryChangeEntryRepository {
    inner: Arc<EntriesInner>,
}

impl MemoryChangeEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().unwrap().len()
    }

    pub fn contains(&self, changeset_id: &str, author: &str) -> bool {
        self.inner
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.changeset_id == changeset_id && e.author == author)
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

impl ChangeEntryRepository for MemoryChangeEntryRepository {
    async fn connect(&self, _pool: &PgPool) -> Result<(), PgbeeError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_new_change(&self, entry: &ChangeEntry) -> Result<bool, PgbeeError> {
        Ok(!self.contains(&entry.changeset_id, &entry.author))
    }

    async fn save(&self, entry: &ChangeEntry) -> Result<(), PgbeeError> {
        let mut entries = self.inner.entries.lock().unwrap();
        if entries
            .iter()
            .any(|e| e.changeset_id == entry.changeset_id && e.author == entry.author)
        {
            return Err(PgbeeError::ChangeSet(format!(
                "duplicate entry saved for {}:{}",
                entry.changeset_id, entry.author
            )));
        }
        entries.push(entry.clone());
        Ok(())
    }
}
