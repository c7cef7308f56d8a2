use thiserror::Error;

/// Failure taxonomy for a migration run.
///
/// A changeset's own business failure is not represented here: it is an
/// arbitrary `anyhow::Error` raised by the unit of work, logged by the
/// engine and never propagated to the caller.
#[derive(Debug, Error)]
pub enum PgbeeError {
    /// The runner configuration is unusable (e.g. no scan target, invalid
    /// table identifier). Raised before anything touches the database.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The database, lock table or changelog table could not be reached or
    /// queried.
    #[error("database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    /// The process lock could not be obtained under the configured policy
    /// and `throw_exception_if_cannot_obtain_lock` is set.
    #[error("could not acquire process lock: {0}")]
    Lock(String),

    /// A malformed changeset declaration: duplicate `(id, author)` pair at
    /// discovery, or a structural dispatch failure at invocation time.
    #[error("changeset error: {0}")]
    ChangeSet(String),
}
