//! pgbee — a PostgreSQL changeset migration runner.
//!
//! Applies an ordered set of idempotent, versioned changesets to a shared
//! database exactly once per `(id, author)` identity. Concurrently starting
//! application instances coordinate through a single database-backed lock
//! row, so at most one process executes migrations at a time.
//!
//! ```no_run
//! use pgbee::{ChangeLog, ChangeLogRegistry, ChangeSet, ChangeSetHandler, Config, Pgbee};
//!
//! # async fn demo() -> Result<(), pgbee::PgbeeError> {
//! let registry = ChangeLogRegistry::new().register(
//!     ChangeLog::new("app.changelogs.InitSchema").changeset(
//!         ChangeSet::new(
//!             "create-users",
//!             "alice",
//!             "001",
//!             ChangeSetHandler::with_db(|pool| async move {
//!                 sqlx::query("CREATE TABLE users (id BIGINT PRIMARY KEY)")
//!                     .execute(&pool)
//!                     .await?;
//!                 Ok(())
//!             }),
//!         ),
//!     ),
//! );
//!
//! let config = Config::builder().scan_target("app.changelogs").build();
//! let mut runner = Pgbee::from_url("postgres://localhost/app", registry, config);
//! runner.run().await?;
//! runner.close().await;
//! # Ok(())
//! # }
//! ```

mod changeset;
mod config;
mod db;
mod discovery;
mod entry;
mod error;
mod invoker;
pub mod repository;
mod runner;

pub use changeset::{ChangeSet, ChangeSetHandler, Environment};
pub use config::{Config, ConfigBuilder, DEFAULT_CHANGELOG_TABLE_NAME, DEFAULT_LOCK_TABLE_NAME};
pub use db::mask_url_password;
pub use discovery::{ChangeLog, ChangeLogRegistry, ChangeSetProvider};
pub use entry::ChangeEntry;
pub use error::PgbeeError;
pub use runner::Pgbee;
