use crate::changeset::{ChangeSet, ChangeSetHandler, Environment};
use sqlx::PgPool;
use tracing::debug;

/// Why an invocation did not complete.
#[derive(Debug)]
pub(crate) enum InvocationFailure {
    /// Authoring mistake in the changeset declaration. Fatal: the run aborts
    /// (after releasing the lock) because the migration set itself is broken.
    Structural(String),
    /// The unit of work signalled a domain failure. Non-fatal: logged by the
    /// engine, the run continues with the next changeset.
    Business(anyhow::Error),
}

/// Dispatch a changeset to execution with the argument set matching its
/// declared shape.
pub(crate) async fn invoke(
    changeset: &ChangeSet,
    pool: &PgPool,
    environment: Option<&Environment>,
) -> Result<(), InvocationFailure> {
    match &changeset.handler {
        ChangeSetHandler::NoArgs(f) => {
            debug!("invoking changeset {} with no arguments", changeset.key());
            f().await.map_err(InvocationFailure::Business)
        }
        ChangeSetHandler::WithDb(f) => {
            debug!(
                "invoking changeset {} with the database handle",
                changeset.key()
            );
            f(pool.clone()).await.map_err(InvocationFailure::Business)
        }
        ChangeSetHandler::WithDbAndEnv(f) => {
            let Some(environment) = environment else {
                return Err(InvocationFailure::Structural(format!(
                    "changeset {} expects an environment context but none is configured",
                    changeset.key()
                )));
            };
            debug!(
                "invoking changeset {} with the database handle and environment",
                changeset.key()
            );
            f(pool.clone(), environment.clone())
                .await
                .map_err(InvocationFailure::Business)
        }
    }
}
