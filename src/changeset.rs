use futures_util::future::BoxFuture;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type NoArgsFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type WithDbFn = Arc<dyn Fn(PgPool) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type WithDbAndEnvFn =
    Arc<dyn Fn(PgPool, Environment) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// The unit of work behind a changeset, tagged with its declared parameter
/// shape. The set of shapes is closed: anything else is rejected when the
/// changeset is declared, not at dispatch time.
#[derive(Clone)]
pub enum ChangeSetHandler {
    /// Invoked with no arguments.
    NoArgs(NoArgsFn),
    /// Invoked with the database handle.
    WithDb(WithDbFn),
    /// Invoked with the database handle and the configured environment
    /// context.
    WithDbAndEnv(WithDbAndEnvFn),
}

impl ChangeSetHandler {
    pub fn no_args<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::NoArgs(Arc::new(move || Box::pin(f())))
    }

    pub fn with_db<F, Fut>(f: F) -> Self
    where
        F: Fn(PgPool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::WithDb(Arc::new(move |pool| Box::pin(f(pool))))
    }

    pub fn with_db_and_env<F, Fut>(f: F) -> Self
    where
        F: Fn(PgPool, Environment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::WithDbAndEnv(Arc::new(move |pool, env| Box::pin(f(pool, env))))
    }
}

impl fmt::Debug for ChangeSetHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arity = match self {
            Self::NoArgs(_) => "no_args",
            Self::WithDb(_) => "with_db",
            Self::WithDbAndEnv(_) => "with_db_and_env",
        };
        f.debug_tuple("ChangeSetHandler").field(&arity).finish()
    }
}

/// A single named, ordered, idempotent unit of migration work.
///
/// Descriptors are ephemeral: they are rebuilt by discovery on every run.
/// The `(id, author)` pair is the logical identity used for idempotency
/// checks; `order` is the lexicographic sort key applied globally across all
/// changelog containers.
#[derive(Clone)]
pub struct ChangeSet {
    pub id: String,
    pub author: String,
    pub order: String,
    pub run_always: bool,
    /// Identity of the changelog container this changeset belongs to.
    /// Assigned when the changeset is registered with a [`ChangeLog`].
    ///
    /// [`ChangeLog`]: crate::discovery::ChangeLog
    pub changelog: String,
    pub custom_data: Option<Value>,
    pub handler: ChangeSetHandler,
}

impl ChangeSet {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        order: impl Into<String>,
        handler: ChangeSetHandler,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            order: order.into(),
            run_always: false,
            changelog: String::new(),
            custom_data: None,
            handler,
        }
    }

    /// Re-execute this changeset on every run regardless of prior
    /// application. No additional audit entry is written for re-runs.
    pub fn run_always(mut self, run_always: bool) -> Self {
        self.run_always = run_always;
        self
    }

    pub fn custom_data(mut self, custom_data: Value) -> Self {
        self.custom_data = Some(custom_data);
        self
    }

    pub fn is_run_always(&self) -> bool {
        self.run_always
    }

    /// Human-readable identity used in logs and error messages.
    pub fn key(&self) -> String {
        format!("{}:{}", self.id, self.author)
    }
}

impl fmt::Debug for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSet")
            .field("id", &self.id)
            .field("author", &self.author)
            .field("order", &self.order)
            .field("run_always", &self.run_always)
            .field("changelog", &self.changelog)
            .finish_non_exhaustive()
    }
}

/// Opaque key-value context handed through to changesets that declare the
/// two-argument shape. The runner never interprets its contents.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    properties: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
