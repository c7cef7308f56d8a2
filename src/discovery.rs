use crate::changeset::ChangeSet;
use crate::error::PgbeeError;
use std::collections::HashSet;

/// Source of the ordered changeset list for a run.
///
/// The engine does not care how changesets are declared; it consults the
/// provider once per run and consumes whatever descriptors come back. The
/// returned list must already be globally sorted by the `order` key and free
/// of duplicate `(id, author)` pairs.
pub trait ChangeSetProvider {
    fn discover(&self, scan_target: &str) -> Result<Vec<ChangeSet>, PgbeeError>;
}

/// A named grouping of changesets sharing a discovery namespace.
///
/// The name plays the role of a package path: the runner's scan target
/// selects containers by prefix, e.g. a target of `app.changelogs` matches
/// `app.changelogs.InitSchema`.
pub struct ChangeLog {
    name: String,
    changesets: Vec<ChangeSet>,
}

impl ChangeLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changesets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a changeset to this container, stamping it with the container
    /// identity recorded in the audit entry.
    pub fn changeset(mut self, mut changeset: ChangeSet) -> Self {
        changeset.changelog = self.name.clone();
        self.changesets.push(changeset);
        self
    }
}

/// Built-in [`ChangeSetProvider`] backed by explicit registration.
#[derive(Default)]
pub struct ChangeLogRegistry {
    changelogs: Vec<ChangeLog>,
}

impl ChangeLogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, changelog: ChangeLog) -> Self {
        self.changelogs.push(changelog);
        self
    }
}

impl ChangeSetProvider for ChangeLogRegistry {
    /// Returns every changeset of every container matching the scan target,
    /// globally sorted by the `order` key. The sort is stable, so changesets
    /// with equal keys keep their registration order.
    ///
    /// Fails before anything executes: with a configuration error when the
    /// scan target is empty, and with a changeset error when two descriptors
    /// share an `(id, author)` pair.
    fn discover(&self, scan_target: &str) -> Result<Vec<ChangeSet>, PgbeeError> {
        if scan_target.trim().is_empty() {
            return Err(PgbeeError::Configuration(
                "scan target for changelogs is not set".to_string(),
            ));
        }

        let mut changesets: Vec<ChangeSet> = self
            .changelogs
            .iter()
            .filter(|changelog| changelog.name.starts_with(scan_target))
            .flat_map(|changelog| changelog.changesets.iter().cloned())
            .collect();
        changesets.sort_by(|a, b| a.order.cmp(&b.order));

        let mut seen = HashSet::new();
        for changeset in &changesets {
            if !seen.insert((changeset.id.clone(), changeset.author.clone())) {
                return Err(PgbeeError::ChangeSet(format!(
                    "duplicate changeset found: {}",
                    changeset.key()
                )));
            }
        }

        Ok(changesets)
    }
}
