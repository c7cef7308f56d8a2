use crate::changeset::ChangeSet;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

/// Audit record proving a changeset was applied.
///
/// Entries are written exactly once per successful first execution and are
/// never updated or deleted by the runner. The `(changeset_id, author)` pair
/// is the uniqueness key the changelog table enforces.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub changeset_id: String,
    pub author: String,
    pub changelog_class: String,
    pub applied_at: DateTime<Utc>,
    pub custom_data: Option<Value>,
}

impl ChangeEntry {
    pub fn from_changeset(changeset: &ChangeSet) -> Self {
        Self {
            changeset_id: changeset.id.clone(),
            author: changeset.author.clone(),
            changelog_class: changeset.changelog.clone(),
            applied_at: Utc::now(),
            custom_data: changeset.custom_data.clone(),
        }
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "changeset [id: {}, author: {}, changelog: {}]",
            self.changeset_id, self.author, self.changelog_class
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeSetHandler;
    use serde_json::json;

    #[test]
    fn entry_carries_changeset_identity() {
        let cs = ChangeSet::new(
            "seed-roles",
            "bob",
            "010",
            ChangeSetHandler::no_args(|| async { Ok(()) }),
        )
        .custom_data(json!({"ticket": "OPS-112"}));

        let entry = ChangeEntry::from_changeset(&cs);
        assert_eq!(entry.changeset_id, "seed-roles");
        assert_eq!(entry.author, "bob");
        assert_eq!(entry.custom_data, Some(json!({"ticket": "OPS-112"})));
    }

    #[test]
    fn display_names_the_unit() {
        let cs = ChangeSet::new(
            "seed-roles",
            "bob",
            "010",
            ChangeSetHandler::no_args(|| async { Ok(()) }),
        );
        let mut entry = ChangeEntry::from_changeset(&cs);
        entry.changelog_class = "app.changelogs.Seed".to_string();
        assert_eq!(
            entry.to_string(),
            "changeset [id: seed-roles, author: bob, changelog: app.changelogs.Seed]"
        );
    }
}
