use crate::changeset::Environment;
use crate::error::PgbeeError;
use std::time::Duration;

pub const DEFAULT_CHANGELOG_TABLE_NAME: &str = "dbchangelog";
pub const DEFAULT_LOCK_TABLE_NAME: &str = "pgbeelock";

const DEFAULT_LOCK_WAIT_TIME: Duration = Duration::from_secs(5 * 60);
const DEFAULT_LOCK_POLL_RATE: Duration = Duration::from_secs(10);

/// Runner configuration, constructed once via [`ConfigBuilder`] and immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master on/off switch. When false, `run()` returns immediately without
    /// touching the database.
    pub enabled: bool,
    /// Prefix selecting which registered changelog containers participate in
    /// the run. Required: a run with no scan target is a configuration error.
    pub changelogs_scan_target: Option<String>,
    /// Wait for the process lock instead of failing fast when another
    /// instance holds it.
    pub wait_for_lock: bool,
    /// Maximum time to wait for the lock when `wait_for_lock` is set.
    pub lock_wait_time: Duration,
    /// Cadence between lock acquisition attempts while waiting.
    pub lock_poll_rate: Duration,
    /// Turn a failed lock acquisition into a hard error instead of a clean
    /// no-op run.
    pub throw_exception_if_cannot_obtain_lock: bool,
    /// Changelog audit table. Changing this on an existing system makes all
    /// changesets look unapplied, so they will execute again.
    pub changelog_table_name: String,
    /// Process lock table.
    pub lock_table_name: String,
    /// Context handed to changesets declaring the two-argument shape.
    pub environment_context: Option<Environment>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            changelogs_scan_target: None,
            wait_for_lock: false,
            lock_wait_time: DEFAULT_LOCK_WAIT_TIME,
            lock_poll_rate: DEFAULT_LOCK_POLL_RATE,
            throw_exception_if_cannot_obtain_lock: false,
            changelog_table_name: DEFAULT_CHANGELOG_TABLE_NAME.to_string(),
            lock_table_name: DEFAULT_LOCK_TABLE_NAME.to_string(),
            environment_context: None,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub(crate) fn validate(&self) -> Result<(), PgbeeError> {
        match self.changelogs_scan_target.as_deref() {
            Some(target) if !target.trim().is_empty() => Ok(()),
            _ => Err(PgbeeError::Configuration(
                "scan target for changelogs is not set".to_string(),
            )),
        }
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn scan_target(mut self, target: impl Into<String>) -> Self {
        self.config.changelogs_scan_target = Some(target.into());
        self
    }

    pub fn wait_for_lock(mut self, wait: bool) -> Self {
        self.config.wait_for_lock = wait;
        self
    }

    pub fn lock_wait_time(mut self, wait_time: Duration) -> Self {
        self.config.lock_wait_time = wait_time;
        self
    }

    pub fn lock_poll_rate(mut self, poll_rate: Duration) -> Self {
        self.config.lock_poll_rate = poll_rate;
        self
    }

    pub fn throw_exception_if_cannot_obtain_lock(mut self, throw: bool) -> Self {
        self.config.throw_exception_if_cannot_obtain_lock = throw;
        self
    }

    pub fn changelog_table_name(mut self, name: impl Into<String>) -> Self {
        self.config.changelog_table_name = name.into();
        self
    }

    pub fn lock_table_name(mut self, name: impl Into<String>) -> Self {
        self.config.lock_table_name = name.into();
        self
    }

    pub fn environment_context(mut self, environment: Environment) -> Self {
        self.config.environment_context = Some(environment);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.enabled);
        assert!(config.changelogs_scan_target.is_none());
        assert!(!config.wait_for_lock);
        assert_eq!(config.lock_wait_time, Duration::from_secs(300));
        assert_eq!(config.lock_poll_rate, Duration::from_secs(10));
        assert!(!config.throw_exception_if_cannot_obtain_lock);
        assert_eq!(config.changelog_table_name, "dbchangelog");
        assert_eq!(config.lock_table_name, "pgbeelock");
    }

    #[test]
    fn builder_overrides() {
        let config = Config::builder()
            .scan_target("app.changelogs")
            .wait_for_lock(true)
            .lock_wait_time(Duration::from_secs(30))
            .lock_poll_rate(Duration::from_secs(1))
            .throw_exception_if_cannot_obtain_lock(true)
            .changelog_table_name("migration_history")
            .lock_table_name("migration_lock")
            .build();

        assert_eq!(
            config.changelogs_scan_target.as_deref(),
            Some("app.changelogs")
        );
        assert!(config.wait_for_lock);
        assert_eq!(config.lock_wait_time, Duration::from_secs(30));
        assert_eq!(config.lock_poll_rate, Duration::from_secs(1));
        assert!(config.throw_exception_if_cannot_obtain_lock);
        assert_eq!(config.changelog_table_name, "migration_history");
        assert_eq!(config.lock_table_name, "migration_lock");
    }

    #[test]
    fn validate_requires_scan_target() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, PgbeeError::Configuration(_)));

        let err = Config::builder()
            .scan_target("   ")
            .build()
            .validate()
            .unwrap_err();
        assert!(matches!(err, PgbeeError::Configuration(_)));

        assert!(
            Config::builder()
                .scan_target("app")
                .build()
                .validate()
                .is_ok()
        );
    }
}
