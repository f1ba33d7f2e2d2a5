//! Model file and reconciliation configuration.

use crate::uid::DEFAULT_MAX_UID_ATTEMPTS;

/// Configuration for loading, reconciling and writing a model.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the model file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the model file after every write.
    pub sync_on_write: bool,

    /// Number of random draws before UID generation gives up.
    pub max_uid_attempts: u32,

    /// Whether to remove model entities the binding no longer declares.
    pub prune_missing_entities: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            max_uid_attempts: DEFAULT_MAX_UID_ATTEMPTS,
            prune_missing_entities: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the model file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the model file on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the number of UID generation attempts.
    #[must_use]
    pub const fn max_uid_attempts(mut self, attempts: u32) -> Self {
        self.max_uid_attempts = attempts;
        self
    }

    /// Sets whether entities missing from the binding are removed.
    #[must_use]
    pub const fn prune_missing_entities(mut self, value: bool) -> Self {
        self.prune_missing_entities = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert!(!config.prune_missing_entities);
        assert_eq!(config.max_uid_attempts, DEFAULT_MAX_UID_ATTEMPTS);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_write(false)
            .prune_missing_entities(true)
            .max_uid_attempts(10);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_write);
        assert!(config.prune_missing_entities);
        assert_eq!(config.max_uid_attempts, 10);
    }
}
