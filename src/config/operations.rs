//! Config loading, validation, and derived settings.

use super::model::Config;
use crate::error::{Result, StateError};
use crate::retry::RetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl Config {
    /// Create a config for `bucket` and `key` with every other field defaulted.
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Self::default()
        }
    }

    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(StateError::ConfigError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            StateError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| StateError::ConfigError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            StateError::ConfigError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `bucket` and `key` are required
    /// - `key` must not start with '/' (the store strips leading slashes, which
    ///   would break the workspace hierarchy)
    /// - `prefix` must not start or end with '/'
    /// - poll interval and page sizes must be positive
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(StateError::ConfigError("bucket is required".to_string()));
        }

        if self.key.is_empty() {
            return Err(StateError::ConfigError("key is required".to_string()));
        }
        if self.key.starts_with('/') {
            return Err(StateError::ConfigError(
                "key must not start with '/'".to_string(),
            ));
        }

        if self.prefix.starts_with('/') || self.prefix.ends_with('/') {
            return Err(StateError::ConfigError(
                "prefix must not start or end with '/'".to_string(),
            ));
        }

        if self.fetch_poll_interval_ms == 0 {
            return Err(StateError::ConfigError(
                "fetch_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.list_page_size == 0 || self.mutex_page_size == 0 {
            return Err(StateError::ConfigError(
                "list_page_size and mutex_page_size must be greater than 0".to_string(),
            ));
        }

        if self.lock_stale_minutes == 0 {
            return Err(StateError::ConfigError(
                "lock_stale_minutes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry policy for reads from the object store.
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.fetch_poll_interval_ms),
            Duration::from_millis(self.fetch_deadline_ms),
        )
    }

    /// Retry policy for acquiring a lock held by someone else.
    pub fn lock_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.fetch_poll_interval_ms),
            Duration::from_millis(self.lock_timeout_ms),
        )
    }

    /// Root of the local backend, resolved against `base` when relative.
    pub fn store_root_in(&self, base: &Path) -> PathBuf {
        let root = Path::new(&self.store_root);
        if root.is_absolute() {
            root.to_path_buf()
        } else {
            base.join(root)
        }
    }
}
