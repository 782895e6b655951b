//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "statelock.yaml";

/// Key prefix under which named workspaces live.
pub const DEFAULT_PREFIX: &str = "env:";

/// Configuration for a shared state bucket.
///
/// This struct represents the contents of `statelock.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Layout
    // =========================================================================
    /// Name of the bucket holding the state (required).
    pub bucket: String,

    /// Key of the default workspace's state object (required).
    pub key: String,

    /// Directory-like prefix under which named workspaces are stored.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Root directory of the local filesystem backend.
    #[serde(default = "default_store_root")]
    pub store_root: String,

    // =========================================================================
    // Retry settings
    // =========================================================================
    /// Pause between retried reads, and between attempts on a busy lock.
    #[serde(default = "default_fetch_poll_interval_ms")]
    pub fetch_poll_interval_ms: u64,

    /// How long failed reads keep being retried.
    #[serde(default = "default_fetch_deadline_ms")]
    pub fetch_deadline_ms: u64,

    /// How long to keep retrying a lock held by someone else (0 = fail at once).
    #[serde(default)]
    pub lock_timeout_ms: u64,

    // =========================================================================
    // Paging
    // =========================================================================
    /// Page size for object listings.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,

    /// Page size for mutex listings.
    #[serde(default = "default_mutex_page_size")]
    pub mutex_page_size: usize,

    // =========================================================================
    // Display
    // =========================================================================
    /// Minutes after which a lock is reported as stale.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u32,
}

// Default value functions for serde
fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}
fn default_store_root() -> String {
    ".statelock".to_string()
}
fn default_fetch_poll_interval_ms() -> u64 {
    500
}
fn default_fetch_deadline_ms() -> u64 {
    10_000
}
fn default_list_page_size() -> usize {
    20
}
fn default_mutex_page_size() -> usize {
    100
}
fn default_lock_stale_minutes() -> u32 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            key: String::new(),
            prefix: default_prefix(),
            store_root: default_store_root(),
            fetch_poll_interval_ms: default_fetch_poll_interval_ms(),
            fetch_deadline_ms: default_fetch_deadline_ms(),
            lock_timeout_ms: 0,
            list_page_size: default_list_page_size(),
            mutex_page_size: default_mutex_page_size(),
            lock_stale_minutes: default_lock_stale_minutes(),
        }
    }
}
