//! Lock records stored in lock files.

use crate::error::LockFailure;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The body of a lock file.
///
/// Field names are camelCase on write. The upper-case names used by other lock
/// writers (`ID`, `Operation`, `Info`, ...) are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// Opaque token identifying the holder; generated on acquire when empty.
    #[serde(alias = "ID")]
    pub id: String,

    /// The operation being performed under the lock (init/apply/delete/...).
    #[serde(alias = "Operation", default)]
    pub operation: String,

    /// Who holds the lock (e.g., `user@HOST`).
    #[serde(alias = "Who", default)]
    pub who: String,

    /// When the lock was requested (RFC3339).
    #[serde(alias = "Created")]
    pub created_at: DateTime<Utc>,

    /// Location of the lock file, filled in on acquire.
    #[serde(alias = "Path", default)]
    pub path: String,

    /// Free-form note from the holder.
    #[serde(alias = "Info", default)]
    pub note: String,
}

impl LockRecord {
    /// Create a lock request for `operation` held by the current user.
    pub fn new(operation: &str) -> Self {
        Self {
            id: String::new(),
            operation: operation.to_string(),
            who: get_owner_string(),
            created_at: Utc::now(),
            path: String::new(),
            note: String::new(),
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    /// Parse a lock record read from the lock file at `path`.
    pub fn from_json(data: &[u8], path: &str) -> Result<Self, LockFailure> {
        serde_json::from_slice(data).map_err(|source| LockFailure::Malformed {
            path: path.to_string(),
            source,
        })
    }

    /// Serialize the record as a lock-file body.
    pub fn to_json(&self) -> Result<Vec<u8>, LockFailure> {
        serde_json::to_vec_pretty(self).map_err(LockFailure::Encode)
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Check if the lock is stale based on the given threshold in minutes.
    pub fn is_stale(&self, stale_minutes: u32) -> bool {
        self.age().num_minutes() > stale_minutes as i64
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  ID:        {}", self.id)?;
        writeln!(f, "  Path:      {}", self.path)?;
        writeln!(f, "  Operation: {}", self.operation)?;
        writeln!(f, "  Who:       {}", self.who)?;
        writeln!(
            f,
            "  Created:   {} ({} ago)",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.age_string()
        )?;
        write!(f, "  Info:      {}", self.note)
    }
}

/// Get the owner string for lock records.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
