//! Lock information structures.

use super::metadata::LockRecord;

/// An active lock found on a workspace.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The workspace whose state is locked.
    pub workspace: String,

    /// Key of the lock file.
    pub lock_key: String,

    /// The record stored in the lock file.
    pub record: LockRecord,

    /// Whether the lock is older than the stale threshold.
    pub is_stale: bool,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (id: {}, who: {}, age: {}, operation: {}{})",
            self.workspace,
            self.record.id,
            self.record.who,
            self.record.age_string(),
            self.record.operation,
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
