//! Error types for statelock.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Lock errors carry the current holder's record whenever it can be read, so
//! every lock failure can say who holds the lock.

use crate::exit_codes;
use crate::locks::LockRecord;
use crate::mutex::MutexError;
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

/// Main error type for statelock operations.
#[derive(Error, Debug)]
pub enum StateError {
    /// User provided invalid arguments or asked for a forbidden operation.
    #[error("{0}")]
    UserError(String),

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// The default workspace is implicit and cannot be deleted.
    #[error("can't delete default state")]
    DefaultWorkspace,

    /// A non-retried object store request failed.
    #[error("failed to {action} '{key}': {source}")]
    Store {
        action: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    /// Reading an object kept failing until the retry deadline passed.
    #[error("failed to read '{key}' after {attempts} attempt(s): {source}")]
    TransientStore {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A write failed mid-protocol; the partial upload was aborted.
    #[error("failed to upload '{key}': {source}")]
    PartialUpload {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Lock acquisition, release, or inspection failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Releasing a lock failed, possibly after another failure. The lock may
    /// still be held and need a force-unlock.
    #[error("{}", stuck_lock_message(.lock_id, .primary.as_deref(), .unlock))]
    StuckLock {
        lock_id: String,
        primary: Option<Box<StateError>>,
        unlock: Box<StateError>,
    },
}

fn stuck_lock_message(lock_id: &str, primary: Option<&StateError>, unlock: &StateError) -> String {
    let mut msg = format!("Error unlocking state. Lock ID: {}\n\nError: {}\n", lock_id, unlock);
    if let Some(primary) = primary {
        msg.push_str(&format!("\nThe operation under the lock also failed: {}\n", primary));
    }
    msg.push_str("\nYou may have to force-unlock this state in order to use it again.");
    msg
}

impl StateError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            StateError::UserError(_)
            | StateError::ConfigError(_)
            | StateError::DefaultWorkspace => exit_codes::USER_ERROR,
            StateError::Store { .. }
            | StateError::TransientStore { .. }
            | StateError::PartialUpload { .. } => exit_codes::STORE_FAILURE,
            StateError::Lock(_) => exit_codes::LOCK_FAILURE,
            StateError::StuckLock { .. } => exit_codes::STUCK_LOCK,
        }
    }

    /// The lock error behind this error, if any.
    pub fn as_lock_error(&self) -> Option<&LockError> {
        match self {
            StateError::Lock(err) => Some(err),
            _ => None,
        }
    }
}

/// The specific reason a lock operation failed.
#[derive(Error, Debug)]
pub enum LockFailure {
    /// Another holder's lock file is present.
    #[error("lock file exists at {path}")]
    Conflict { path: String },

    /// The id given to unlock does not match the holder's id.
    #[error("lock ID {requested:?} does not match existing lock {held:?}")]
    Mismatch { requested: String, held: String },

    /// No lock file exists.
    #[error("lock file {path} does not exist")]
    NotFound { path: String },

    /// The serialization mutex could not be created.
    #[error("failed to create mutex '{name}': {source}")]
    MutexCreate {
        name: String,
        #[source]
        source: MutexError,
    },

    /// The serialization mutex could not be found or deleted.
    #[error("failed to release mutex '{name}': {source}")]
    MutexRelease {
        name: String,
        #[source]
        source: MutexError,
    },

    /// The lock file could not be read, written, or deleted.
    #[error("failed to {action} lock file at {path}: {source}")]
    Store {
        action: &'static str,
        path: String,
        #[source]
        source: Box<StateError>,
    },

    /// The lock file exists but is not a valid lock record.
    #[error("failed to parse lock file at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The lock record could not be serialized.
    #[error("failed to serialize lock record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl LockFailure {
    /// Whether retrying later could succeed because someone else holds the lock.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            LockFailure::Conflict { .. }
                | LockFailure::MutexCreate {
                    source: MutexError::AlreadyExists(_),
                    ..
                }
        )
    }
}

/// A lock failure enriched with the current holder and any secondary failures.
#[derive(Debug)]
pub struct LockError {
    /// What went wrong.
    pub failure: LockFailure,

    /// The lock record found at the lock path, if it could be read.
    pub holder: Option<LockRecord>,

    /// Further failures hit while cleaning up or diagnosing.
    pub secondary: Vec<LockFailure>,
}

impl LockError {
    pub fn new(failure: LockFailure) -> Self {
        Self {
            failure,
            holder: None,
            secondary: Vec::new(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.failure, LockFailure::Conflict { .. })
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self.failure, LockFailure::Mismatch { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.failure, LockFailure::NotFound { .. })
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state lock: {}", self.failure)?;
        for extra in &self.secondary {
            write!(f, "\n  also: {}", extra)?;
        }
        if let Some(holder) = &self.holder {
            write!(f, "\n\nLock Info:\n{}", holder)?;
        }
        Ok(())
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Result type alias for statelock operations.
pub type Result<T> = std::result::Result<T, StateError>;
