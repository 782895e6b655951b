//! Named-mutex capability used to serialize lock-file creation.
//!
//! A named mutex is an ephemeral resource in a control-plane service whose
//! only useful property is that creating it by name fails when the name is
//! already taken. The lock coordinator holds one for the short check-then-write
//! of a lock file and deletes it straight after; it is never the lock itself.
//!
//! The protocol is only as strong as `create`: it must be an atomic
//! create-if-absent. That property is assumed here, not verified.

mod fs;
mod memory;

pub use fs::FsNamedMutex;
pub use memory::MemoryNamedMutex;

use thiserror::Error;

/// Errors reported by a [`NamedMutex`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutexError {
    /// A resource with this name already exists.
    #[error("mutex '{0}' is already held")]
    AlreadyExists(String),

    /// No resource with this id (or name) exists.
    #[error("mutex '{0}' does not exist")]
    NotFound(String),

    /// Transport or server-side failure.
    #[error("{0}")]
    Transport(String),
}

/// One resource returned by [`NamedMutex::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexEntry {
    pub id: String,
    pub name: String,
}

/// Create/list/delete of named resources.
pub trait NamedMutex: Send + Sync {
    /// Create a resource called `name` and return its id.
    fn create(&self, name: &str) -> Result<String, MutexError>;

    /// List up to `limit` resources starting at `offset`, in a stable order.
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<MutexEntry>, MutexError>;

    /// Delete the resource with the given id.
    fn delete(&self, id: &str) -> Result<(), MutexError>;
}
