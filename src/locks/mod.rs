//! Advisory locking for shared state.
//!
//! # Lock Files
//!
//! Each state object has a lock file at `{stateKey}.lock`. Whoever's record is
//! in the lock file holds the lock; no lock file means unlocked.
//!
//! # Lock Records
//!
//! Each lock file contains a JSON record:
//! - `id`: Opaque token the holder must present to unlock
//! - `operation`: What the holder is doing (init/apply/delete/...)
//! - `who`: The holder (e.g., `user@HOST`)
//! - `createdAt`: RFC3339 timestamp
//! - `path`: Location of the lock file
//! - `note`: Free-form text from the holder
//!
//! # Serialization
//!
//! The object store has no create-if-absent, so acquiring runs its
//! check-then-write inside a critical section guarded by a [`NamedMutex`].
//! See [`LockCoordinator`] for the protocol.
//!
//! [`NamedMutex`]: crate::mutex::NamedMutex

mod coordinator;
mod metadata;
mod types;


// Re-export public API
pub use coordinator::{LockCoordinator, MUTEX_PREFIX};
pub use metadata::LockRecord;
pub use types::LockInfo;
