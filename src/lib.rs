//! statelock: shared state storage with advisory locking.
//!
//! Many workspaces share one bucket in an object store. Each workspace's
//! state lives under its own key, and writers serialize through a lock file
//! whose check-then-write is guarded by a named mutex.
//!
//! The object store, the mutex service and the clock are injected as
//! capability traits ([`ObjectStoreClient`], [`NamedMutex`], [`Clock`]), so
//! the same [`StateManager`] runs against the local filesystem backends or
//! in-memory fakes.

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod locks;
pub mod logging;
pub mod mutex;
pub mod payload;
pub mod retry;
pub mod state;
pub mod store;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{LockError, LockFailure, Result, StateError};
pub use locks::{LockCoordinator, LockInfo, LockRecord};
pub use mutex::NamedMutex;
pub use payload::{Payload, PayloadStore};
pub use retry::{Clock, RetryPolicy, SystemClock};
pub use state::{StateHandle, StateManager};
pub use store::ObjectStoreClient;
pub use workspace::WorkspacePathResolver;
