//! Workspace state management.
//!
//! [`StateManager`] ties together key layout, payload reads and writes, and
//! locking to expose per-workspace operations: open, initialize, read, write,
//! delete, lock and unlock.
//!
//! # Initialization
//!
//! A named workspace only shows up in listings once an object exists under
//! it, so opening a new workspace writes an empty document. That write is
//! taken under the workspace lock and preceded by a re-read, so two
//! processes creating the same workspace write exactly one document.

mod document;

#[cfg(test)]
mod tests;

pub use document::{DOCUMENT_VERSION, empty_document};

use crate::config::Config;
use crate::error::{Result, StateError};
use crate::locks::{LockCoordinator, LockInfo, LockRecord};
use crate::mutex::NamedMutex;
use crate::payload::{Payload, PayloadStore};
use crate::retry::Clock;
use crate::store::ObjectStoreClient;
use crate::workspace::{DEFAULT_WORKSPACE, WorkspacePathResolver};
use std::sync::Arc;
use tracing::{debug, info};

/// Keys bound to one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateHandle {
    pub workspace: String,
    pub state_key: String,
    pub lock_key: String,
}

/// Per-workspace state operations over a shared bucket.
#[derive(Clone)]
pub struct StateManager {
    payloads: PayloadStore,
    locks: LockCoordinator,
    resolver: WorkspacePathResolver,
    lock_stale_minutes: u32,
}

impl StateManager {
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStoreClient>,
        mutex: Arc<dyn NamedMutex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let payloads = PayloadStore::new(store.clone(), config.fetch_policy(), clock.clone());
        let locks = LockCoordinator::new(
            payloads.clone(),
            mutex,
            &config.bucket,
            config.mutex_page_size,
            config.lock_policy(),
            clock,
        );
        let resolver =
            WorkspacePathResolver::new(store, &config.prefix, &config.key, config.list_page_size);

        Self {
            payloads,
            locks,
            resolver,
            lock_stale_minutes: config.lock_stale_minutes,
        }
    }

    /// Bind the state and lock keys for workspace `name`.
    pub fn open(&self, name: &str) -> Result<StateHandle> {
        WorkspacePathResolver::validate_name(name)?;
        Ok(StateHandle {
            workspace: name.to_string(),
            state_key: self.resolver.key_for(name),
            lock_key: self.resolver.lock_key_for(name),
        })
    }

    /// All workspaces, default first.
    pub fn workspaces(&self) -> Result<Vec<String>> {
        self.resolver.list()
    }

    /// Make sure workspace `name` exists, writing an empty document if needed.
    pub fn ensure_initialized(&self, name: &str) -> Result<StateHandle> {
        let handle = self.open(name)?;

        if self.workspaces()?.iter().any(|w| w == name) {
            debug!(workspace = name, "workspace already exists");
            return Ok(handle);
        }

        self.with_lock(&handle, "init", || {
            // Someone may have created it between the listing and our lock.
            if self.payloads.fetch(&handle.state_key)?.is_some() {
                debug!(workspace = name, "workspace created concurrently");
                return Ok(());
            }
            self.payloads.store(&handle.state_key, &empty_document())?;
            info!(workspace = name, key = %handle.state_key, "initialized workspace");
            Ok(())
        })?;

        Ok(handle)
    }

    /// Current state of workspace `name`, `None` if nothing was written yet.
    pub fn get(&self, name: &str) -> Result<Option<Payload>> {
        let handle = self.open(name)?;
        self.payloads.fetch(&handle.state_key)
    }

    /// Overwrite the state of workspace `name`.
    pub fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        let handle = self.open(name)?;
        self.payloads.store(&handle.state_key, data)
    }

    /// Delete workspace `name`. The default workspace cannot be deleted.
    ///
    /// The removal runs under the workspace lock, so it fails while another
    /// process holds the lock.
    pub fn delete(&self, name: &str) -> Result<()> {
        if name == DEFAULT_WORKSPACE {
            return Err(StateError::DefaultWorkspace);
        }
        let handle = self.open(name)?;

        self.with_lock(&handle, "delete", || self.payloads.remove(&handle.state_key))?;
        info!(workspace = name, "deleted workspace");
        Ok(())
    }

    /// Lock workspace `name`, returning the lock id.
    pub fn lock(&self, name: &str, info: &LockRecord) -> Result<String> {
        let handle = self.open(name)?;
        self.locks.acquire_with_retry(&handle.lock_key, info)
    }

    /// Unlock workspace `name`. Also used to force-unlock with another holder's id.
    pub fn unlock(&self, name: &str, lock_id: &str) -> Result<()> {
        let handle = self.open(name)?;
        self.locks.release(lock_id, &handle.lock_key)
    }

    /// Who holds the lock on workspace `name`.
    pub fn lock_info(&self, name: &str) -> Result<LockRecord> {
        let handle = self.open(name)?;
        self.locks.diagnose(&handle.lock_key)
    }

    /// Every workspace lock currently held.
    pub fn list_locks(&self) -> Result<Vec<LockInfo>> {
        let mut locks = Vec::new();

        for workspace in self.workspaces()? {
            let handle = self.open(&workspace)?;
            let record = match self.locks.diagnose(&handle.lock_key) {
                Ok(record) => record,
                Err(StateError::Lock(e)) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };

            let is_stale = record.is_stale(self.lock_stale_minutes);
            locks.push(LockInfo {
                workspace,
                lock_key: handle.lock_key,
                record,
                is_stale,
            });
        }

        Ok(locks)
    }

    /// Run `op` while holding the lock on `handle`.
    ///
    /// The lock is always released. If releasing fails the result is a
    /// [`StateError::StuckLock`] carrying both the unlock failure and, if `op`
    /// failed too, its error.
    pub fn with_lock<T>(
        &self,
        handle: &StateHandle,
        operation: &str,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let lock_id = self
            .locks
            .acquire_with_retry(&handle.lock_key, &LockRecord::new(operation))?;

        let outcome = op();

        match (outcome, self.locks.release(&lock_id, &handle.lock_key)) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(unlock)) => Err(StateError::StuckLock {
                lock_id,
                primary: None,
                unlock: Box::new(unlock),
            }),
            (Err(primary), Err(unlock)) => Err(StateError::StuckLock {
                lock_id,
                primary: Some(Box::new(primary)),
                unlock: Box::new(unlock),
            }),
        }
    }
}
