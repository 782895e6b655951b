//! Lock acquisition and release on top of the object store.
//!
//! The lock is a lock file next to the state object; its presence is the lock
//! state. The object store cannot create-if-absent, so the check-then-write of
//! the lock file runs inside a short critical section guarded by a named
//! mutex whose name is derived from the bucket and lock path:
//!
//! 1. Create the mutex (fails if another process is in the critical section)
//! 2. Read the lock file; if present, fail with a conflict naming the holder
//! 3. Otherwise write our lock record as the lock file
//! 4. Delete the mutex, whatever happened in 2-3
//!
//! The mutex never outlives an acquire; holding the lock means owning the
//! lock file.

use crate::error::{LockError, LockFailure, Result};
use crate::locks::metadata::{LockRecord, get_owner_string};
use crate::mutex::{MutexError, NamedMutex};
use crate::payload::PayloadStore;
use crate::retry::{Clock, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

/// Leading component of every mutex name.
pub const MUTEX_PREFIX: &str = "state-lock";

/// Acquires and releases advisory locks keyed by lock-file path.
#[derive(Clone)]
pub struct LockCoordinator {
    payloads: PayloadStore,
    mutex: Arc<dyn NamedMutex>,
    bucket: String,
    mutex_page_size: usize,
    busy_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl LockCoordinator {
    /// `busy_policy` governs [`acquire_with_retry`](Self::acquire_with_retry);
    /// plain [`acquire`](Self::acquire) never waits.
    pub fn new(
        payloads: PayloadStore,
        mutex: Arc<dyn NamedMutex>,
        bucket: &str,
        mutex_page_size: usize,
        busy_policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payloads,
            mutex,
            bucket: bucket.to_string(),
            mutex_page_size: mutex_page_size.max(1),
            busy_policy,
            clock,
        }
    }

    /// Name of the mutex guarding `lock_path`.
    pub fn mutex_name(&self, lock_path: &str) -> String {
        format!("{}:{}:{}", MUTEX_PREFIX, self.bucket, lock_path)
    }

    /// Human-readable location of the lock file, recorded in the lock record.
    pub fn lock_url(&self, lock_path: &str) -> String {
        format!("{}/{}", self.bucket, lock_path)
    }

    /// Acquire the lock at `lock_path`, returning the lock id.
    ///
    /// If `info.id` is empty a fresh id is generated. Fails with a conflict,
    /// carrying the holder's record, when a lock file already exists.
    pub fn acquire(&self, lock_path: &str, mut info: LockRecord) -> Result<String> {
        let name = self.mutex_name(lock_path);

        let mutex_id = match self.mutex.create(&name) {
            Ok(id) => id,
            Err(source) => {
                return Err(self
                    .lock_error(lock_path, LockFailure::MutexCreate { name, source })
                    .into());
            }
        };
        debug!(mutex = %name, "entered lock critical section");

        let outcome = self.write_lock_file(lock_path, &mut info);
        let released = self.mutex.delete(&mutex_id);

        match (outcome, released) {
            (Ok(()), Ok(())) => {
                debug!(lock_path, id = %info.id, "acquired lock");
                Ok(info.id)
            }
            (Ok(()), Err(source)) => {
                // The lock file is ours; release() clears the leftover mutex by name.
                warn!(mutex = %name, error = %source, "failed to delete mutex after locking");
                Ok(info.id)
            }
            (Err(mut err), released) => {
                if let Err(source) = released {
                    err.secondary.push(LockFailure::MutexRelease { name, source });
                }
                Err(err.into())
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but keeps retrying while the lock or
    /// its mutex is held by someone else, until the busy policy's deadline.
    pub fn acquire_with_retry(&self, lock_path: &str, info: &LockRecord) -> Result<String> {
        self.busy_policy
            .run(
                self.clock.as_ref(),
                || self.acquire(lock_path, info.clone()),
                |err| {
                    let busy = err.as_lock_error().is_some_and(|e| e.failure.is_busy());
                    if busy {
                        debug!(lock_path, "lock busy, waiting");
                    }
                    busy
                },
            )
            .map_err(|(err, _)| err)
    }

    /// The critical section: check for a lock file, write ours if absent.
    fn write_lock_file(
        &self,
        lock_path: &str,
        info: &mut LockRecord,
    ) -> std::result::Result<(), LockError> {
        let url = self.lock_url(lock_path);

        let existing = self.payloads.fetch(lock_path).map_err(|source| {
            LockError::new(LockFailure::Store {
                action: "read",
                path: url.clone(),
                source: Box::new(source),
            })
        })?;

        if let Some(payload) = existing {
            let mut err = LockError::new(LockFailure::Conflict { path: url.clone() });
            match LockRecord::from_json(&payload.data, &url) {
                Ok(holder) => err.holder = Some(holder),
                Err(failure) => err.secondary.push(failure),
            }
            return Err(err);
        }

        if info.id.is_empty() {
            info.id = uuid::Uuid::new_v4().to_string();
        }
        if info.who.is_empty() {
            info.who = get_owner_string();
        }
        info.path = url.clone();

        let body = info.to_json().map_err(LockError::new)?;
        self.payloads.store(lock_path, &body).map_err(|source| {
            self.lock_error(
                lock_path,
                LockFailure::Store {
                    action: "write",
                    path: url,
                    source: Box::new(source),
                },
            )
        })
    }

    /// Release the lock at `lock_path` held under `lock_id`.
    ///
    /// A mismatched id fails without touching anything. Supplying the id
    /// reported by a conflict is how an operator force-unlocks another holder.
    /// Clearing a leftover mutex afterwards is best-effort.
    pub fn release(&self, lock_id: &str, lock_path: &str) -> Result<()> {
        let url = self.lock_url(lock_path);

        let record = self.read_record(lock_path).map_err(LockError::new)?;
        let Some(record) = record else {
            return Err(LockError::new(LockFailure::NotFound { path: url }).into());
        };

        if record.id != lock_id {
            let mut err = LockError::new(LockFailure::Mismatch {
                requested: lock_id.to_string(),
                held: record.id.clone(),
            });
            err.holder = Some(record);
            return Err(err.into());
        }

        self.payloads.remove(lock_path).map_err(|source| {
            self.lock_error(
                lock_path,
                LockFailure::Store {
                    action: "delete",
                    path: url,
                    source: Box::new(source),
                },
            )
        })?;
        debug!(lock_path, id = lock_id, "released lock");

        // The lock file is gone, so the lock is released either way.
        if let Err(failure) = self.clear_mutex(lock_path) {
            warn!(lock_path, error = %failure, "released lock but could not clear its mutex");
        }
        Ok(())
    }

    /// Read the current holder of `lock_path`.
    pub fn diagnose(&self, lock_path: &str) -> Result<LockRecord> {
        match self.read_record(lock_path) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(LockError::new(LockFailure::NotFound {
                path: self.lock_url(lock_path),
            })
            .into()),
            Err(failure) => Err(LockError::new(failure).into()),
        }
    }

    fn read_record(&self, lock_path: &str) -> std::result::Result<Option<LockRecord>, LockFailure> {
        let url = self.lock_url(lock_path);
        let payload = self
            .payloads
            .fetch(lock_path)
            .map_err(|source| LockFailure::Store {
                action: "read",
                path: url.clone(),
                source: Box::new(source),
            })?;

        payload
            .map(|p| LockRecord::from_json(&p.data, &url))
            .transpose()
    }

    /// Wrap `failure`, attaching whoever currently holds `lock_path`.
    fn lock_error(&self, lock_path: &str, failure: LockFailure) -> LockError {
        let mut err = LockError::new(failure);
        match self.read_record(lock_path) {
            Ok(holder) => err.holder = holder,
            Err(diag) => err.secondary.push(diag),
        }
        err
    }

    /// Delete the mutex for `lock_path` if one is left over. Absence is fine.
    fn clear_mutex(&self, lock_path: &str) -> std::result::Result<(), LockFailure> {
        let name = self.mutex_name(lock_path);
        let release_failure = |source: MutexError| LockFailure::MutexRelease {
            name: name.clone(),
            source,
        };

        let Some(id) = self.find_mutex(&name).map_err(release_failure)? else {
            return Ok(());
        };

        match self.mutex.delete(&id) {
            Ok(()) => {
                warn!(mutex = %name, "deleted leftover mutex");
                Ok(())
            }
            Err(MutexError::NotFound(_)) => Ok(()),
            Err(source) => Err(release_failure(source)),
        }
    }

    /// Page through the mutex service looking for `name`.
    fn find_mutex(&self, name: &str) -> std::result::Result<Option<String>, MutexError> {
        let mut offset = 0;
        loop {
            let page = self.mutex.list(offset, self.mutex_page_size)?;
            if let Some(entry) = page.iter().find(|e| e.name == name) {
                return Ok(Some(entry.id.clone()));
            }
            if page.len() < self.mutex_page_size {
                return Ok(None);
            }
            offset += self.mutex_page_size;
        }
    }
}
