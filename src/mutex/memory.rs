//! In-process named mutexes.

use super::{MutexEntry, MutexError, NamedMutex};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Named-mutex service held in memory; `create` is atomic create-if-absent.
#[derive(Debug, Default)]
pub struct MemoryNamedMutex {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_id: BTreeMap<String, String>,
    next_id: u64,
    create_faults: VecDeque<MutexError>,
    list_faults: VecDeque<MutexError>,
    delete_faults: VecDeque<MutexError>,
}

impl MemoryNamedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Names of all resources currently held.
    pub fn names(&self) -> Vec<String> {
        self.lock().by_id.values().cloned().collect()
    }

    pub fn push_create_fault(&self, err: MutexError) {
        self.lock().create_faults.push_back(err);
    }

    pub fn push_list_fault(&self, err: MutexError) {
        self.lock().list_faults.push_back(err);
    }

    pub fn push_delete_fault(&self, err: MutexError) {
        self.lock().delete_faults.push_back(err);
    }
}

impl NamedMutex for MemoryNamedMutex {
    fn create(&self, name: &str) -> Result<String, MutexError> {
        let mut inner = self.lock();
        if let Some(err) = inner.create_faults.pop_front() {
            return Err(err);
        }
        if inner.by_id.values().any(|n| n == name) {
            return Err(MutexError::AlreadyExists(name.to_string()));
        }

        inner.next_id += 1;
        let id = format!("mutex-{:06}", inner.next_id);
        inner.by_id.insert(id.clone(), name.to_string());
        Ok(id)
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<MutexEntry>, MutexError> {
        let mut inner = self.lock();
        if let Some(err) = inner.list_faults.pop_front() {
            return Err(err);
        }
        Ok(inner
            .by_id
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(id, name)| MutexEntry {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    fn delete(&self, id: &str) -> Result<(), MutexError> {
        let mut inner = self.lock();
        if let Some(err) = inner.delete_faults.pop_front() {
            return Err(err);
        }
        inner
            .by_id
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MutexError::NotFound(id.to_string()))
    }
}
