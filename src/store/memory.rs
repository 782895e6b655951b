//! In-process object store.

use super::{ListPage, ObjectEntry, ObjectStoreClient, StoreError};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

/// Object store held entirely in memory.
///
/// Shared between threads (wrap it in an `Arc`) it behaves like one remote
/// bucket seen by several processes. Faults queued with the `push_*_fault`
/// methods are returned, in order, by the next calls of that kind.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    fetch_faults: VecDeque<StoreError>,
    store_faults: VecDeque<StoreError>,
    delete_faults: VecDeque<StoreError>,
    writes: HashMap<String, usize>,
    fetches: usize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Seed an object without counting it as a write.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.lock().objects.insert(key.to_string(), data.into());
    }

    /// Current bytes at `key`, bypassing fault injection.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Number of successful `store` calls made for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.lock().writes.get(key).copied().unwrap_or(0)
    }

    /// Number of `fetch` calls made, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    pub fn push_fetch_fault(&self, err: StoreError) {
        self.lock().fetch_faults.push_back(err);
    }

    pub fn push_store_fault(&self, err: StoreError) {
        self.lock().store_faults.push_back(err);
    }

    pub fn push_delete_fault(&self, err: StoreError) {
        self.lock().delete_faults.push_back(err);
    }
}

impl ObjectStoreClient for MemoryObjectStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.lock();
        inner.fetches += 1;
        if let Some(err) = inner.fetch_faults.pop_front() {
            return Err(err);
        }
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.store_faults.pop_front() {
            return Err(err);
        }
        inner.objects.insert(key.to_string(), data.to_vec());
        *inner.writes.entry(key.to_string()).or_default() += 1;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.delete_faults.pop_front() {
            return Err(err);
        }
        match inner.objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn list_by_prefix(
        &self,
        prefix: &str,
        token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StoreError> {
        let inner = self.lock();
        let start = match token {
            Some(marker) => Bound::Excluded(marker.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut matching = inner
            .objects
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectEntry {
                key: key.clone(),
                size: data.len() as u64,
            });

        let entries: Vec<ObjectEntry> = matching.by_ref().take(page_size).collect();
        let next_token = if matching.next().is_some() {
            entries.last().map(|e| e.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            entries,
            next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_missing_is_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.fetch("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn queued_faults_are_returned_in_order() {
        let store = MemoryObjectStore::new();
        store.insert("a", "data");
        store.push_fetch_fault(StoreError::Transport("first".to_string()));
        store.push_fetch_fault(StoreError::Transport("second".to_string()));

        assert_eq!(
            store.fetch("a").unwrap_err(),
            StoreError::Transport("first".to_string())
        );
        assert_eq!(
            store.fetch("a").unwrap_err(),
            StoreError::Transport("second".to_string())
        );
        assert_eq!(store.fetch("a").unwrap(), b"data");
        assert_eq!(store.fetch_count(), 3);
    }

    #[test]
    fn list_pages_through_prefix() {
        let store = MemoryObjectStore::new();
        for key in ["env:/a/state", "env:/b/state", "env:/c/state", "other/x"] {
            store.insert(key, "x");
        }

        let first = store.list_by_prefix("env:/", None, 2).unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("env:/b/state"));

        let second = store
            .list_by_prefix("env:/", first.next_token.as_deref(), 2)
            .unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].key, "env:/c/state");
        assert!(second.next_token.is_none());
    }

    #[test]
    fn write_count_tracks_successful_stores() {
        let store = MemoryObjectStore::new();
        store.push_store_fault(StoreError::Transport("down".to_string()));

        assert!(store.store("k", b"1").is_err());
        store.store("k", b"2").unwrap();
        store.store("k", b"3").unwrap();

        assert_eq!(store.write_count("k"), 2);
        assert_eq!(store.get("k").unwrap(), b"3");
    }
}
