//! Tests for workspace state management.

use super::*;
use crate::error::LockError;
use crate::exit_codes;
use crate::mutex::{MemoryNamedMutex, MutexError};
use crate::retry::{ManualClock, SystemClock};
use crate::store::{ListPage, MemoryObjectStore, StoreError};
use std::thread;

struct Harness {
    store: Arc<MemoryObjectStore>,
    mutex: Arc<MemoryNamedMutex>,
    clock: Arc<ManualClock>,
    manager: StateManager,
}

fn config() -> Config {
    let mut config = Config::new("bucket", "state");
    config.fetch_poll_interval_ms = 100;
    config.fetch_deadline_ms = 1000;
    config
}

fn harness() -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    let mutex = Arc::new(MemoryNamedMutex::new());
    let clock = Arc::new(ManualClock::new());
    let manager = StateManager::new(&config(), store.clone(), mutex.clone(), clock.clone());
    Harness {
        store,
        mutex,
        clock,
        manager,
    }
}

fn lock_error(err: StateError) -> LockError {
    match err {
        StateError::Lock(e) => e,
        other => panic!("expected lock error, got {:?}", other),
    }
}

/// A bucket whose listing lags behind its writes.
struct StaleListing(Arc<MemoryObjectStore>);

impl ObjectStoreClient for StaleListing {
    fn fetch(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
        self.0.fetch(key)
    }

    fn store(&self, key: &str, data: &[u8]) -> std::result::Result<(), StoreError> {
        self.0.store(key, data)
    }

    fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
        self.0.delete(key)
    }

    fn list_by_prefix(
        &self,
        _prefix: &str,
        _token: Option<&str>,
        _page_size: usize,
    ) -> std::result::Result<ListPage, StoreError> {
        Ok(ListPage::default())
    }
}

#[test]
fn test_open_binds_keys() {
    let h = harness();

    let handle = h.manager.open("prod").unwrap();
    assert_eq!(handle.workspace, "prod");
    assert_eq!(handle.state_key, "env:/prod/state");
    assert_eq!(handle.lock_key, "env:/prod/state.lock");

    let default = h.manager.open(DEFAULT_WORKSPACE).unwrap();
    assert_eq!(default.state_key, "env:/state");
}

#[test]
fn test_open_rejects_bad_names() {
    let h = harness();

    assert!(matches!(h.manager.open(""), Err(StateError::UserError(_))));
    assert!(matches!(h.manager.open("a/b"), Err(StateError::UserError(_))));
}

#[test]
fn test_workspaces_lists_default_first() {
    let h = harness();
    h.store.insert("env:/b/state", "{}");
    h.store.insert("env:/a/state", "{}");
    h.store.insert("env:/state", "{}");

    assert_eq!(h.manager.workspaces().unwrap(), vec!["default", "a", "b"]);
}

#[test]
fn test_ensure_initialized_writes_empty_document_once() {
    let h = harness();

    let handle = h.manager.ensure_initialized("dev").unwrap();
    assert_eq!(h.store.write_count(&handle.state_key), 1);

    let doc: serde_json::Value =
        serde_json::from_slice(&h.store.get(&handle.state_key).unwrap()).unwrap();
    assert_eq!(doc["version"], DOCUMENT_VERSION);

    // Lock released and mutex gone.
    assert!(!h.store.contains(&handle.lock_key));
    assert!(h.mutex.names().is_empty());

    h.manager.ensure_initialized("dev").unwrap();
    assert_eq!(h.store.write_count(&handle.state_key), 1);
    assert_eq!(h.manager.workspaces().unwrap(), vec!["default", "dev"]);
}

#[test]
fn test_ensure_initialized_default_is_noop() {
    let h = harness();

    h.manager.ensure_initialized(DEFAULT_WORKSPACE).unwrap();

    assert!(h.store.keys().is_empty());
}

#[test]
fn test_ensure_initialized_rechecks_under_lock() {
    let store = Arc::new(MemoryObjectStore::new());
    let mutex = Arc::new(MemoryNamedMutex::new());
    let clock = Arc::new(ManualClock::new());
    let lagging = Arc::new(StaleListing(store.clone()));
    let manager = StateManager::new(&config(), lagging, mutex, clock);

    // The winner already wrote its document, but our listing cannot see it.
    store.insert("env:/race/state", "winner");

    manager.ensure_initialized("race").unwrap();

    assert_eq!(store.get("env:/race/state").unwrap(), b"winner");
    assert_eq!(store.write_count("env:/race/state"), 0);
    assert!(!store.contains("env:/race/state.lock"));
}

#[test]
fn test_concurrent_ensure_initialized_writes_one_document() {
    let store = Arc::new(MemoryObjectStore::new());
    let mutex = Arc::new(MemoryNamedMutex::new());
    let mut config = config();
    config.fetch_poll_interval_ms = 5;
    config.lock_timeout_ms = 5000;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = StateManager::new(
                &config,
                store.clone(),
                mutex.clone(),
                Arc::new(SystemClock),
            );
            thread::spawn(move || manager.ensure_initialized("shared"))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(store.write_count("env:/shared/state"), 1);
    assert!(!store.contains("env:/shared/state.lock"));
}

#[test]
fn test_ensure_initialized_fails_while_locked() {
    let h = harness();
    let holder = h.manager.lock("busy", &LockRecord::new("apply")).unwrap();

    // Hide the lock file from the listing so initialization is attempted.
    let lagging = StateManager::new(
        &config(),
        Arc::new(StaleListing(h.store.clone())),
        h.mutex.clone(),
        h.clock.clone(),
    );
    let err = lock_error(lagging.ensure_initialized("busy").unwrap_err());

    assert!(err.is_conflict());
    assert_eq!(err.holder.unwrap().id, holder);
    assert!(!h.store.contains("env:/busy/state"));
}

#[test]
fn test_delete_default_fails() {
    let h = harness();

    let err = h.manager.delete(DEFAULT_WORKSPACE).unwrap_err();

    assert!(matches!(err, StateError::DefaultWorkspace));
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn test_delete_removes_workspace_from_list() {
    let h = harness();
    h.manager.ensure_initialized("a").unwrap();
    h.manager.ensure_initialized("b").unwrap();

    h.manager.delete("a").unwrap();

    assert_eq!(h.manager.workspaces().unwrap(), vec!["default", "b"]);
    assert!(h.mutex.names().is_empty());
}

#[test]
fn test_delete_missing_workspace_is_ok() {
    let h = harness();

    h.manager.delete("ghost").unwrap();

    assert!(h.store.keys().is_empty());
}

#[test]
fn test_delete_while_locked_fails() {
    let h = harness();
    h.manager.ensure_initialized("a").unwrap();
    let holder = h.manager.lock("a", &LockRecord::new("apply")).unwrap();

    let err = lock_error(h.manager.delete("a").unwrap_err());

    assert!(err.is_conflict());
    assert_eq!(err.holder.unwrap().id, holder);
    assert!(h.store.contains("env:/a/state"));
}

#[test]
fn test_get_and_put() {
    let h = harness();

    assert!(h.manager.get("dev").unwrap().is_none());

    h.manager.put("dev", b"first").unwrap();
    h.manager.put("dev", b"second").unwrap();

    let payload = h.manager.get("dev").unwrap().unwrap();
    assert_eq!(payload.data, b"second");
    assert_eq!(payload.md5_hex(), format!("{:x}", md5::compute(b"second")));
}

#[test]
fn test_lock_unlock_and_info() {
    let h = harness();
    let id = h
        .manager
        .lock("dev", &LockRecord::new("apply").with_note("manual"))
        .unwrap();

    let record = h.manager.lock_info("dev").unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.note, "manual");
    assert_eq!(record.path, "bucket/env:/dev/state.lock");

    h.manager.unlock("dev", &id).unwrap();
    assert!(lock_error(h.manager.lock_info("dev").unwrap_err()).is_not_found());
}

#[test]
fn test_list_locks() {
    let h = harness();
    h.manager.ensure_initialized("a").unwrap();
    h.manager.ensure_initialized("b").unwrap();
    let id = h.manager.lock("b", &LockRecord::new("apply")).unwrap();

    let locks = h.manager.list_locks().unwrap();

    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].workspace, "b");
    assert_eq!(locks[0].lock_key, "env:/b/state.lock");
    assert_eq!(locks[0].record.id, id);
    assert!(!locks[0].is_stale);
}

#[test]
fn test_with_lock_releases_after_failed_operation() {
    let h = harness();
    let handle = h.manager.open("dev").unwrap();

    let err = h
        .manager
        .with_lock(&handle, "apply", || -> Result<()> {
            Err(StateError::UserError("boom".to_string()))
        })
        .unwrap_err();

    assert!(matches!(err, StateError::UserError(_)));
    assert!(!h.store.contains(&handle.lock_key));
}

#[test]
fn test_mutex_cleanup_failure_is_not_a_stuck_lock() {
    let h = harness();
    h.mutex
        .push_list_fault(MutexError::Transport("tag service down".to_string()));

    let handle = h.manager.ensure_initialized("dev").unwrap();

    assert_eq!(h.store.write_count(&handle.state_key), 1);
    assert!(!h.store.contains(&handle.lock_key));
}

#[test]
fn test_with_lock_reports_stuck_lock_on_release_failure() {
    let h = harness();
    let handle = h.manager.open("dev").unwrap();
    h.store
        .push_delete_fault(StoreError::Transport("access denied".to_string()));

    let err = h.manager.with_lock(&handle, "apply", || Ok(())).unwrap_err();

    match &err {
        StateError::StuckLock { primary, .. } => assert!(primary.is_none()),
        other => panic!("expected stuck lock, got {:?}", other),
    }
    assert_eq!(err.exit_code(), exit_codes::STUCK_LOCK);
    assert!(err.to_string().contains("access denied"));
    assert!(h.store.contains(&handle.lock_key));
}

#[test]
fn test_with_lock_aggregates_operation_and_release_failures() {
    let h = harness();
    let handle = h.manager.open("dev").unwrap();
    h.store
        .push_delete_fault(StoreError::Transport("access denied".to_string()));

    let err = h
        .manager
        .with_lock(&handle, "apply", || -> Result<()> {
            Err(StateError::UserError("apply failed".to_string()))
        })
        .unwrap_err();

    let msg = err.to_string();
    match err {
        StateError::StuckLock {
            lock_id, primary, ..
        } => {
            assert!(!lock_id.is_empty());
            assert!(matches!(primary.as_deref(), Some(StateError::UserError(_))));
        }
        other => panic!("expected stuck lock, got {:?}", other),
    }
    assert!(msg.contains("apply failed"));
    assert!(msg.contains("access denied"));
}
