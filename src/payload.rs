//! Retry-tolerant reads and writes of state documents.
//!
//! The backing store may briefly fail or lag behind recent writes, so reads
//! are retried on the configured [`RetryPolicy`]. A missing object is not an
//! error: it means "no state yet".

use crate::error::{Result, StateError};
use crate::retry::{Clock, RetryPolicy};
use crate::store::{ObjectStoreClient, StoreError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bytes of a state object with their locally computed MD5 digest.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Vec<u8>,
    pub md5: [u8; 16],
}

impl Payload {
    pub fn new(data: Vec<u8>) -> Self {
        let md5 = md5::compute(&data).0;
        Self { data, md5 }
    }

    /// Hex form of the digest.
    pub fn md5_hex(&self) -> String {
        self.md5.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.data.len())
            .field("md5", &self.md5_hex())
            .finish()
    }
}

/// Get/put/delete of documents keyed by object path.
#[derive(Clone)]
pub struct PayloadStore {
    client: Arc<dyn ObjectStoreClient>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl PayloadStore {
    pub fn new(
        client: Arc<dyn ObjectStoreClient>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            policy,
            clock,
        }
    }

    /// Read the object at `key`.
    ///
    /// Returns `Ok(None)` when the object does not exist. Other failures are
    /// retried until the policy's deadline and then surfaced as
    /// [`StateError::TransientStore`].
    pub fn fetch(&self, key: &str) -> Result<Option<Payload>> {
        let outcome = self.policy.run(
            self.clock.as_ref(),
            || match self.client.fetch(key) {
                Ok(data) => Ok(Some(data)),
                Err(StoreError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            |e| {
                debug!(key, error = %e, "fetch failed, retrying");
                true
            },
        );

        match outcome {
            Ok(Some(data)) => Ok(Some(Payload::new(data))),
            Ok(None) => Ok(None),
            Err((source, attempts)) => {
                warn!(key, attempts, error = %source, "giving up on fetch");
                Err(StateError::TransientStore {
                    key: key.to_string(),
                    attempts,
                    source,
                })
            }
        }
    }

    /// Create or overwrite the object at `key`.
    pub fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        self.client.store(key, data).map_err(|source| match source {
            StoreError::PartialUpload { .. } => StateError::PartialUpload {
                key: key.to_string(),
                source,
            },
            _ => StateError::Store {
                action: "upload",
                key: key.to_string(),
                source,
            },
        })
    }

    /// Delete the object at `key`. Deleting a missing object succeeds.
    pub fn remove(&self, key: &str) -> Result<()> {
        match self.client.delete(key) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                debug!(key, "object already absent");
                Ok(())
            }
            Err(source) => Err(StateError::Store {
                action: "delete",
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ManualClock;
    use crate::store::{MemoryObjectStore, UploadStage};
    use std::time::Duration;

    fn payloads(store: &Arc<MemoryObjectStore>) -> (PayloadStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let payloads = PayloadStore::new(
            store.clone(),
            RetryPolicy::new(Duration::from_millis(250), Duration::from_secs(5)),
            clock.clone(),
        );
        (payloads, clock)
    }

    #[test]
    fn fetch_missing_returns_none() {
        let store = Arc::new(MemoryObjectStore::new());
        let (payloads, _) = payloads(&store);

        assert!(payloads.fetch("env:/state").unwrap().is_none());
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn fetch_computes_md5() {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("state", "hello");
        let (payloads, _) = payloads(&store);

        let payload = payloads.fetch("state").unwrap().unwrap();
        assert_eq!(payload.data, b"hello");
        assert_eq!(payload.md5_hex(), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn fetch_survives_transient_failures_within_deadline() {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("state", "v1");
        for _ in 0..3 {
            store.push_fetch_fault(StoreError::Transport("503 slow down".to_string()));
        }
        let (payloads, clock) = payloads(&store);

        let payload = payloads.fetch("state").unwrap().unwrap();

        assert_eq!(payload.data, b"v1");
        assert_eq!(store.fetch_count(), 4);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(250); 3]);
    }

    #[test]
    fn fetch_gives_up_after_deadline() {
        let store = Arc::new(MemoryObjectStore::new());
        for _ in 0..100 {
            store.push_fetch_fault(StoreError::Transport("connection reset".to_string()));
        }
        let (payloads, _) = payloads(&store);

        let err = payloads.fetch("state").unwrap_err();

        match err {
            StateError::TransientStore { key, attempts, .. } => {
                assert_eq!(key, "state");
                // Attempts at t = 0, 250ms, ..., 5s.
                assert_eq!(attempts, 21);
            }
            other => panic!("expected TransientStore, got {:?}", other),
        }
    }

    #[test]
    fn store_maps_partial_upload() {
        let store = Arc::new(MemoryObjectStore::new());
        store.push_store_fault(StoreError::PartialUpload {
            stage: UploadStage::Upload,
            message: "broken pipe".to_string(),
        });
        let (payloads, _) = payloads(&store);

        let err = payloads.store("state", b"data").unwrap_err();
        assert!(matches!(err, StateError::PartialUpload { .. }));
        assert!(!store.contains("state"));
    }

    #[test]
    fn store_then_remove() {
        let store = Arc::new(MemoryObjectStore::new());
        let (payloads, _) = payloads(&store);

        payloads.store("state", b"data").unwrap();
        assert_eq!(store.get("state").unwrap(), b"data");

        payloads.remove("state").unwrap();
        assert!(!store.contains("state"));

        // Removing again is not an error.
        payloads.remove("state").unwrap();
    }
}
