//! Object store capability consumed by the state client.
//!
//! The remote store is a flat namespace of `/`-separated keys holding byte
//! blobs. It offers no locking and no read-after-write guarantee; everything
//! above this layer is built to tolerate that.
//!
//! Two backends ship with the crate:
//! - [`FsObjectStore`]: one directory per bucket on the local filesystem
//! - [`MemoryObjectStore`]: in-process map with fault injection, for tests and embedding

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

use std::fmt;
use thiserror::Error;

/// Stage of the upload protocol at which a write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Initiate,
    Upload,
    Finish,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStage::Initiate => write!(f, "initiate"),
            UploadStage::Upload => write!(f, "upload"),
            UploadStage::Finish => write!(f, "finish"),
        }
    }
}

/// Errors reported by an [`ObjectStoreClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object '{0}' does not exist")]
    NotFound(String),

    /// Transport or server-side failure.
    #[error("{0}")]
    Transport(String),

    /// A write failed part-way through the upload protocol. The backend has
    /// already attempted to abort the partial object.
    #[error("error on {stage} of upload: {message}")]
    PartialUpload { stage: UploadStage, message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// One object returned from a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// A page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,

    /// Continuation token for the next page, `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// Byte-blob access to a remote key namespace.
///
/// Every call is a blocking remote request. Implementations decide whether
/// `store` is a one-shot put or a multi-step upload, but a failed upload must
/// not leave a partial object behind.
pub trait ObjectStoreClient: Send + Sync {
    /// Read the full object at `key`. A missing object is [`StoreError::NotFound`].
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite the object at `key`.
    fn store(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Delete the object at `key`.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List objects whose key starts with `prefix`, in key order.
    ///
    /// `token` is the `next_token` of the previous page; `page_size` bounds the
    /// number of entries returned.
    fn list_by_prefix(
        &self,
        prefix: &str,
        token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StoreError>;
}
