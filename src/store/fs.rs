//! Filesystem-backed object store.
//!
//! Each bucket is a directory under the store root and each key maps to a
//! file path below it (`/` separates directories).
//!
//! # Upload Protocol
//!
//! Writes follow initiate → upload → finish:
//! 1. Initiate: create a uniquely named temporary file next to the target
//! 2. Upload: write the bytes and sync them to disk
//! 3. Finish: atomically rename the temporary file over the target
//!
//! A failure after initiate aborts the upload by removing the temporary file,
//! so readers never observe a partial object. An abort failure is logged and
//! the upload error is returned.

use super::{ListPage, ObjectEntry, ObjectStoreClient, StoreError, UploadStage};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Suffix of in-flight upload files; they are never listed as objects.
const UPLOAD_SUFFIX: &str = ".upload";

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    /// Open the bucket `bucket` under `root`. The directory is created lazily on first write.
    pub fn new<P: AsRef<Path>>(root: P, bucket: &str) -> Self {
        Self {
            bucket_dir: root.as_ref().join(bucket),
        }
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.bucket_dir.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::Transport(format!("invalid object key '{}'", key)));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn key_for_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.bucket_dir).ok()?;
        let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
        Some(segments?.join("/"))
    }

    /// Directory to start a listing from: the deepest directory `prefix` names.
    fn walk_root(&self, prefix: &str) -> PathBuf {
        let Some((dir, _)) = prefix.rsplit_once('/') else {
            return self.bucket_dir.clone();
        };
        match self.object_path(dir) {
            Ok(path) => path,
            Err(_) => self.bucket_dir.clone(),
        }
    }

    /// Write `data` to `key` through a sink created by `open` at the temporary path.
    fn store_with<W: UploadSink>(
        &self,
        key: &str,
        data: &[u8],
        open: impl FnOnce(&Path) -> io::Result<W>,
    ) -> Result<(), StoreError> {
        let path = self.object_path(key)?;

        let mut upload = Upload::initiate(&path, open).map_err(|e| StoreError::PartialUpload {
            stage: UploadStage::Initiate,
            message: e.to_string(),
        })?;

        if let Err(e) = upload.upload(data) {
            upload.abort();
            return Err(StoreError::PartialUpload {
                stage: UploadStage::Upload,
                message: e.to_string(),
            });
        }

        if let Err(e) = upload.finish() {
            upload.abort();
            return Err(StoreError::PartialUpload {
                stage: UploadStage::Finish,
                message: e.to_string(),
            });
        }

        debug!(key, bytes = data.len(), "stored object");
        Ok(())
    }
}

fn transport(action: &str, path: &Path, e: io::Error) -> StoreError {
    StoreError::Transport(format!("failed to {} '{}': {}", action, path.display(), e))
}

/// Whether keys under directory `dir_key` can start with `prefix`.
fn dir_may_match(dir_key: &str, prefix: &str) -> bool {
    let dir_prefix = format!("{}/", dir_key);
    dir_prefix.starts_with(prefix) || prefix.starts_with(&dir_prefix)
}

fn is_upload_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(UPLOAD_SUFFIX))
}

/// Destination of an upload's bytes.
trait UploadSink: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl UploadSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// An in-flight upload to a single object.
struct Upload<W> {
    target: PathBuf,
    temp: PathBuf,
    sink: W,
}

impl<W: UploadSink> Upload<W> {
    fn initiate(target: &Path, open: impl FnOnce(&Path) -> io::Result<W>) -> io::Result<Self> {
        let parent = target.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let filename = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid object path"))?;
        let temp = parent.join(format!(
            ".{}.{}{}",
            filename,
            uuid::Uuid::new_v4().simple(),
            UPLOAD_SUFFIX
        ));
        let sink = open(&temp)?;

        Ok(Self {
            target: target.to_path_buf(),
            temp,
            sink,
        })
    }

    fn upload(&mut self, data: &[u8]) -> io::Result<()> {
        self.sink.write_all(data)?;
        self.sink.sync()
    }

    fn finish(&self) -> io::Result<()> {
        fs::rename(&self.temp, &self.target)?;

        if let Some(parent) = self.target.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    fn abort(&self) {
        if let Err(e) = fs::remove_file(&self.temp)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.temp.display(), error = %e, "failed to abort upload");
        }
    }
}

impl ObjectStoreClient for FsObjectStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => transport("read", &path, e),
        })
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.store_with(key, data, |temp| File::create(temp))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => transport("delete", &path, e),
        })
    }

    fn list_by_prefix(
        &self,
        prefix: &str,
        token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StoreError> {
        let root = self.walk_root(prefix);
        if !root.is_dir() {
            return Ok(ListPage::default());
        }

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                !entry.file_type().is_dir()
                    || self
                        .key_for_path(entry.path())
                        .is_some_and(|key| dir_may_match(&key, prefix))
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                StoreError::Transport(format!("failed to list '{}': {}", root.display(), e))
            })?;

            if !entry.file_type().is_file() || is_upload_file(entry.path()) {
                continue;
            }

            let Some(key) = self.key_for_path(entry.path()) else {
                continue;
            };
            if !key.starts_with(prefix) || token.is_some_and(|marker| key.as_str() <= marker) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            entries.push(ObjectEntry { key, size });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let next_token = if entries.len() > page_size {
            entries.truncate(page_size);
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
