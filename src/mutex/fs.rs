//! Named mutexes as marker files in a local directory.
//!
//! Markers are created with **create_new** semantics (exclusive create), so
//! two processes on the same host can never both create the same name.

use super::{MutexEntry, MutexError, NamedMutex};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const MARKER_EXTENSION: &str = "mutex";

/// Marker-file mutexes rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsNamedMutex {
    dir: PathBuf,
}

impl FsNamedMutex {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Marker ids are a digest of the name so any name maps to a valid filename.
    fn id_for(name: &str) -> String {
        format!("{:x}", md5::compute(name))
    }

    fn marker_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, MARKER_EXTENSION))
    }
}

fn transport(action: &str, path: &Path, e: io::Error) -> MutexError {
    MutexError::Transport(format!("failed to {} '{}': {}", action, path.display(), e))
}

/// Remove a half-written marker. A marker left behind blocks its name for
/// good, since it can no longer be found by name.
fn discard_marker(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove unwritten mutex marker");
    }
}

impl NamedMutex for FsNamedMutex {
    fn create(&self, name: &str) -> Result<String, MutexError> {
        fs::create_dir_all(&self.dir).map_err(|e| transport("create directory", &self.dir, e))?;

        let id = Self::id_for(name);
        let path = self.marker_path(&id);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    MutexError::AlreadyExists(name.to_string())
                } else {
                    transport("create", &path, e)
                }
            })?;

        if let Err(e) = file.write_all(name.as_bytes()) {
            discard_marker(&path);
            return Err(transport("write", &path, e));
        }

        Ok(id)
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<MutexEntry>, MutexError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| transport("read", &self.dir, e))?;

        let mut markers = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| transport("read", &self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MARKER_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // A marker may vanish between read_dir and read; skip it.
            let Ok(name) = fs::read_to_string(&path) else {
                continue;
            };
            markers.push(MutexEntry {
                id: id.to_string(),
                name,
            });
        }

        markers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(markers.into_iter().skip(offset).take(limit).collect())
    }

    fn delete(&self, id: &str) -> Result<(), MutexError> {
        let path = self.marker_path(id);
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MutexError::NotFound(id.to_string()),
            _ => transport("delete", &path, e),
        })
    }
}
