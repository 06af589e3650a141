//! FileAdapter - one JSON file per collection in a directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{AdapterError, StorageAdapter};
use crate::Document;

/// Persists each collection as `<dir>/<name>.json`.
///
/// Writes go to a temporary sibling file that is renamed over the target,
/// so a reader never observes a half-written set.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    dir: PathBuf,
}

impl FileAdapter {
    /// Use `dir` as the data directory, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| AdapterError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(name)))
    }
}

// Collection names are arbitrary strings; keep them inside the directory.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl StorageAdapter for FileAdapter {
    fn get(&self, name: &str) -> Result<Vec<Document>, AdapterError> {
        let bytes = match fs::read(self.path_for(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AdapterError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes).map_err(|e| AdapterError::Serde(e.to_string()))
    }

    fn set(&self, name: &str, documents: Vec<Document>) -> Result<(), AdapterError> {
        let bytes =
            serde_json::to_vec(&documents).map_err(|e| AdapterError::Serde(e.to_string()))?;
        let path = self.path_for(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| AdapterError::Io(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| AdapterError::Io(e.to_string()))
    }

    fn del(&self, name: &str) -> Result<(), AdapterError> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AdapterError::Io(e.to_string())),
        }
    }
}
