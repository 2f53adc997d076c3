//! Firmware Blob Store
//!
//! Binaries live at `{base_dir}/{type}/{version}/firmware.bin`. Writes go to a
//! temporary sibling first and are renamed into place, so readers see either
//! the previous binary or the complete new one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

const BLOB_FILE_NAME: &str = "firmware.bin";

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_dir: PathBuf,
}

impl BlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding everything stored for one version
    pub fn dir(&self, artifact_type: &str, version: &str) -> PathBuf {
        self.base_dir.join(artifact_type).join(version)
    }

    pub fn path(&self, artifact_type: &str, version: &str) -> PathBuf {
        self.dir(artifact_type, version).join(BLOB_FILE_NAME)
    }

    pub fn exists(&self, artifact_type: &str, version: &str) -> bool {
        self.path(artifact_type, version).is_file()
    }

    /// Atomically replace the binary for `(artifact_type, version)`.
    pub fn write(&self, artifact_type: &str, version: &str, data: &[u8]) -> Result<PathBuf, BlobError> {
        let dir = self.dir(artifact_type, version);
        fs::create_dir_all(&dir)?;

        let dest = dir.join(BLOB_FILE_NAME);
        // Unique per writer so concurrent uploads never share a temp file
        let tmp = dir.join(format!(".{}.{}.tmp", BLOB_FILE_NAME, Uuid::new_v4()));

        if let Err(e) = write_and_rename(&tmp, &dest, data) {
            fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(dest)
    }

    pub fn open(&self, artifact_type: &str, version: &str) -> Result<File, BlobError> {
        let path = self.path(artifact_type, version);
        File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BlobError::NotFound(path)
            } else {
                BlobError::Io(e)
            }
        })
    }

    /// Delete the whole per-version directory. Missing directories are fine.
    pub fn remove(&self, artifact_type: &str, version: &str) -> Result<(), BlobError> {
        match fs::remove_dir_all(self.dir(artifact_type, version)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_and_rename(tmp: &Path, dest: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn read_all(store: &BlobStore, t: &str, v: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        store.open(t, v).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_layout_is_derived_from_key() {
        let store = BlobStore::new("/data/firmware");
        assert_eq!(
            store.path("gateway", "2.0.1"),
            PathBuf::from("/data/firmware/gateway/2.0.1/firmware.bin")
        );
        assert_eq!(store.dir("gateway", "2.0.1"), PathBuf::from("/data/firmware/gateway/2.0.1"));
    }

    #[test]
    fn test_write_then_overwrite() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        store.write("gateway", "1.0.0", b"first").unwrap();
        assert_eq!(read_all(&store, "gateway", "1.0.0"), b"first");

        store.write("gateway", "1.0.0", b"second payload").unwrap();
        assert_eq!(read_all(&store, "gateway", "1.0.0"), b"second payload");

        // Only the final file remains, no temp siblings
        assert_eq!(dir_entries(&store.dir("gateway", "1.0.0")), vec!["firmware.bin"]);
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        assert!(matches!(store.open("gateway", "9.9.9"), Err(BlobError::NotFound(_))));
    }

    #[test]
    fn test_remove_deletes_version_dir() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.write("gateway", "1.0.0", b"a").unwrap();
        store.write("gateway", "1.1.0", b"b").unwrap();

        store.remove("gateway", "1.0.0").unwrap();
        assert!(!store.dir("gateway", "1.0.0").exists());
        assert!(store.exists("gateway", "1.1.0"));

        // Removing again is not an error
        store.remove("gateway", "1.0.0").unwrap();
    }

    #[test]
    fn test_concurrent_writers_leave_one_complete_payload() {
        let dir = tempdir().unwrap();
        let store = Arc::new(BlobStore::new(dir.path()));
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 64 * 1024]).collect();

        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.write("gateway", "3.0.0", &payload).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = read_all(&store, "gateway", "3.0.0");
        assert!(payloads.contains(&stored));
        assert_eq!(dir_entries(&store.dir("gateway", "3.0.0")), vec!["firmware.bin"]);
    }
}
