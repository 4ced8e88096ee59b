//! Durable key-value storage for bucket blobs.
//!
//! The cache core only needs string keys and byte-blob values. [`FileStore`]
//! keeps one file per key in a cache directory; [`MemoryStore`] keeps blobs in
//! a map and is used for embedding and tests.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use docforge_common::ContentHash;

use crate::error::CacheError;

/// File extension for persisted bucket blobs.
const BUCKET_EXT: &str = "bucket";

/// A durable key-value store for serialized buckets.
///
/// Implementations must be safe to share between threads. Errors are
/// returned as-is; retrying is the implementation's own business.
pub trait DurableStore: Send + Sync {
    /// Returns `true` if a blob is stored under `key`.
    fn has(&self, key: &str) -> Result<bool, CacheError>;

    /// Loads the blob stored under `key`, or `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `blob` under `key`, replacing any previous blob.
    fn save(&self, key: &str, blob: &[u8]) -> Result<(), CacheError>;

    /// Lists every stored key, in ascending order.
    fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Removes the blob under `key`. Returns `true` if one existed.
    fn remove(&self, key: &str) -> Result<bool, CacheError>;
}

/// Directory-backed durable store.
///
/// Each key is stored at `<dir>/<xxh3(key)>.bucket`. The file starts with the
/// key itself (4-byte little-endian length + UTF-8 bytes) so that keys can be
/// listed and hash collisions detected, followed by the blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Root cache directory.
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Returns the root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        let name = ContentHash::from_bytes(key.as_bytes());
        self.dir.join(format!("{name}.{BUCKET_EXT}"))
    }

    /// Reads a framed file, returning the stored key and the blob.
    fn read_framed(path: &Path) -> Result<Option<(String, Vec<u8>)>, CacheError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Ok(split_frame(&raw).map(|(key, blob)| (key.to_string(), blob.to_vec())))
    }

    /// Reads only the key at the start of a framed file.
    ///
    /// The blob itself is never read. Missing files and malformed frames
    /// yield `None`.
    fn read_key(path: &Path) -> Result<Option<String>, CacheError> {
        let io_err = |e: std::io::Error| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        let file_len = file.metadata().map_err(io_err)?.len();

        let mut len_bytes = [0u8; 4];
        match file.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(io_err(e)),
        }
        let key_len = u64::from(u32::from_le_bytes(len_bytes));
        if key_len > file_len.saturating_sub(4) {
            return Ok(None);
        }

        let mut key = vec![0u8; key_len as usize];
        match file.read_exact(&mut key) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(io_err(e)),
        }
        Ok(String::from_utf8(key).ok())
    }

    /// Returns `true` if the file for `key` exists and is framed with `key`.
    fn holds_key(&self, key: &str) -> Result<bool, CacheError> {
        Ok(Self::read_key(&self.blob_path(key))?.as_deref() == Some(key))
    }
}

/// Splits a framed file into its key and blob, or `None` if malformed.
fn split_frame(raw: &[u8]) -> Option<(&str, &[u8])> {
    if raw.len() < 4 {
        return None;
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let key_len = u32::from_le_bytes(len_bytes) as usize;
    let key_end = 4usize.checked_add(key_len)?;
    if raw.len() < key_end {
        return None;
    }
    let key = std::str::from_utf8(&raw[4..key_end]).ok()?;
    Some((key, &raw[key_end..]))
}

impl DurableStore for FileStore {
    fn has(&self, key: &str) -> Result<bool, CacheError> {
        self.holds_key(key)
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match Self::read_framed(&self.blob_path(key))? {
            Some((stored_key, blob)) if stored_key == key => Ok(Some(blob)),
            // Malformed frames and hash collisions are misses.
            _ => Ok(None),
        }
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut output = Vec::with_capacity(4 + key.len() + blob.len());
        output.extend_from_slice(&(key.len() as u32).to_le_bytes());
        output.extend_from_slice(key.as_bytes());
        output.extend_from_slice(blob);

        // Write to a sibling temp file and rename so readers never see a torn blob.
        let path = self.blob_path(key);
        let tmp = path.with_extension(format!("{BUCKET_EXT}.tmp"));
        std::fs::write(&tmp, &output).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io { path, source: e })
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BUCKET_EXT) {
                continue;
            }
            if let Some(key) = Self::read_key(&path)? {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        // Leave a colliding key's file alone.
        if !self.holds_key(key)? {
            return Ok(false);
        }
        let path = self.blob_path(key);
        std::fs::remove_file(&path).map_err(|e| CacheError::Io { path, source: e })?;
        Ok(true)
    }
}

/// In-memory durable store.
///
/// Survives only as long as the value itself; useful for embedding the cache
/// in a single process and for tests that simulate several runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written blob behind.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DurableStore for MemoryStore {
    fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock().contains_key(key))
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.lock().get(key).cloned())
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), CacheError> {
        self.lock().insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(&dir.path().join("cache"));
        (dir, store)
    }

    #[test]
    fn file_store_save_and_load() {
        let (_dir, store) = make_store();
        store.save("v6_App\\Kernel", b"blob bytes").unwrap();
        assert!(store.has("v6_App\\Kernel").unwrap());
        assert_eq!(
            store.load("v6_App\\Kernel").unwrap().as_deref(),
            Some(b"blob bytes".as_slice())
        );
    }

    #[test]
    fn file_store_missing_key() {
        let (_dir, store) = make_store();
        assert!(!store.has("nope").unwrap());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn file_store_overwrite() {
        let (_dir, store) = make_store();
        store.save("k", b"one").unwrap();
        store.save("k", b"two").unwrap();
        assert_eq!(store.load("k").unwrap().unwrap(), b"two");
        assert_eq!(store.keys().unwrap(), vec!["k"]);
    }

    #[test]
    fn file_store_keys_sorted_and_ignores_other_files() {
        let (_dir, store) = make_store();
        store.save("v6_B", b"b").unwrap();
        store.save("v6_A", b"a").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "hi").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["v6_A", "v6_B"]);
    }

    #[test]
    fn file_store_keys_of_missing_dir_is_empty() {
        let (_dir, store) = make_store();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn file_store_remove() {
        let (_dir, store) = make_store();
        store.save("k", b"x").unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(store.load("k").unwrap().is_none());
    }

    #[test]
    fn file_store_malformed_file_is_miss() {
        let (_dir, store) = make_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.blob_path("k"), [0xff, 0xff, 0xff, 0xff, 1]).unwrap();
        assert!(store.load("k").unwrap().is_none());
    }

    #[test]
    fn file_store_malformed_file_is_skipped_by_listing() {
        let (_dir, store) = make_store();
        store.save("v6_A", b"a").unwrap();
        std::fs::write(store.blob_path("k"), [0xff, 0xff, 0xff, 0xff, 1]).unwrap();
        std::fs::write(store.dir().join("short.bucket"), [2, 0]).unwrap();
        assert!(!store.has("k").unwrap());
        assert_eq!(store.keys().unwrap(), vec!["v6_A"]);
    }

    #[test]
    fn file_store_lists_and_removes_large_blobs_by_key() {
        let (_dir, store) = make_store();
        let blob = vec![7u8; 4 * 1024 * 1024];
        store.save("v6_Big", &blob).unwrap();
        store.save("v5_Big", b"small").unwrap();

        assert_eq!(
            FileStore::read_key(&store.blob_path("v6_Big")).unwrap().as_deref(),
            Some("v6_Big")
        );
        assert_eq!(store.keys().unwrap(), vec!["v5_Big", "v6_Big"]);
        assert!(store.has("v6_Big").unwrap());
        assert!(store.remove("v6_Big").unwrap());
        assert!(!store.blob_path("v6_Big").exists());
        assert_eq!(store.keys().unwrap(), vec!["v5_Big"]);
    }

    #[test]
    fn file_store_remove_leaves_colliding_key_alone() {
        let (_dir, store) = make_store();
        store.save("other", b"x").unwrap();
        // Put the frame of "other" where "k" would live.
        std::fs::rename(store.blob_path("other"), store.blob_path("k")).unwrap();

        assert!(!store.has("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(store.blob_path("k").exists());
        assert_eq!(store.keys().unwrap(), vec!["other"]);
    }

    #[test]
    fn file_store_no_temp_files_left() {
        let (_dir, store) = make_store();
        store.save("k", b"x").unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(!store.has("k").unwrap());
        store.save("k", b"v").unwrap();
        assert!(store.has("k").unwrap());
        assert_eq!(store.load("k").unwrap().unwrap(), b"v");
        assert_eq!(store.keys().unwrap(), vec!["k"]);
        assert!(store.remove("k").unwrap());
        assert!(!store.has("k").unwrap());
    }
}
