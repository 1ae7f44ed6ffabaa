//! Durable key-value persistence backing every file-based store.
//!
//! A [`JsonFileStore`] keeps its entries in a `BTreeMap` and persists the whole
//! map as one JSON object. Writes go to a temporary file in the same directory
//! which is then renamed over the target, so a concurrent reader sees either
//! the old file or the new one, never a torn write.
//!
//! ```text
//!   save()  ──► serialize ──► <dir>/.tmpXXXX ──► fsync ──► rename ──► <file>
//! ```
//!
//! The store is not internally synchronized; owners wrap it in a lock.

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::repository::{ErrorContext, RepositoryError, RepositoryResult};

/// Outcome of loading a store from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// File parsed; this many entries were loaded.
    Loaded(usize),
    /// No backing file yet; the store starts empty.
    Missing,
    /// File was unparsable; it was moved aside and the store starts empty.
    Corrupt { quarantined: Option<PathBuf> },
}

impl LoadStatus {
    pub fn entries(&self) -> usize {
        match self {
            LoadStatus::Loaded(n) => *n,
            _ => 0,
        }
    }
}

/// Result of merging one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Kept,
}

/// A JSON-object file mapping string keys to values of `V`.
#[derive(Debug)]
pub struct JsonFileStore<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
}

impl<V> JsonFileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Open the store at `path`, loading whatever is on disk.
    ///
    /// # Returns
    /// * `Ok((store, LoadStatus))` when the file was loaded, missing, or corrupt
    /// * `Err(RepositoryError)` when the file exists but cannot be read
    pub fn open(path: impl Into<PathBuf>) -> RepositoryResult<(Self, LoadStatus)> {
        let path = path.into();
        let (entries, status) = read_entries(&path)?;
        Ok((Self { path, entries }, status))
    }

    /// An empty store that will persist to `path` on the first save.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }

    /// Unconditionally set `key`. Returns the previous value, if any.
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    /// Insert `value` if `key` is absent, otherwise replace the stored value
    /// only when `should_replace(stored, incoming)` holds.
    pub fn merge<F>(&mut self, key: String, value: V, should_replace: F) -> MergeOutcome
    where
        F: FnOnce(&V, &V) -> bool,
    {
        match self.entries.get_mut(&key) {
            None => {
                self.entries.insert(key, value);
                MergeOutcome::Inserted
            }
            Some(stored) if should_replace(stored, &value) => {
                *stored = value;
                MergeOutcome::Replaced
            }
            Some(_) => MergeOutcome::Kept,
        }
    }

    /// Remove every entry matching `predicate`. Returns how many were removed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&String, &V) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|k, v| !predicate(k, v));
        before - self.entries.len()
    }

    /// Remove everything. Returns how many entries were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Persist the whole map to the backing file.
    pub fn save(&self) -> RepositoryResult<()> {
        self.write_to(&self.path)
            .map_err(|e| e.with_operation("save"))?;
        debug!("Saved {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    /// Write the current map to `dest` (same format as the backing file).
    pub fn write_to(&self, dest: &Path) -> RepositoryResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries).map_err(|e| {
            RepositoryError::serialization_with_context(
                e.to_string(),
                ErrorContext::new("write_to").with_path(dest),
            )
        })?;
        atomic_write(dest, &bytes)
    }

    /// Replace the in-memory map with the backing file's current content.
    pub fn reload(&mut self) -> RepositoryResult<LoadStatus> {
        let (entries, status) = read_entries(&self.path)?;
        self.entries = entries;
        Ok(status)
    }

    /// Load `src`, which must parse, and make it the new content of this store.
    ///
    /// The backing file is only replaced after `src` parsed successfully.
    pub fn replace_from(&mut self, src: &Path) -> RepositoryResult<usize> {
        let bytes = fs::read(src).map_err(|e| {
            RepositoryError::io_with_context(
                e.to_string(),
                ErrorContext::new("replace_from").with_path(src),
            )
        })?;
        let entries: BTreeMap<String, V> = serde_json::from_slice(&bytes).map_err(|e| {
            RepositoryError::serialization_with_context(
                e.to_string(),
                ErrorContext::new("replace_from").with_path(src),
            )
        })?;
        atomic_write(&self.path, &bytes)?;
        self.entries = entries;
        Ok(self.entries.len())
    }

    /// Size in bytes of the committed backing file (0 when absent).
    pub fn file_size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

fn read_entries<V: DeserializeOwned>(
    path: &Path,
) -> RepositoryResult<(BTreeMap<String, V>, LoadStatus)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No store file at {}, starting empty", path.display());
            return Ok((BTreeMap::new(), LoadStatus::Missing));
        }
        Err(e) => {
            return Err(RepositoryError::io_with_context(
                e.to_string(),
                ErrorContext::new("open").with_path(path),
            ))
        }
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok((BTreeMap::new(), LoadStatus::Missing));
    }

    match serde_json::from_slice::<BTreeMap<String, V>>(&bytes) {
        Ok(entries) => {
            info!("Loaded {} entries from {}", entries.len(), path.display());
            let n = entries.len();
            Ok((entries, LoadStatus::Loaded(n)))
        }
        Err(e) => {
            warn!("Store file {} is unparsable ({}), starting empty", path.display(), e);
            let quarantined = quarantine(path);
            Ok((BTreeMap::new(), LoadStatus::Corrupt { quarantined }))
        }
    }
}

/// Move an unparsable file aside so the next save does not destroy it.
fn quarantine(path: &Path) -> Option<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    let target = PathBuf::from(target);
    match fs::rename(path, &target) {
        Ok(()) => {
            warn!("Moved {} to {}", path.display(), target.display());
            Some(target)
        }
        Err(e) => {
            warn!("Could not move corrupt file {} aside: {}", path.display(), e);
            None
        }
    }
}

/// Write `bytes` to `dest` through a temporary file and an atomic rename.
pub fn atomic_write(dest: &Path, bytes: &[u8]) -> RepositoryResult<()> {
    let context = || ErrorContext::new("atomic_write").with_path(dest);
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .map_err(|e| RepositoryError::io_with_context(e.to_string(), context()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| RepositoryError::io_with_context(e.to_string(), context()))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| RepositoryError::io_with_context(e.to_string(), context()))?;
    tmp.persist(dest)
        .map_err(|e| RepositoryError::io_with_context(e.error.to_string(), context()))?;
    Ok(())
}

/// Copy `src` to `dest` atomically.
pub fn atomic_copy(src: &Path, dest: &Path) -> RepositoryResult<u64> {
    let bytes = fs::read(src).map_err(|e| {
        RepositoryError::io_with_context(e.to_string(), ErrorContext::new("copy").with_path(src))
    })?;
    atomic_write(dest, &bytes)?;
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let (store, status) = JsonFileStore::<u32>::open(dir.path().join("s.json")).unwrap();
        assert!(store.is_empty());
        assert_eq!(status, LoadStatus::Missing);
    }

    #[test]
    fn test_save_then_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/s.json");
        let mut store = JsonFileStore::<u32>::empty(&path);
        store.insert("a".into(), 1);
        store.insert("b".into(), 2);
        store.save().unwrap();

        let (reopened, status) = JsonFileStore::<u32>::open(&path).unwrap();
        assert_eq!(status, LoadStatus::Loaded(2));
        assert_eq!(reopened.get("b"), Some(&2));
    }

    #[test]
    fn test_corrupt_file_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, b"{not json").unwrap();

        let (store, status) = JsonFileStore::<u32>::open(&path).unwrap();
        assert!(store.is_empty());
        match status {
            LoadStatus::Corrupt { quarantined: Some(q) } => {
                assert!(q.exists());
                assert!(!path.exists());
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_merge_outcomes() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::<u32>::empty(dir.path().join("s.json"));
        assert_eq!(store.merge("k".into(), 5, |old, new| new > old), MergeOutcome::Inserted);
        assert_eq!(store.merge("k".into(), 3, |old, new| new > old), MergeOutcome::Kept);
        assert_eq!(store.merge("k".into(), 9, |old, new| new > old), MergeOutcome::Replaced);
        assert_eq!(store.get("k"), Some(&9));
    }

    #[test]
    fn test_remove_where_counts() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::<u32>::empty(dir.path().join("s.json"));
        for i in 0..10 {
            store.insert(format!("k{}", i), i);
        }
        assert_eq!(store.remove_where(|_, v| *v % 2 == 0), 5);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_replace_from_rejects_bad_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        let mut store = JsonFileStore::<u32>::empty(&path);
        store.insert("keep".into(), 1);
        store.save().unwrap();
        let before = fs::read(&path).unwrap();

        let bad = dir.path().join("bad.json");
        fs::write(&bad, b"[1,2").unwrap();
        assert!(store.replace_from(&bad).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.get("keep"), Some(&1));
    }
}
