//! Snapshot cache keyed by state identifier.
//!
//! Symbol extraction is the most expensive stage of a run, so extracted
//! snapshots are memoized on disk. The key combines the extractor's cache
//! namespace with the commit identifier of the working copy: one extractor
//! always extracts the same snapshot from two checkouts of the same commit,
//! so entries are never invalidated.
//!
//! # Cache Format
//!
//! One JSON file per snapshot, named after the state identifier:
//!
//! ```text
//! <root>/
//!   go-v0.1.0-3f2a9c...e1.json
//!   rust-v0.1.0-77b0d4...9a.json
//! ```
//!
//! The cache is strictly best-effort. Unreadable or malformed entries are
//! misses, and failed writes are dropped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::Snapshot;

/// Directory name used under the system temp dir when no root is configured.
pub const DEFAULT_CACHE_DIR_NAME: &str = "relimpact-api-cache";

/// Internal cache failures. Never surfaced to callers.
#[derive(Error, Debug)]
enum CacheError {
    #[error("no entry for `{0}`")]
    Missing(String),

    #[error("invalid cache key `{0}`")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed entry: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// On-disk snapshot cache rooted at an explicit directory.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    root: PathBuf,
}

impl SnapshotCache {
    /// Create a cache rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted at `<tmp>/relimpact-api-cache`.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up the snapshot for `state_id`.
    ///
    /// Every failure (missing, unreadable, malformed) is reported as `None`.
    pub fn get(&self, state_id: &str) -> Option<Snapshot> {
        match self.try_get(state_id) {
            Ok(snapshot) => {
                tracing::debug!("Snapshot cache hit for {}", state_id);
                Some(snapshot)
            }
            Err(CacheError::Missing(_)) => {
                tracing::debug!("Snapshot cache miss for {}", state_id);
                None
            }
            Err(e) => {
                tracing::debug!("Ignoring unusable cache entry for {}: {}", state_id, e);
                None
            }
        }
    }

    /// Store `snapshot` under `state_id`.
    ///
    /// The entry is written to a temporary file in the cache directory and
    /// renamed into place, so concurrent readers never see a partial file.
    /// Failures are logged and otherwise ignored.
    pub fn put(&self, state_id: &str, snapshot: &Snapshot) {
        match self.try_put(state_id, snapshot) {
            Ok(path) => tracing::debug!("Cached snapshot at {:?}", path),
            Err(e) => tracing::debug!("Failed to cache snapshot for {}: {}", state_id, e),
        }
    }

    fn entry_path(&self, state_id: &str) -> Result<PathBuf, CacheError> {
        let valid = !state_id.is_empty()
            && !state_id.starts_with('.')
            && state_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(CacheError::InvalidKey(state_id.to_string()));
        }
        Ok(self.root.join(format!("{}.json", state_id)))
    }

    fn try_get(&self, state_id: &str) -> Result<Snapshot, CacheError> {
        let path = self.entry_path(state_id)?;
        if !path.exists() {
            return Err(CacheError::Missing(state_id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn try_put(&self, state_id: &str, snapshot: &Snapshot) -> Result<PathBuf, CacheError> {
        let path = self.entry_path(state_id)?;
        fs::create_dir_all(&self.root)?;

        let content = serde_json::to_vec_pretty(snapshot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&content)?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiUnit, TypeKind, TypeShape};
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "example.com/lib",
            ApiUnit::new()
                .with_function("Open(string) -> (*File, error)")
                .with_type("File", TypeShape::new(TypeKind::Struct).with_field("Name string")),
        );
        snapshot
    }

    #[test]
    fn test_cache_miss_on_empty_root() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("cache"));
        assert!(cache.get("abc123").is_none());
    }

    #[test]
    fn test_cache_put_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("cache"));
        let snapshot = sample_snapshot();

        cache.put("abc123", &snapshot);

        assert!(dir.path().join("cache/abc123.json").exists());
        assert_eq!(cache.get("abc123"), Some(snapshot));
        assert!(cache.get("def456").is_none());
    }

    #[test]
    fn test_cache_put_overwrites_entry() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.put("abc123", &Snapshot::new());
        cache.put("abc123", &sample_snapshot());

        assert_eq!(cache.get("abc123"), Some(sample_snapshot()));
        // Only the entry itself remains, no temp files
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_malformed_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("abc123.json"), "{ not json").unwrap();

        let cache = SnapshotCache::new(dir.path());
        assert!(cache.get("abc123").is_none());
    }

    #[test]
    fn test_unwritable_root_is_ignored() {
        let dir = TempDir::new().unwrap();
        // A regular file where the cache directory should be
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "file").unwrap();

        let cache = SnapshotCache::new(&blocker);
        cache.put("abc123", &sample_snapshot());
        assert!(cache.get("abc123").is_none());
    }

    #[test]
    fn test_invalid_keys_never_touch_disk() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.put("../escape", &sample_snapshot());
        cache.put("", &sample_snapshot());

        assert!(cache.get("../escape").is_none());
        assert!(!dir.path().join("../escape.json").exists());
        cache.put("..", &sample_snapshot());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_namespaced_keys_are_distinct_entries() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.put("go-v0.1.0-abc123", &sample_snapshot());

        assert_eq!(cache.get("go-v0.1.0-abc123"), Some(sample_snapshot()));
        assert!(cache.get("rust-v0.1.0-abc123").is_none());
        assert!(dir.path().join("go-v0.1.0-abc123.json").exists());
    }
}
