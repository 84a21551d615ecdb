//! Contracts for the external services a run depends on.
//!
//! Implementations must be shareable across worker threads: the pipeline
//! calls them from concurrent stages.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::Snapshot;

/// Materializes a ref of a repository as an isolated directory.
pub trait WorkingCopyProvisioner: Send + Sync {
    /// Create a working copy of `git_ref` and return its location.
    fn checkout(&self, repo: &Path, git_ref: &str) -> Result<PathBuf>;

    /// Release a working copy created by [`checkout`](Self::checkout).
    fn cleanup(&self, repo: &Path, path: &Path) -> Result<()>;

    /// Content-stable identifier of the checked-out state, used as cache key.
    fn state_id(&self, path: &Path) -> Result<String>;
}

/// Produces the exported API surface of a working copy.
pub trait SymbolExtractor: Send + Sync {
    fn extract(&self, dir: &Path) -> Result<Snapshot>;

    /// Identity of the extraction scheme, prefixed to snapshot cache keys.
    ///
    /// Two extractors may share a namespace only if they produce identical
    /// snapshots for every checkout. Must match `[A-Za-z0-9._-]+`.
    fn cache_namespace(&self) -> String;
}

/// Lists files changed between two refs as `(status, path)` pairs.
pub trait ChangeLister: Send + Sync {
    fn changed_paths(
        &self,
        repo: &Path,
        old_ref: &str,
        new_ref: &str,
    ) -> Result<Vec<(String, String)>>;
}

impl<T: SymbolExtractor + ?Sized> SymbolExtractor for Box<T> {
    fn extract(&self, dir: &Path) -> Result<Snapshot> {
        (**self).extract(dir)
    }

    fn cache_namespace(&self) -> String {
        (**self).cache_namespace()
    }
}
