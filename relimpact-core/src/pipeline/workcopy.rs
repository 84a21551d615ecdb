//! Scoped working copies.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::collaborators::WorkingCopyProvisioner;
use crate::error::Result;

/// A provisioned working copy that is released when dropped.
///
/// Cleanup runs on every exit path: normal completion, an early `?` return
/// and unwinding panics alike. Cleanup failures are logged, never raised.
pub struct WorkingCopy<'a> {
    provisioner: &'a dyn WorkingCopyProvisioner,
    repo: &'a Path,
    git_ref: String,
    path: PathBuf,
}

impl<'a> WorkingCopy<'a> {
    pub fn provision(
        provisioner: &'a dyn WorkingCopyProvisioner,
        repo: &'a Path,
        git_ref: &str,
    ) -> Result<Self> {
        let path = provisioner.checkout(repo, git_ref)?;
        debug!(git_ref, path = %path.display(), "Provisioned working copy");
        Ok(Self {
            provisioner,
            repo,
            git_ref: git_ref.to_string(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }
}

impl Drop for WorkingCopy<'_> {
    fn drop(&mut self) {
        match self.provisioner.cleanup(self.repo, &self.path) {
            Ok(()) => debug!(git_ref = %self.git_ref, "Released working copy"),
            Err(err) => warn!(
                git_ref = %self.git_ref,
                path = %self.path.display(),
                error = %err,
                "Failed to clean up working copy"
            ),
        }
    }
}
