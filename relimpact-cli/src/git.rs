//! Git-backed collaborators for the release impact pipeline.

use std::path::{Path, PathBuf};
use std::process::Command;

use relimpact_core::pipeline::{ChangeLister, WorkingCopyProvisioner};
use relimpact_core::{RelimpactError, Result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// Run `git -C <dir> <args...>` and return its stdout.
fn git(dir: &Path, args: &[&str]) -> std::result::Result<String, GitError> {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output()?;

    if !output.status.success() {
        return Err(GitError::Failed {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Provisions detached `git worktree` checkouts in fresh temp directories.
#[derive(Debug, Clone, Default)]
pub struct GitWorktrees;

impl WorkingCopyProvisioner for GitWorktrees {
    fn checkout(&self, repo: &Path, git_ref: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("relimpact-")
            .tempdir()
            .map_err(|e| RelimpactError::provision(git_ref, e.to_string()))?;

        let dir_arg = dir.path().to_string_lossy().into_owned();
        git(repo, &["worktree", "add", "--detach", &dir_arg, git_ref])
            .map_err(|e| RelimpactError::provision(git_ref, e.to_string()))?;

        tracing::debug!("Checked out {} into {}", git_ref, dir.path().display());
        // The guard in the pipeline owns removal from here on.
        Ok(dir.keep())
    }

    fn cleanup(&self, repo: &Path, path: &Path) -> Result<()> {
        let path_arg = path.to_string_lossy().into_owned();
        let removed = git(repo, &["worktree", "remove", "--force", &path_arg]);

        let deleted = if path.exists() {
            std::fs::remove_dir_all(path)
        } else {
            Ok(())
        };

        // Drop the administrative entry even when the directory is stuck.
        if removed.is_err() || deleted.is_err() {
            if let Err(e) = git(repo, &["worktree", "prune"]) {
                tracing::debug!("git worktree prune failed: {}", e);
            }
        }

        removed.map_err(|e| RelimpactError::Io(std::io::Error::other(e.to_string())))?;
        deleted?;
        Ok(())
    }

    fn state_id(&self, path: &Path) -> Result<String> {
        let head = git(path, &["rev-parse", "HEAD"])
            .map_err(|e| RelimpactError::extraction(path, e.to_string()))?;
        Ok(head.trim().to_string())
    }
}

/// Lists changed files with `git diff --name-status -z`.
///
/// NUL-separated output keeps paths verbatim; without `-z` git quotes and
/// octal-escapes non-ASCII paths.
#[derive(Debug, Clone, Default)]
pub struct GitChangeLister;

impl ChangeLister for GitChangeLister {
    fn changed_paths(
        &self,
        repo: &Path,
        old_ref: &str,
        new_ref: &str,
    ) -> Result<Vec<(String, String)>> {
        let stdout = git(repo, &["diff", "--name-status", "-z", old_ref, new_ref])
            .map_err(|e| RelimpactError::change_list(old_ref, new_ref, e.to_string()))?;

        Ok(parse_name_status(&stdout))
    }
}

/// Parse `git diff --name-status -z` output into `(status, path)` pairs.
///
/// Records are `status NUL path NUL`; renames and copies carry a source and
/// a destination path, and the destination is kept.
fn parse_name_status(output: &str) -> Vec<(String, String)> {
    let mut fields = output.split('\0');
    let mut changes = Vec::new();

    while let Some(status) = fields.next() {
        if status.is_empty() {
            continue;
        }
        let path = if status.starts_with(['R', 'C']) {
            fields.next();
            fields.next()
        } else {
            fields.next()
        };
        match path {
            Some(path) if !path.is_empty() => changes.push((status.to_string(), path.to_string())),
            _ => break,
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_status() {
        let output = "M\0config/app.yaml\0A\0docs/new.md\0R087\0old/name.sql\0new/name.sql\0D\0caf\u{e9}.yaml\0";
        let parsed = parse_name_status(output);

        assert_eq!(
            parsed,
            vec![
                ("M".to_string(), "config/app.yaml".to_string()),
                ("A".to_string(), "docs/new.md".to_string()),
                ("R087".to_string(), "new/name.sql".to_string()),
                ("D".to_string(), "caf\u{e9}.yaml".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_name_status_stops_at_truncated_record() {
        assert!(parse_name_status("").is_empty());
        assert!(parse_name_status("M\0").is_empty());
        assert_eq!(parse_name_status("A\0a.sql\0R100\0old.sql\0").len(), 1);
    }

    #[test]
    fn test_change_list_keeps_non_ascii_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path();
        let run = |args: &[&str]| {
            let status = Command::new("git").arg("-C").arg(repo).args(args).status().unwrap();
            assert!(status.success(), "git {:?}", args);
        };
        run(&["init", "-q"]);
        run(&["config", "user.name", "Release Bot"]);
        run(&["config", "user.email", "release@example.com"]);
        run(&["config", "commit.gpgsign", "false"]);
        std::fs::write(repo.join("caf\u{e9}.yaml"), "a: 1\n").unwrap();
        run(&["add", "-A"]);
        run(&["commit", "-q", "-m", "v1"]);
        run(&["tag", "v1"]);
        std::fs::write(repo.join("caf\u{e9}.yaml"), "a: 2\n").unwrap();
        run(&["commit", "-q", "-a", "-m", "v2"]);
        run(&["tag", "v2"]);

        let changes = GitChangeLister.changed_paths(repo, "v1", "v2").unwrap();

        assert_eq!(changes, vec![("M".to_string(), "caf\u{e9}.yaml".to_string())]);
        let report = relimpact_core::auxiliary::classify(
            &changes,
            relimpact_core::auxiliary::DEFAULT_EXTENSIONS,
        );
        assert!(!report.is_empty());
    }

    #[test]
    fn test_cleanup_prunes_entry_when_directory_removal_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git").arg("-C").arg(&repo).args(args).status().unwrap();
            assert!(status.success(), "git {:?}", args);
        };
        run(&["init", "-q"]);
        run(&["config", "user.name", "Release Bot"]);
        run(&["config", "user.email", "release@example.com"]);
        run(&["config", "commit.gpgsign", "false"]);
        std::fs::write(repo.join("a.txt"), "a\n").unwrap();
        run(&["add", "-A"]);
        run(&["commit", "-q", "-m", "v1"]);

        let worktree = temp_dir.path().join("wt");
        run(&["worktree", "add", "--detach", &worktree.to_string_lossy(), "HEAD"]);
        // A regular file in place of the checkout: directory removal fails.
        std::fs::remove_dir_all(&worktree).unwrap();
        std::fs::write(&worktree, "not a directory").unwrap();

        let result = GitWorktrees.cleanup(&repo, &worktree);
        assert!(result.is_err());

        let list = Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(["worktree", "list", "--porcelain"])
            .output()
            .unwrap();
        let entries = String::from_utf8_lossy(&list.stdout)
            .lines()
            .filter(|l| l.starts_with("worktree "))
            .count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_change_list_outside_repo_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = GitChangeLister.changed_paths(temp_dir.path(), "v1", "v2");
        assert!(matches!(result, Err(RelimpactError::ChangeList { .. })));
    }

    #[test]
    fn test_checkout_unknown_ref_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = GitWorktrees.checkout(temp_dir.path(), "no-such-ref");
        assert!(matches!(result, Err(RelimpactError::Provision { .. })));
    }
}
