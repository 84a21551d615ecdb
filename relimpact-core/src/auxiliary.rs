//! Classification of changed non-code files.
//!
//! The changed-path list between two refs is filtered to an extension
//! allow-list and grouped by extension, then by action.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::pipeline::ChangeLister;

/// Extension key for paths whose file name contains no dot.
pub const NO_EXTENSION: &str = "(no extension)";

/// Extensions reported when no allow-list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".sh", ".sql", ".json", ".yaml", ".yml", ".conf", ".ini", ".txt", ".csv", ".toml",
];

/// What happened to a file between the two refs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuxAction {
    Added,
    Modified,
    Removed,
    Other,
}

impl AuxAction {
    /// Fixed rendering order.
    pub const ALL: [AuxAction; 4] = [
        AuxAction::Added,
        AuxAction::Modified,
        AuxAction::Removed,
        AuxAction::Other,
    ];

    /// Map a `--name-status` code. Only the first letter is significant, so
    /// scored codes such as `R100` land in `Other`.
    pub fn from_status(status: &str) -> Self {
        match status.chars().next() {
            Some('A') => AuxAction::Added,
            Some('M') => AuxAction::Modified,
            Some('D') => AuxAction::Removed,
            _ => AuxAction::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuxAction::Added => "Added",
            AuxAction::Modified => "Modified",
            AuxAction::Removed => "Removed",
            AuxAction::Other => "Other",
        }
    }
}

/// One classified change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuxiliaryChange {
    pub extension: String,
    pub action: AuxAction,
    pub path: String,
}

/// Changes grouped by extension, then action. Paths within a group are sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuxiliaryReport {
    pub groups: BTreeMap<String, BTreeMap<AuxAction, BTreeSet<String>>>,
}

impl AuxiliaryReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn insert(&mut self, change: AuxiliaryChange) {
        self.groups
            .entry(change.extension)
            .or_default()
            .entry(change.action)
            .or_default()
            .insert(change.path);
    }

    /// Paths for one extension and action, sorted.
    pub fn paths(&self, extension: &str, action: AuxAction) -> Vec<&str> {
        self.groups
            .get(extension)
            .and_then(|actions| actions.get(&action))
            .map(|paths| paths.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Flattened view in report order.
    pub fn changes(&self) -> Vec<AuxiliaryChange> {
        let mut out = Vec::new();
        for (extension, actions) in &self.groups {
            for action in AuxAction::ALL {
                if let Some(paths) = actions.get(&action) {
                    out.extend(paths.iter().map(|path| AuxiliaryChange {
                        extension: extension.clone(),
                        action,
                        path: path.clone(),
                    }));
                }
            }
        }
        out
    }
}

/// Extension of the final path component, from its last `.` inclusive.
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) => name[idx..].to_string(),
        None => NO_EXTENSION.to_string(),
    }
}

/// Classify `(status, path)` pairs, keeping only allow-listed extensions.
pub fn classify<S: AsRef<str>>(entries: &[(String, String)], allowed: &[S]) -> AuxiliaryReport {
    let allowed: BTreeSet<&str> = allowed.iter().map(AsRef::as_ref).collect();
    let mut report = AuxiliaryReport::default();

    for (status, path) in entries {
        let extension = extension_of(path);
        if !allowed.contains(extension.as_str()) {
            continue;
        }
        report.insert(AuxiliaryChange {
            extension,
            action: AuxAction::from_status(status),
            path: path.clone(),
        });
    }

    report
}

/// Retrieve the change list for `old_ref..new_ref` and classify it.
pub fn diff<S: AsRef<str>>(
    lister: &dyn ChangeLister,
    repo: &Path,
    old_ref: &str,
    new_ref: &str,
    allowed: &[S],
) -> Result<AuxiliaryReport> {
    let entries = lister.changed_paths(repo, old_ref, new_ref)?;
    debug!(entries = entries.len(), "Classifying changed files");
    Ok(classify(&entries, allowed))
}
