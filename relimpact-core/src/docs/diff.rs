//! Per-file comparison of documentation trees.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::debug;

use super::summary::DocSummary;

/// Word-count change for one section key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum SectionChange {
    Changed {
        heading: String,
        old: usize,
        new: usize,
    },
    Removed {
        heading: String,
        words: usize,
    },
    Added {
        heading: String,
        words: usize,
    },
}

impl SectionChange {
    pub fn heading(&self) -> &str {
        match self {
            SectionChange::Changed { heading, .. }
            | SectionChange::Removed { heading, .. }
            | SectionChange::Added { heading, .. } => heading,
        }
    }
}

impl fmt::Display for SectionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionChange::Changed { heading, old, new } => {
                write!(f, "- Section `{}`: {} -> {} words", heading, old, new)
            }
            SectionChange::Removed { heading, words } => {
                write!(f, "- Section `{}`: REMOVED ({} words)", heading, words)
            }
            SectionChange::Added { heading, words } => {
                write!(f, "- Section `{}`: ADDED ({} words)", heading, words)
            }
        }
    }
}

/// Differences between two versions of one documentation file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocDiff {
    /// Path relative to the tree root, `/`-separated.
    pub file: String,
    pub headings_added: Vec<String>,
    pub headings_removed: Vec<String>,
    pub links_added: Vec<String>,
    pub links_removed: Vec<String>,
    pub images_added: Vec<String>,
    pub images_removed: Vec<String>,
    /// Sorted by heading.
    pub section_changes: Vec<SectionChange>,
}

impl DocDiff {
    pub fn is_empty(&self) -> bool {
        self.headings_added.is_empty()
            && self.headings_removed.is_empty()
            && self.links_added.is_empty()
            && self.links_removed.is_empty()
            && self.images_added.is_empty()
            && self.images_removed.is_empty()
            && self.section_changes.is_empty()
    }
}

/// Compare every markdown file found in either tree.
///
/// A file missing on one side is compared against an empty summary. Files
/// without any detectable change are omitted; the result is sorted by path.
pub fn diff_trees(old_dir: &Path, new_dir: &Path) -> Vec<DocDiff> {
    let mut files = collect_markdown_files(old_dir);
    files.extend(collect_markdown_files(new_dir));

    debug!(count = files.len(), "Comparing documentation files");

    files
        .into_iter()
        .filter_map(|file| {
            let old = DocSummary::from_file(&old_dir.join(&file));
            let new = DocSummary::from_file(&new_dir.join(&file));
            let diff = diff_summaries(&file, &old, &new);
            (!diff.is_empty()).then_some(diff)
        })
        .collect()
}

/// Compare two summaries of the same file.
pub fn diff_summaries(file: &str, old: &DocSummary, new: &DocSummary) -> DocDiff {
    let (headings_added, headings_removed) = diff_lists(&old.headings, &new.headings);
    let (links_added, links_removed) = diff_lists(&old.links, &new.links);
    let (images_added, images_removed) = diff_lists(&old.images, &new.images);

    let keys: BTreeSet<&String> = old
        .section_words
        .keys()
        .chain(new.section_words.keys())
        .collect();

    let section_changes = keys
        .into_iter()
        .filter_map(|heading| {
            match (old.section_words.get(heading), new.section_words.get(heading)) {
                (Some(&old), Some(&new)) if old != new => Some(SectionChange::Changed {
                    heading: heading.clone(),
                    old,
                    new,
                }),
                (Some(&words), None) => Some(SectionChange::Removed {
                    heading: heading.clone(),
                    words,
                }),
                (None, Some(&words)) => Some(SectionChange::Added {
                    heading: heading.clone(),
                    words,
                }),
                _ => None,
            }
        })
        .collect();

    DocDiff {
        file: file.to_string(),
        headings_added,
        headings_removed,
        links_added,
        links_removed,
        images_added,
        images_removed,
        section_changes,
    }
}

/// Set difference of two lists, each side sorted and deduplicated.
fn diff_lists(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();

    let added = new.difference(&old).map(|s| (*s).clone()).collect();
    let removed = old.difference(&new).map(|s| (*s).clone()).collect();
    (added, removed)
}

/// Relative `/`-separated paths of all `*.md` files under `root`.
///
/// Hidden and ignored files are included. Walk errors are skipped, so a
/// missing root yields nothing.
fn collect_markdown_files(root: &Path) -> BTreeSet<String> {
    let mut files = BTreeSet::new();

    let walker = WalkBuilder::new(root).standard_filters(false).build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable documentation entry");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if !entry.file_name().to_string_lossy().ends_with(".md") {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key);
        }
    }

    files
}
