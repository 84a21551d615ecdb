//! Documentation diff engine.
//!
//! Markdown files are reduced to a [`DocSummary`] (headings, link and image
//! targets, per-section word counts) and the summaries of matching files in
//! two trees are compared. Files whose summaries are equivalent are dropped,
//! even if their bytes differ.

pub mod diff;
pub mod summary;

pub use diff::{diff_summaries, diff_trees, DocDiff, SectionChange};
pub use summary::{summarize, DocSummary, ROOT_SECTION};
