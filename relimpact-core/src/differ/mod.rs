//! Symbol diff engine for comparing API snapshots.
//!
//! Produces a categorized [`ChangeSet`] from two [`Snapshot`](crate::types::Snapshot)s:
//!
//! - **Packages** added or removed wholesale
//! - **Functions, variables, constants** added or removed per package
//! - **Types** added or removed per package
//! - **Fields and methods** added or removed per (package, type)
//!
//! Every removal is classified as breaking. Comparison is exact string
//! identity on the normalized signatures produced by the extractor.
//!
//! # Example
//!
//! ```
//! use relimpact_core::differ::{diff, Category, Direction};
//! use relimpact_core::types::{ApiUnit, Snapshot};
//!
//! let mut old = Snapshot::new();
//! old.insert("p", ApiUnit::new().with_function("Foo()"));
//! let mut new = Snapshot::new();
//! new.insert("p", ApiUnit::new().with_function("Foo()").with_function("Bar()"));
//!
//! let changes = diff(&old, &new);
//! assert_eq!(changes.count(Direction::Added, Category::Function), 1);
//! assert!(!changes.has_breaking_changes());
//! ```

pub mod changes;
pub mod symbols;

pub use changes::{Category, ChangeItem, ChangeSet, Direction, Scope, SummaryRow};
pub use symbols::diff;
