//! relimpact core - release impact analysis between two refs of a repository.
//!
//! This crate provides the comparison and aggregation engine behind the
//! `relimpact` CLI: it extracts the exported API of two working copies,
//! diffs them, summarizes documentation changes, classifies changed
//! auxiliary files and renders the result as a single report.
//!
//! # Features
//!
//! - **Symbol diff**: categorized added/removed API entities with breaking classification
//! - **Documentation diff**: headings, links, images and section word counts per markdown file
//! - **Auxiliary files**: changed config/script/data files grouped by extension
//! - **Concurrent pipeline**: fixed fan-out stages on the rayon pool, deterministic output
//! - **Extractors**: tree-sitter Go and Rust, or any external command
//! - **Snapshot cache**: extracted APIs memoized by commit
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use relimpact_core::extract::AutoExtractor;
//! use relimpact_core::pipeline::Pipeline;
//! use relimpact_core::report::ReportFormat;
//! # use relimpact_core::pipeline::{ChangeLister, WorkingCopyProvisioner};
//! # fn demo(
//! #     provisioner: impl WorkingCopyProvisioner + 'static,
//! #     lister: impl ChangeLister + 'static,
//! # ) -> relimpact_core::Result<()> {
//! let pipeline = Pipeline::new(provisioner, AutoExtractor, lister);
//! let markdown = pipeline.render(Path::new("."), "v1.0.0", "v1.1.0", ReportFormat::Markdown)?;
//! println!("{}", markdown);
//! # Ok(())
//! # }
//! ```

pub mod auxiliary;
pub mod cache;
pub mod differ;
pub mod docs;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod types;

pub use error::{RelimpactError, Result};
pub use pipeline::{ExecutionMode, Pipeline, PipelineOptions};
pub use report::{Report, ReportFormat};
pub use types::{ApiUnit, Snapshot, TypeKind, TypeShape};
