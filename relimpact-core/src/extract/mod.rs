//! Symbol extractors.
//!
//! Each extractor turns a working copy into a [`Snapshot`]. The Go and Rust
//! extractors are syntactic (tree-sitter); the command extractor delegates to
//! any toolchain that can print the snapshot JSON format.

pub mod command;
pub mod go;
mod helpers;
pub mod rust;

use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::SymbolExtractor;
use crate::types::Snapshot;

pub use command::CommandExtractor;
pub use go::GoExtractor;
pub use rust::RustExtractor;

/// Source language of the repository under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// Detect from the manifests at the working-copy root.
    #[default]
    Auto,
    Go,
    Rust,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Auto => "auto",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Language::Auto),
            "go" | "golang" => Ok(Language::Go),
            "rust" | "rs" => Ok(Language::Rust),
            _ => Err(format!("Unsupported language: {}", s)),
        }
    }
}

/// Picks Go or Rust per working copy from its root manifest.
#[derive(Debug, Clone, Default)]
pub struct AutoExtractor;

impl SymbolExtractor for AutoExtractor {
    fn extract(&self, dir: &Path) -> Result<Snapshot> {
        if dir.join("go.mod").is_file() {
            info!("Detected Go module");
            GoExtractor.extract(dir)
        } else if dir.join("Cargo.toml").is_file() {
            info!("Detected Cargo project");
            RustExtractor.extract(dir)
        } else {
            warn!(dir = %dir.display(), "No go.mod or Cargo.toml found, API section will be empty");
            Ok(Snapshot::new())
        }
    }

    fn cache_namespace(&self) -> String {
        versioned_namespace("auto")
    }
}

/// `<scheme>-v<crate version>`, so snapshots cached by an older build are
/// never served to a newer one.
pub(crate) fn versioned_namespace(scheme: &str) -> String {
    format!("{}-v{}", scheme, env!("CARGO_PKG_VERSION"))
}

/// Extractor for a configured language, or the external command when given.
pub fn extractor_for(language: Language, command: Option<&[String]>) -> Box<dyn SymbolExtractor> {
    if let Some(extractor) = command.and_then(CommandExtractor::from_argv) {
        return Box::new(extractor);
    }
    match language {
        Language::Auto => Box::new(AutoExtractor),
        Language::Go => Box::new(GoExtractor),
        Language::Rust => Box::new(RustExtractor),
    }
}
