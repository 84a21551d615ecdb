//! Extractor that delegates to an external program.
//!
//! The program runs inside the working copy and must print a JSON array of
//! units to stdout:
//!
//! ```json
//! [
//!   {"path": "example.com/m/net", "functions": ["Dial(string) -> (Conn, error)"],
//!    "types": {"Conn": {"kind": "interface", "methods": ["Close() -> (error)"]}}},
//!   {"path": "example.com/m/broken", "errors": ["net.go:3: syntax error"]}
//! ]
//! ```
//!
//! Units reporting errors are skipped; everything else is taken verbatim.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{RelimpactError, Result};
use crate::pipeline::SymbolExtractor;
use crate::types::{ApiUnit, Snapshot};

/// One unit as printed by the external program.
#[derive(Debug, Deserialize)]
struct CommandUnit {
    path: String,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(flatten)]
    api: ApiUnit,
}

/// Runs `program args...` in the working copy and parses its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list; `None` if it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl SymbolExtractor for CommandExtractor {
    fn extract(&self, dir: &Path) -> Result<Snapshot> {
        debug!(program = %self.program, dir = %dir.display(), "Running extractor command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .output()
            .map_err(|e| {
                RelimpactError::extraction(dir, format!("cannot run `{}`: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelimpactError::extraction(
                dir,
                format!("`{}` exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        parse_output(&output.stdout).map_err(|e| {
            RelimpactError::extraction(dir, format!("malformed output from `{}`: {}", self.program, e))
        })
    }

    /// `cmd-<xxh3 of argv>`: each distinct command line caches separately.
    fn cache_namespace(&self) -> String {
        let mut argv = self.program.clone();
        for arg in &self.args {
            argv.push('\0');
            argv.push_str(arg);
        }
        format!("cmd-{:016x}", xxh3_64(argv.as_bytes()))
    }
}

/// Parse the JSON unit list, dropping units that report errors.
fn parse_output(stdout: &[u8]) -> Result<Snapshot> {
    let units: Vec<CommandUnit> = serde_json::from_slice(stdout)?;

    Ok(units
        .into_iter()
        .filter_map(|unit| {
            if unit.errors.is_empty() {
                Some((unit.path, unit.api))
            } else {
                warn!(unit = %unit.path, errors = ?unit.errors, "Skipping unit with errors");
                None
            }
        })
        .collect())
}
