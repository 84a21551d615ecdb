//! Configuration file support for relimpact.
//!
//! Loads configuration from `.relimpact.toml` in the repository root, or from
//! an explicit path given with `--config`.
//!
//! # Example configuration
//!
//! ```toml
//! [auxiliary]
//! extensions = [".yaml", ".sql"]
//!
//! [cache]
//! enabled = true
//! directory = "/var/cache/relimpact"
//!
//! [extractor]
//! language = "auto"
//! command = ["my-api-dump", "--json"]
//!
//! [pipeline]
//! mode = "parallel"
//! ```

use std::path::{Path, PathBuf};

use relimpact_core::auxiliary::DEFAULT_EXTENSIONS;
use relimpact_core::cache::SnapshotCache;
use relimpact_core::extract::Language;
use relimpact_core::ExecutionMode;
use serde::{Deserialize, Serialize};

/// File name looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = ".relimpact.toml";

/// Root configuration structure for `.relimpact.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RelimpactConfig {
    pub auxiliary: AuxiliaryConfig,
    pub cache: CacheConfig,
    pub extractor: ExtractorConfig,
    pub pipeline: PipelineConfig,
}

/// Extensions reported in the "Other Files Changes" section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuxiliaryConfig {
    pub extensions: Vec<String>,
}

impl Default for AuxiliaryConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable snapshot caching (default: true)
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Cache directory (default: `<tmp>/relimpact-api-cache`)
    pub directory: Option<String>,
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            directory: None,
        }
    }
}

/// Symbol extractor selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// `auto`, `go` or `rust`.
    pub language: Option<String>,

    /// External command printing a JSON snapshot; overrides `language`.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `parallel` or `sequential`.
    pub mode: Option<String>,
}

impl RelimpactConfig {
    /// Load configuration from `.relimpact.toml` in `root`.
    ///
    /// A missing file yields defaults. Read and parse errors are logged as
    /// warnings and also yield defaults.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            Self::default()
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Configured extractor language, `Auto` when unset or unrecognized.
    pub fn language(&self) -> Language {
        match self.extractor.language.as_deref().map(str::parse::<Language>) {
            Some(Ok(language)) => language,
            Some(Err(e)) => {
                tracing::warn!("{}, falling back to auto", e);
                Language::Auto
            }
            None => Language::Auto,
        }
    }

    /// External extractor command, if one is configured with a program name.
    pub fn extractor_command(&self) -> Option<&[String]> {
        self.extractor
            .command
            .as_deref()
            .filter(|argv| !argv.is_empty())
    }

    /// Configured execution mode, if set and recognized.
    pub fn mode(&self) -> Option<ExecutionMode> {
        let mode = self.pipeline.mode.as_deref()?;
        match mode.parse() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!("{}, using the default mode", e);
                None
            }
        }
    }

    /// Snapshot cache to hand to the pipeline, `None` when caching is off.
    pub fn snapshot_cache(&self) -> Option<SnapshotCache> {
        if !self.cache.enabled {
            return None;
        }
        Some(match &self.cache.directory {
            Some(dir) => SnapshotCache::new(PathBuf::from(dir)),
            None => SnapshotCache::in_temp_dir(),
        })
    }
}
