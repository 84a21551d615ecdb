//! Error types for relimpact-core.

use thiserror::Error;

/// Result type alias for relimpact-core operations.
pub type Result<T> = std::result::Result<T, RelimpactError>;

/// Errors that abort a release impact run.
///
/// Cache failures never show up here: the snapshot cache swallows its own
/// errors and reports a miss instead.
#[derive(Error, Debug)]
pub enum RelimpactError {
    /// A working copy for a ref could not be created.
    #[error("failed to provision working copy for `{git_ref}`: {message}")]
    Provision {
        /// The ref that was being checked out.
        git_ref: String,
        /// Description of the failure.
        message: String,
    },

    /// Symbol extraction could not run at all.
    #[error("symbol extraction failed in {path}: {message}")]
    Extraction {
        /// Working copy the extractor ran in.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// The changed-file list between the two refs could not be retrieved.
    #[error("failed to list changes between `{old_ref}` and `{new_ref}`: {message}")]
    ChangeList {
        old_ref: String,
        new_ref: String,
        message: String,
    },

    /// One of the three diff branches failed.
    #[error("{section} diff failed: {message}")]
    Diff {
        section: &'static str,
        message: String,
    },

    /// IO error while reading working copies.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML manifest parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelimpactError {
    pub fn provision(git_ref: &str, message: impl Into<String>) -> Self {
        Self::Provision {
            git_ref: git_ref.to_string(),
            message: message.into(),
        }
    }

    pub fn extraction(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    pub fn diff(section: &'static str, message: impl Into<String>) -> Self {
        Self::Diff {
            section,
            message: message.into(),
        }
    }

    pub fn change_list(old_ref: &str, new_ref: &str, message: impl Into<String>) -> Self {
        Self::ChangeList {
            old_ref: old_ref.to_string(),
            new_ref: new_ref.to_string(),
            message: message.into(),
        }
    }
}
