//! relimpact CLI - release impact reports between two git refs
//!
//! Checks out both refs as temporary worktrees, extracts their exported API,
//! and prints a report covering API, documentation and auxiliary file changes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use relimpact_core::extract::extractor_for;
use relimpact_core::{ExecutionMode, Pipeline, PipelineOptions, ReportFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod git;

use config::RelimpactConfig;
use git::{GitChangeLister, GitWorktrees};

/// Release impact report between two git refs.
#[derive(Parser)]
#[command(name = "relimpact")]
#[command(author, version)]
#[command(about = "Release impact report between two git refs")]
#[command(
    long_about = "Compares two refs of a repository and reports exported API changes,\nMarkdown documentation changes and changes to auxiliary files."
)]
#[command(after_help = "Examples:
  relimpact --old v1.2.0 --new v1.3.0
  relimpact --old main --new HEAD --format json
  relimpact --old v1 --new v2 --mode sequential --no-cache")]
pub struct Cli {
    /// Base ref (tag, branch or commit)
    #[arg(long)]
    old: String,

    /// Target ref (tag, branch or commit)
    #[arg(long)]
    new: String,

    /// Repository to compare
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Execution mode (overrides config)
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Report format
    #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
    format: FormatArg,

    /// Disable the API snapshot cache
    #[arg(long)]
    no_cache: bool,

    /// Configuration file (default: <repo>/.relimpact.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Parallel,
    Sequential,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Parallel => ExecutionMode::Parallel,
            ModeArg::Sequential => ExecutionMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Markdown,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

/// Resolve options: CLI flags > config file > defaults.
fn pipeline_options(cli: &Cli, config: &RelimpactConfig) -> PipelineOptions {
    let mode = cli
        .mode
        .map(ExecutionMode::from)
        .or_else(|| config.mode())
        .unwrap_or_default();

    let cache = if cli.no_cache {
        None
    } else {
        config.snapshot_cache()
    };

    PipelineOptions {
        mode,
        allowed_extensions: config.auxiliary.extensions.clone(),
        cache,
    }
}

fn load_config(cli: &Cli, repo: &Path) -> RelimpactConfig {
    match &cli.config {
        Some(path) => RelimpactConfig::load_file(path),
        None => RelimpactConfig::load(repo),
    }
}

fn run(cli: Cli) -> anyhow::Result<String> {
    let repo = cli
        .repo
        .canonicalize()
        .with_context(|| format!("Repository not found: {}", cli.repo.display()))?;

    let config = load_config(&cli, &repo);
    let options = pipeline_options(&cli, &config);
    tracing::info!(
        "Comparing {}..{} in {} ({} mode)",
        cli.old,
        cli.new,
        repo.display(),
        options.mode.as_str()
    );

    let extractor = extractor_for(config.language(), config.extractor_command());
    let pipeline =
        Pipeline::new(GitWorktrees, extractor, GitChangeLister).with_options(options);

    pipeline
        .render(&repo, &cli.old, &cli.new, cli.format.into())
        .with_context(|| format!("Failed to build release impact report for {}..{}", cli.old, cli.new))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(report) => {
            print!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "relimpact", "--old", "v1", "--new", "v2", "--mode", "sequential", "--no-cache",
        ]);
        let config: RelimpactConfig = toml::from_str("[pipeline]\nmode = \"parallel\"\n").unwrap();

        let options = pipeline_options(&cli, &config);
        assert_eq!(options.mode, ExecutionMode::Sequential);
        assert!(options.cache.is_none());
    }

    #[test]
    fn test_config_mode_used_without_flag() {
        let cli = Cli::parse_from(["relimpact", "--old", "v1", "--new", "v2"]);
        let config: RelimpactConfig =
            toml::from_str("[pipeline]\nmode = \"sequential\"\n[cache]\nenabled = false\n").unwrap();

        let options = pipeline_options(&cli, &config);
        assert_eq!(options.mode, ExecutionMode::Sequential);
        assert!(options.cache.is_none());
        assert!(matches!(cli.format, FormatArg::Markdown));
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn test_missing_refs_rejected() {
        assert!(Cli::try_parse_from(["relimpact", "--old", "v1"]).is_err());
    }
}
