//! Release impact pipeline.
//!
//! A run has three stages with a join barrier after each:
//!
//! 1. provision the old and new working copies
//! 2. extract both API snapshots, optionally through the [`SnapshotCache`]
//! 3. compute the symbol, documentation and auxiliary diffs
//!
//! In [`ExecutionMode::Parallel`] each stage fans out on the rayon pool; in
//! [`ExecutionMode::Sequential`] every task runs in order on the calling
//! thread. Results are merged positionally, so both modes produce identical
//! reports. Any failure aborts the run and no partial report is produced.

pub mod collaborators;
pub mod workcopy;

use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, info};

use crate::auxiliary::{self, AuxiliaryReport, DEFAULT_EXTENSIONS};
use crate::cache::SnapshotCache;
use crate::differ::{self, ChangeSet};
use crate::docs::{self, DocDiff};
use crate::error::{RelimpactError, Result};
use crate::report::{self, Report, ReportFormat};
use crate::types::Snapshot;

pub use collaborators::{ChangeLister, SymbolExtractor, WorkingCopyProvisioner};
pub use workcopy::WorkingCopy;

/// How stage tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Sequential => "sequential",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parallel" => Ok(ExecutionMode::Parallel),
            "sequential" => Ok(ExecutionMode::Sequential),
            _ => Err(format!("Unknown execution mode: {}", s)),
        }
    }
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: ExecutionMode,
    /// Extensions reported in the auxiliary section.
    pub allowed_extensions: Vec<String>,
    /// Snapshot cache; `None` disables caching.
    pub cache: Option<SnapshotCache>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            cache: None,
        }
    }
}

/// Orchestrates one release impact run over injected collaborators.
pub struct Pipeline {
    provisioner: Box<dyn WorkingCopyProvisioner>,
    extractor: Box<dyn SymbolExtractor>,
    change_lister: Box<dyn ChangeLister>,
    options: PipelineOptions,
    /// Per-branch sleep in the diff stage (api, docs, auxiliary).
    #[cfg(test)]
    diff_delays_ms: [u64; 3],
}

/// Inputs shared by the three diff tasks.
struct DiffInputs<'a> {
    repo: &'a Path,
    old_ref: &'a str,
    new_ref: &'a str,
    old_dir: &'a Path,
    new_dir: &'a Path,
    old_snapshot: &'a Snapshot,
    new_snapshot: &'a Snapshot,
}

impl Pipeline {
    pub fn new(
        provisioner: impl WorkingCopyProvisioner + 'static,
        extractor: impl SymbolExtractor + 'static,
        change_lister: impl ChangeLister + 'static,
    ) -> Self {
        Self {
            provisioner: Box::new(provisioner),
            extractor: Box::new(extractor),
            change_lister: Box::new(change_lister),
            options: PipelineOptions::default(),
            #[cfg(test)]
            diff_delays_ms: [0; 3],
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Compare `old_ref` and `new_ref` of the repository at `repo`.
    pub fn run(&self, repo: &Path, old_ref: &str, new_ref: &str) -> Result<Report> {
        let started = Instant::now();
        info!(old_ref, new_ref, mode = self.options.mode.as_str(), "Starting release impact run");

        let (old_copy, new_copy) = self.provision(repo, old_ref, new_ref)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Working copies ready");

        let (old_snapshot, new_snapshot) = self.snapshots(&old_copy, &new_copy)?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            old_units = old_snapshot.len(),
            new_units = new_snapshot.len(),
            "Snapshots extracted"
        );

        let inputs = DiffInputs {
            repo,
            old_ref,
            new_ref,
            old_dir: old_copy.path(),
            new_dir: new_copy.path(),
            old_snapshot: &old_snapshot,
            new_snapshot: &new_snapshot,
        };
        let (api, docs, auxiliary) = self.diffs(&inputs)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Diffs computed");

        Ok(Report {
            old_ref: old_ref.to_string(),
            new_ref: new_ref.to_string(),
            api,
            docs,
            auxiliary,
        })
    }

    /// Run and render in one step.
    pub fn render(
        &self,
        repo: &Path,
        old_ref: &str,
        new_ref: &str,
        format: ReportFormat,
    ) -> Result<String> {
        let report = self.run(repo, old_ref, new_ref)?;
        report::render(&report, format)
    }

    fn provision<'a>(
        &'a self,
        repo: &'a Path,
        old_ref: &str,
        new_ref: &str,
    ) -> Result<(WorkingCopy<'a>, WorkingCopy<'a>)> {
        let provisioner = self.provisioner.as_ref();
        info!("Provisioning working copies");

        match self.options.mode {
            ExecutionMode::Parallel => {
                let (old, new) = rayon::join(
                    || WorkingCopy::provision(provisioner, repo, old_ref),
                    || WorkingCopy::provision(provisioner, repo, new_ref),
                );
                // A successful sibling is dropped, and so released, on the error path.
                Ok((old?, new?))
            }
            ExecutionMode::Sequential => {
                let old = WorkingCopy::provision(provisioner, repo, old_ref)?;
                let new = WorkingCopy::provision(provisioner, repo, new_ref)?;
                Ok((old, new))
            }
        }
    }

    fn snapshots(
        &self,
        old_copy: &WorkingCopy<'_>,
        new_copy: &WorkingCopy<'_>,
    ) -> Result<(Snapshot, Snapshot)> {
        info!("Extracting API snapshots");

        match self.options.mode {
            ExecutionMode::Parallel => {
                let (old, new) =
                    rayon::join(|| self.snapshot(old_copy), || self.snapshot(new_copy));
                Ok((old?, new?))
            }
            ExecutionMode::Sequential => Ok((self.snapshot(old_copy)?, self.snapshot(new_copy)?)),
        }
    }

    /// Extract one snapshot, consulting the cache when one is configured.
    fn snapshot(&self, copy: &WorkingCopy<'_>) -> Result<Snapshot> {
        let Some(cache) = &self.options.cache else {
            return self.extractor.extract(copy.path());
        };

        let state_id = match self.provisioner.state_id(copy.path()) {
            Ok(id) => id,
            Err(err) => {
                debug!(git_ref = copy.git_ref(), error = %err, "No state id, extracting uncached");
                return self.extractor.extract(copy.path());
            }
        };

        let key = cache_key(&self.extractor.cache_namespace(), &state_id);
        if let Some(snapshot) = cache.get(&key) {
            return Ok(snapshot);
        }

        let snapshot = self.extractor.extract(copy.path())?;
        cache.put(&key, &snapshot);
        Ok(snapshot)
    }

    fn diffs(&self, inputs: &DiffInputs<'_>) -> Result<(ChangeSet, Vec<DocDiff>, AuxiliaryReport)> {
        info!("Computing diffs");

        match self.options.mode {
            ExecutionMode::Parallel => {
                let mut api = None;
                let mut docs = None;
                let mut auxiliary = None;

                let (api_slot, docs_slot, aux_slot) = (&mut api, &mut docs, &mut auxiliary);
                rayon::scope(move |s| {
                    s.spawn(move |_| *api_slot = Some(self.api_diff(inputs)));
                    s.spawn(move |_| *docs_slot = Some(self.docs_diff(inputs)));
                    s.spawn(move |_| *aux_slot = Some(self.auxiliary_diff(inputs)));
                });

                let api = api.ok_or_else(|| RelimpactError::diff("api", "task produced no result"))?;
                let docs =
                    docs.ok_or_else(|| RelimpactError::diff("documentation", "task produced no result"))?;
                let auxiliary = auxiliary
                    .ok_or_else(|| RelimpactError::diff("auxiliary", "task produced no result"))??;
                Ok((api, docs, auxiliary))
            }
            ExecutionMode::Sequential => {
                let api = self.api_diff(inputs);
                let docs = self.docs_diff(inputs);
                let auxiliary = self.auxiliary_diff(inputs)?;
                Ok((api, docs, auxiliary))
            }
        }
    }

    fn api_diff(&self, inputs: &DiffInputs<'_>) -> ChangeSet {
        self.pause(0);
        differ::diff(inputs.old_snapshot, inputs.new_snapshot)
    }

    fn docs_diff(&self, inputs: &DiffInputs<'_>) -> Vec<DocDiff> {
        self.pause(1);
        docs::diff_trees(inputs.old_dir, inputs.new_dir)
    }

    fn auxiliary_diff(&self, inputs: &DiffInputs<'_>) -> Result<AuxiliaryReport> {
        self.pause(2);
        auxiliary::diff(
            self.change_lister.as_ref(),
            inputs.repo,
            inputs.old_ref,
            inputs.new_ref,
            &self.options.allowed_extensions,
        )
    }
}

#[cfg(test)]
impl Pipeline {
    fn with_diff_delays(mut self, delays_ms: [u64; 3]) -> Self {
        self.diff_delays_ms = delays_ms;
        self
    }

    fn pause(&self, branch: usize) {
        std::thread::sleep(std::time::Duration::from_millis(self.diff_delays_ms[branch]));
    }
}

#[cfg(not(test))]
impl Pipeline {
    #[inline(always)]
    fn pause(&self, _branch: usize) {}
}

/// Cache entry name for a snapshot of `state_id` taken by an extractor.
pub fn cache_key(namespace: &str, state_id: &str) -> String {
    format!("{}-{}", namespace, state_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiUnit;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Hands out pre-created directories per ref and records cleanups.
    struct FakeProvisioner {
        dirs: Vec<(String, PathBuf)>,
        cleaned: Mutex<Vec<PathBuf>>,
    }

    impl WorkingCopyProvisioner for FakeProvisioner {
        fn checkout(&self, _repo: &Path, git_ref: &str) -> Result<PathBuf> {
            self.dirs
                .iter()
                .find(|(r, _)| r == git_ref)
                .map(|(_, p)| p.clone())
                .ok_or_else(|| RelimpactError::provision(git_ref, "unknown ref"))
        }

        fn cleanup(&self, _repo: &Path, path: &Path) -> Result<()> {
            self.cleaned.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn state_id(&self, path: &Path) -> Result<String> {
            Ok(path.file_name().unwrap().to_string_lossy().into_owned())
        }
    }

    /// Reads the unit list from `units.txt` in the working copy.
    struct FileExtractor;

    impl SymbolExtractor for FileExtractor {
        fn extract(&self, dir: &Path) -> Result<Snapshot> {
            let text = std::fs::read_to_string(dir.join("units.txt"))?;
            Ok(text
                .lines()
                .map(|line| (line.to_string(), ApiUnit::new()))
                .collect())
        }

        fn cache_namespace(&self) -> String {
            "units-file".to_string()
        }
    }

    struct StaticLister(Vec<(String, String)>);

    impl ChangeLister for StaticLister {
        fn changed_paths(&self, _: &Path, _: &str, _: &str) -> Result<Vec<(String, String)>> {
            Ok(self.0.clone())
        }
    }

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let old = root.path().join("old");
        let new = root.path().join("new");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::create_dir_all(&new).unwrap();
        std::fs::write(old.join("units.txt"), "a\nb\n").unwrap();
        std::fs::write(new.join("units.txt"), "b\nc\n").unwrap();
        std::fs::write(new.join("README.md"), "# Hello\n").unwrap();
        (root, old, new)
    }

    fn pipeline(old: &Path, new: &Path, mode: ExecutionMode) -> Pipeline {
        let provisioner = FakeProvisioner {
            dirs: vec![
                ("v1".to_string(), old.to_path_buf()),
                ("v2".to_string(), new.to_path_buf()),
            ],
            cleaned: Mutex::new(Vec::new()),
        };
        let lister = StaticLister(vec![("A".to_string(), "schema.sql".to_string())]);
        Pipeline::new(provisioner, FileExtractor, lister).with_options(PipelineOptions {
            mode,
            ..Default::default()
        })
    }

    #[test]
    fn test_run_merges_all_sections() {
        let (_root, old, new) = fixture();
        let report = pipeline(&old, &new, ExecutionMode::Parallel)
            .run(Path::new("."), "v1", "v2")
            .unwrap();

        assert_eq!(report.old_ref, "v1");
        assert_eq!(report.api.added.len(), 1);
        assert_eq!(report.api.added[0].value, "c");
        assert_eq!(report.api.removed[0].value, "a");
        assert_eq!(report.docs.len(), 1);
        assert_eq!(report.docs[0].file, "README.md");
        assert!(!report.auxiliary.is_empty());
    }

    #[test]
    fn test_modes_agree() {
        let (_root, old, new) = fixture();
        let parallel = pipeline(&old, &new, ExecutionMode::Parallel)
            .render(Path::new("."), "v1", "v2", ReportFormat::Markdown)
            .unwrap();
        let sequential = pipeline(&old, &new, ExecutionMode::Sequential)
            .render(Path::new("."), "v1", "v2", ReportFormat::Markdown)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_diff_branch_completion_order_does_not_matter() {
        let (_root, old, new) = fixture();
        let baseline = pipeline(&old, &new, ExecutionMode::Sequential)
            .render(Path::new("."), "v1", "v2", ReportFormat::Markdown)
            .unwrap();

        // Every finishing order of the api, docs and auxiliary branches.
        let orders = [
            [0, 15, 30],
            [0, 30, 15],
            [15, 0, 30],
            [15, 30, 0],
            [30, 0, 15],
            [30, 15, 0],
        ];
        for delays in orders {
            let output = pipeline(&old, &new, ExecutionMode::Parallel)
                .with_diff_delays(delays)
                .render(Path::new("."), "v1", "v2", ReportFormat::Markdown)
                .unwrap();
            assert_eq!(output, baseline, "diff delays {:?} changed the report", delays);
        }
    }

    #[test]
    fn test_unknown_ref_fails() {
        let (_root, old, new) = fixture();
        let result = pipeline(&old, &new, ExecutionMode::Parallel).run(Path::new("."), "v1", "v9");
        assert!(matches!(result, Err(RelimpactError::Provision { .. })));
    }

    #[test]
    fn test_cache_is_populated() {
        let (root, old, new) = fixture();
        let cache = SnapshotCache::new(root.path().join("cache"));
        let pipeline = pipeline(&old, &new, ExecutionMode::Sequential).with_options(PipelineOptions {
            mode: ExecutionMode::Sequential,
            cache: Some(cache.clone()),
            ..Default::default()
        });

        pipeline.run(Path::new("."), "v1", "v2").unwrap();

        let cached = cache.get(&cache_key("units-file", "old")).unwrap();
        assert!(cached.get("a").is_some());
        assert!(cache.get(&cache_key("units-file", "new")).is_some());
        assert!(cache.get("old").is_none());
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!("parallel".parse::<ExecutionMode>(), Ok(ExecutionMode::Parallel));
        assert_eq!("Sequential".parse::<ExecutionMode>(), Ok(ExecutionMode::Sequential));
        assert!("async".parse::<ExecutionMode>().is_err());
    }
}
