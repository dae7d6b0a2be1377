//! Running partition configs through a validation engine.
//!
//! Either a single config file or a whole config directory is run. In a
//! Kubernetes indexed Job (`--kube-completions`), each pod picks the one file
//! matching its `JOB_COMPLETION_INDEX` out of the directory.

mod count;

pub use count::CountValidationEngine;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PartitionError, Result};
use crate::output::{config_file_name, PartitionConfig};

/// Environment variable set by Kubernetes for indexed Job completions.
pub const JOB_COMPLETION_INDEX: &str = "JOB_COMPLETION_INDEX";

const KC_WITH_CONFIG_FILE: &str = "--kube-completions or -kc specified, which requires a config directory, however a specific config file is provided.";
const KC_WITHOUT_JOB_INDEX: &str = "--kube-completions or -kc specified, however not running in Kubernetes Job completion, check your command line.";

/// Completion index of this pod, if running as an indexed Job.
pub fn job_completion_index() -> Option<usize> {
    std::env::var(JOB_COMPLETION_INDEX)
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct RunnerArgs {
    pub config_file: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub kube_completions: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
    Fail,
}

/// Outcome of validating one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub partition_index: usize,
    pub source_rows: u64,
    pub target_rows: u64,
    pub status: ValidationStatus,
}

/// Validates one partition of a source/target table pair.
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    async fn validate(&self, config: &PartitionConfig) -> Result<ValidationResult>;
}

/// A config file that could not be run.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub message: String,
}

/// Results of a run, in file order.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Files selected for this run.
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub results: Vec<ValidationResult>,
    pub failures: Vec<FileFailure>,
    /// Configs loaded but not run (dry run).
    pub planned: Vec<PartitionConfig>,
}

impl RunReport {
    /// Fail if any config file failed.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(PartitionError::Validation(
                "Some of the validations raised an exception".into(),
            ))
        }
    }

    pub fn mismatches(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ValidationStatus::Fail)
            .count()
    }
}

/// Runs partition configs one after another.
pub struct ConfigRunner<'a> {
    engine: &'a dyn ValidationEngine,
    job_index: Option<usize>,
    expected_hash: Option<String>,
}

impl<'a> ConfigRunner<'a> {
    pub fn new(engine: &'a dyn ValidationEngine) -> Self {
        Self {
            engine,
            job_index: None,
            expected_hash: None,
        }
    }

    /// Set the Job completion index (normally from [`job_completion_index`]).
    pub fn with_job_index(mut self, index: Option<usize>) -> Self {
        self.job_index = index;
        self
    }

    /// Warn about configs generated from a different configuration.
    pub fn with_expected_hash(mut self, hash: impl Into<String>) -> Self {
        self.expected_hash = Some(hash.into());
        self
    }

    /// Pick the config files to run.
    pub fn resolve(&self, args: &RunnerArgs) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let mut warnings = Vec::new();

        let files = match (&args.config_file, &args.config_dir) {
            (Some(_), Some(_)) => {
                return Err(PartitionError::Config(
                    "only one of config_file and config_dir may be given".into(),
                ))
            }
            (None, None) => {
                return Err(PartitionError::Config(
                    "either config_file or config_dir is required".into(),
                ))
            }
            (Some(file), None) => {
                if args.kube_completions {
                    warnings.push(KC_WITH_CONFIG_FILE.to_string());
                }
                vec![file.clone()]
            }
            (None, Some(dir)) => match (args.kube_completions, self.job_index) {
                (true, Some(index)) => vec![dir.join(config_file_name(index))],
                (kube, _) => {
                    if kube {
                        warnings.push(KC_WITHOUT_JOB_INDEX.to_string());
                    }
                    list_config_dir(dir)?
                }
            },
        };

        for w in &warnings {
            warn!("{}", w);
        }
        Ok((files, warnings))
    }

    /// Run every selected file, collecting per-file failures.
    pub async fn execute(&self, args: &RunnerArgs) -> Result<RunReport> {
        let (files, warnings) = self.resolve(args)?;
        let mut report = RunReport {
            files: files.clone(),
            warnings,
            ..Default::default()
        };

        for path in &files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            match self.run_file(path, args.dry_run).await {
                Ok(RunOutcome::Planned(config)) => report.planned.push(*config),
                Ok(RunOutcome::Validated(result)) => {
                    info!(
                        "{}: partition {} {:?} (source {} rows, target {} rows)",
                        name,
                        result.partition_index,
                        result.status,
                        result.source_rows,
                        result.target_rows
                    );
                    report.results.push(result);
                }
                Err(e) => {
                    let message = format!(
                        "Error '{}' occurred while running config file {}. Skipping it for now.",
                        e, name
                    );
                    warn!("{}", message);
                    report.failures.push(FileFailure {
                        file: name,
                        message,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Run and fail if any file failed.
    pub async fn run(&self, args: &RunnerArgs) -> Result<RunReport> {
        self.execute(args).await?.into_result()
    }

    async fn run_file(&self, path: &Path, dry_run: bool) -> Result<RunOutcome> {
        let config = PartitionConfig::load(path)?;

        if let Some(expected) = &self.expected_hash {
            if &config.config_hash != expected {
                warn!(
                    "{} was generated from a different configuration (hash {})",
                    path.display(),
                    config.config_hash
                );
            }
        }

        if dry_run {
            return Ok(RunOutcome::Planned(Box::new(config)));
        }
        Ok(RunOutcome::Validated(self.engine.validate(&config).await?))
    }
}

enum RunOutcome {
    Planned(Box<PartitionConfig>),
    Validated(ValidationResult),
}

/// `*.yaml` / `*.yml` files of a directory, sorted by name.
fn list_config_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(PartitionError::Config(format!(
            "no config files found in {}",
            dir.display()
        )));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{KeyRange, RangeKind, TableFilter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records calls; fails the call numbers listed in `fail_on`.
    struct MockEngine {
        calls: AtomicUsize,
        fail_on: Vec<usize>,
        seen: Mutex<Vec<usize>>,
    }

    impl MockEngine {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ValidationEngine for MockEngine {
        async fn validate(&self, config: &PartitionConfig) -> Result<ValidationResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(config.partition_index);
            if self.fail_on.contains(&call) {
                return Err(PartitionError::Validation("Boom!".into()));
            }
            Ok(ValidationResult {
                partition_index: config.partition_index,
                source_rows: 10,
                target_rows: 10,
                status: ValidationStatus::Success,
            })
        }
    }

    fn partition_config(index: usize, count: usize) -> PartitionConfig {
        let side = |t: &str| TableFilter {
            r#type: "postgres".into(),
            schema: "public".into(),
            table: t.into(),
            filter: "1 = 1".into(),
        };
        PartitionConfig {
            config_hash: "hash".into(),
            partition_index: index,
            partition_count: count,
            key_columns: vec!["id".into()],
            range: KeyRange {
                kind: RangeKind::All,
                lower: None,
                upper: None,
            },
            source: side("orders"),
            target: side("orders_copy"),
        }
    }

    fn config_dir(count: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..count {
            let yaml = serde_yaml::to_string(&partition_config(i, count)).unwrap();
            std::fs::write(dir.path().join(config_file_name(i)), yaml).unwrap();
        }
        std::fs::write(dir.path().join("README.txt"), "not a config").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_config_file_with_kube_completions_warns() {
        let dir = config_dir(3);
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine).with_job_index(Some(1));
        let args = RunnerArgs {
            config_file: Some(dir.path().join("0000.yaml")),
            kube_completions: true,
            ..Default::default()
        };

        let report = runner.run(&args).await.unwrap();
        assert_eq!(report.warnings, vec![KC_WITH_CONFIG_FILE.to_string()]);
        assert_eq!(engine.calls(), 1);
        assert_eq!(report.results.len(), 1);
    }

    #[tokio::test]
    async fn test_config_dir_with_kube_completions_outside_job_warns() {
        let dir = config_dir(3);
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine);
        let args = RunnerArgs {
            config_dir: Some(dir.path().to_path_buf()),
            kube_completions: true,
            ..Default::default()
        };

        let report = runner.run(&args).await.unwrap();
        assert_eq!(report.warnings, vec![KC_WITHOUT_JOB_INDEX.to_string()]);
        assert_eq!(engine.calls(), 3);
    }

    #[tokio::test]
    async fn test_config_dir_in_indexed_job_runs_one_file() {
        let dir = config_dir(4);
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine).with_job_index(Some(2));
        let args = RunnerArgs {
            config_dir: Some(dir.path().to_path_buf()),
            kube_completions: true,
            ..Default::default()
        };

        let report = runner.run(&args).await.unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.files, vec![dir.path().join("0002.yaml")]);
        assert_eq!(engine.calls(), 1);
        assert_eq!(*engine.seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_failures_are_skipped_then_reported() {
        let dir = config_dir(4);
        let engine = MockEngine::new(vec![1]);
        // Job index is ignored without --kube-completions
        let runner = ConfigRunner::new(&engine).with_job_index(Some(2));
        let args = RunnerArgs {
            config_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let report = runner.execute(&args).await.unwrap();
        assert_eq!(engine.calls(), 4);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].message,
            "Error 'Validation failed: Boom!' occurred while running config file 0001.yaml. Skipping it for now."
        );

        let err = report.into_result().unwrap_err();
        match err {
            PartitionError::Validation(msg) => {
                assert_eq!(msg, "Some of the validations raised an exception")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_does_not_call_engine() {
        let dir = config_dir(2);
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine);
        let args = RunnerArgs {
            config_dir: Some(dir.path().to_path_buf()),
            dry_run: true,
            ..Default::default()
        };

        let report = runner.run(&args).await.unwrap();
        assert_eq!(engine.calls(), 0);
        assert_eq!(report.planned.len(), 2);
        assert_eq!(report.planned[1].partition_index, 1);
    }

    #[tokio::test]
    async fn test_unreadable_config_counts_as_failure() {
        let dir = config_dir(2);
        std::fs::write(dir.path().join("0001.yaml"), "not: [valid").unwrap();
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine);
        let args = RunnerArgs {
            config_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let err = runner.run(&args).await.unwrap_err();
        assert!(matches!(err, PartitionError::Validation(_)));
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_resolve_requires_exactly_one_input() {
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine);
        assert!(runner.resolve(&RunnerArgs::default()).is_err());

        let both = RunnerArgs {
            config_file: Some("a.yaml".into()),
            config_dir: Some("dir".into()),
            ..Default::default()
        };
        assert!(runner.resolve(&both).is_err());
    }

    #[test]
    fn test_empty_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new(vec![]);
        let runner = ConfigRunner::new(&engine);
        let args = RunnerArgs {
            config_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(runner.resolve(&args).is_err());
    }
}
