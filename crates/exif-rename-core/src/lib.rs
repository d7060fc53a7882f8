pub mod discover;
pub mod error;
pub mod extract;
pub mod journal;
pub mod plan_file;
pub mod planner;
pub mod record;
pub mod resolver;
pub mod timestamp;
pub mod transfer;

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::Level;
use serde::{Deserialize, Serialize};

pub use discover::DEFAULT_EXTENSIONS;
pub use error::ConfigError;
pub use extract::{ExifExtractor, MetadataExtractor};
pub use journal::{Journal, LogSink, NullSink, Verbosity};
pub use plan_file::PlanFile;
pub use planner::{DestinationPlan, NoMetadataPolicy, PlanOptions};
pub use record::ImageRecord;
pub use resolver::ResolvedPlan;
pub use timestamp::Timestamp;
pub use transfer::{TransferMode, TransferOptions, TransferOutcome, TransferStatus};

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub mirror_tree: bool,
    #[serde(default)]
    pub mode: TransferMode,
    #[serde(default)]
    pub no_clobber: bool,
    #[serde(default)]
    pub no_metadata: NoMetadataPolicy,
    #[serde(default = "default_true")]
    pub seconds_in_filename: bool,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Checked here, written by the caller from its [`Journal`]
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub plan_file: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            output_directory: None,
            recursive: false,
            mirror_tree: false,
            mode: TransferMode::Copy,
            no_clobber: false,
            no_metadata: NoMetadataPolicy::Exclude,
            seconds_in_filename: true,
            extensions: default_extensions(),
            log_file: None,
            plan_file: None,
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            output_directory: self.output_directory.clone(),
            mirror_tree: self.mirror_tree,
            no_metadata: self.no_metadata,
            seconds_in_filename: self.seconds_in_filename,
        }
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            mode: self.mode,
            no_clobber: self.no_clobber,
            create_parents: self.mirror_tree,
        }
    }

    /// Reject flag combinations and paths that cannot work, before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInput);
        }
        if self.mirror_tree && self.output_directory.is_none() {
            return Err(ConfigError::MirrorTreeWithoutOutput);
        }
        if let Some(out) = &self.output_directory {
            if !out.is_dir() {
                return Err(ConfigError::OutputNotDirectory(out.clone()));
            }
        }
        if let Some(missing) = self.inputs.iter().find(|p| !p.exists()) {
            return Err(ConfigError::InputNotFound(missing.clone()));
        }
        for path in self.log_file.iter().chain(self.plan_file.iter()) {
            check_writable(path)?;
        }
        Ok(())
    }
}

/// A file path is writable when it is an existing writable file, or when its
/// directory exists.
fn check_writable(path: &Path) -> Result<(), ConfigError> {
    let not_writable = || ConfigError::NotWritable(path.to_path_buf());
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() || meta.permissions().readonly() => Err(not_writable()),
        Ok(_) => Ok(()),
        Err(_) => {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            if parent.is_dir() {
                Ok(())
            } else {
                Err(not_writable())
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub discovered: u64,
    pub with_metadata: u64,
    pub planned: u64,
    /// Destinations proposed for more than one file
    pub collision_groups: u64,
    pub transferred: u64,
    pub would_transfer: u64,
    pub skipped: u64,
    pub failed: u64,
    #[serde(default)]
    pub failures: Vec<String>,
    #[serde(default)]
    pub outcomes: Vec<TransferOutcome>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Type alias for progress callback: `(stage, current, total, message)`
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Discover, read capture times, plan, resolve collisions and transfer.
pub fn run(
    options: &RunOptions,
    extractor: &dyn MetadataExtractor,
    log: &dyn LogSink,
    progress: &ProgressCallback,
) -> anyhow::Result<RunResult> {
    options.validate()?;
    extractor
        .ensure_available()
        .with_context(|| format!("metadata extractor '{}' is not available", extractor.name()))?;
    log.emit(
        Level::Debug,
        &format!("Using metadata extractor: {}", extractor.name()),
    );

    // Stage 1: discover
    let files = discover::discover(&options.inputs, options.recursive, &options.extensions, log)?;
    if files.is_empty() {
        log.emit(Level::Info, "No image files found. Nothing to do.");
        return Ok(RunResult::default());
    }

    // Stage 2: capture times
    let records = extract::extract_records(&files, extractor, log, progress);
    let with_metadata = records.iter().filter(|r| r.timestamp.is_some()).count() as u64;
    log.emit(
        Level::Debug,
        &format!("Capture time found: {}/{}", with_metadata, records.len()),
    );

    // Stage 3: plan and resolve
    let plan = planner::plan(&records, &options.plan_options(), log)?;
    let planned = plan.len() as u64;
    let collision_groups = resolver::destination_counts(&plan)
        .values()
        .filter(|&&n| n > 1)
        .count() as u64;
    let resolved = resolver::resolve(plan, log);
    if !resolved.is_injective() {
        anyhow::bail!("internal error: resolved plan maps two files to the same destination");
    }

    if let Some(path) = &options.plan_file {
        PlanFile::new(&resolved, options.mode)
            .save(path)
            .with_context(|| format!("cannot write plan file '{}'", path.display()))?;
        log.emit(Level::Info, &format!("Plan written to '{}'", path.display()));
    }

    // Stage 4: transfer
    let outcomes = transfer::execute(&resolved, &options.transfer_options(), log, progress);

    let mut result = RunResult {
        discovered: files.len() as u64,
        with_metadata,
        planned,
        collision_groups,
        ..RunResult::default()
    };
    for outcome in &outcomes {
        match &outcome.status {
            TransferStatus::Success => result.transferred += 1,
            TransferStatus::WouldTransfer => result.would_transfer += 1,
            TransferStatus::Skipped => result.skipped += 1,
            TransferStatus::Failed { error } => {
                result.failed += 1;
                result.failures.push(format!(
                    "{} --> {}: {}",
                    outcome.source.display(),
                    outcome.destination.display(),
                    error
                ));
            }
        }
    }
    result.outcomes = outcomes;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_configuration_errors() {
        let dir = tempdir().unwrap();
        let input = dir.path().to_path_buf();

        let mut opts = RunOptions::new(vec![input.clone()]);
        assert!(opts.validate().is_ok());

        opts.mirror_tree = true;
        assert!(matches!(opts.validate(), Err(ConfigError::MirrorTreeWithoutOutput)));

        opts.output_directory = Some(dir.path().join("missing"));
        assert!(matches!(opts.validate(), Err(ConfigError::OutputNotDirectory(_))));

        opts.output_directory = Some(input.clone());
        opts.inputs = vec![dir.path().join("nope")];
        assert!(matches!(opts.validate(), Err(ConfigError::InputNotFound(_))));

        opts.inputs = vec![input];
        opts.log_file = Some(dir.path().join("no/such/dir/run.log"));
        assert!(matches!(opts.validate(), Err(ConfigError::NotWritable(_))));

        opts.log_file = Some(dir.path().join("run.log"));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_run_options_serde_defaults() {
        let opts: RunOptions = serde_json::from_str(r#"{"inputs":["/photos"]}"#).unwrap();
        assert!(opts.seconds_in_filename);
        assert_eq!(opts.extensions, vec!["jpg".to_string(), "JPG".to_string()]);
        assert_eq!(opts.mode, TransferMode::Copy);
        assert_eq!(opts.no_metadata, NoMetadataPolicy::Exclude);
    }
}
