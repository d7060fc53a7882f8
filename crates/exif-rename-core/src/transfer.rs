use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use log::Level;
use serde::{Deserialize, Serialize};

use crate::journal::LogSink;
use crate::resolver::ResolvedPlan;
use crate::ProgressCallback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
    /// Plan and report only
    DryRun,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransferOptions {
    pub mode: TransferMode,
    pub no_clobber: bool,
    pub create_parents: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Success,
    /// Destination exists and overwriting is disabled
    Skipped,
    WouldTransfer,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: TransferStatus,
}

/// Copy file contents and permissions, then carry over access and modification times.
pub fn copy_with_metadata(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    let meta = fs::metadata(source)?;
    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
}

/// Rename, or copy and delete when a rename is not possible (e.g. across filesystems).
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    copy_with_metadata(source, destination)?;
    fs::remove_file(source)
}

/// Free name next to `path` to hold its content while a circular rename runs.
fn aside_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let mut counter = 0u32;
    loop {
        let candidate = path.with_file_name(format!(".{}.exif-rename-{}.tmp", name, counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Perform every entry of the plan. Failures are reported per entry and never stop the batch.
pub fn execute(
    plan: &ResolvedPlan,
    options: &TransferOptions,
    log: &dyn LogSink,
    progress: &ProgressCallback,
) -> Vec<TransferOutcome> {
    let dry_run = options.mode == TransferMode::DryRun;

    // Directories that could not be created, with the reason
    let mut broken_dirs: Vec<(&Path, String)> = Vec::new();
    if options.create_parents && !dry_run {
        for dir in &plan.required_dirs {
            if dir.is_dir() {
                continue;
            }
            match fs::create_dir_all(dir) {
                Ok(()) => log.emit(Level::Debug, &format!("Created directory '{}'", dir.display())),
                Err(err) => {
                    log.emit(
                        Level::Error,
                        &format!("Cannot create directory '{}': {}", dir.display(), err),
                    );
                    broken_dirs.push((dir.as_path(), err.to_string()));
                }
            }
        }
    }

    let verb = match options.mode {
        TransferMode::Move => "Move",
        TransferMode::Copy | TransferMode::DryRun => "Copy",
    };
    let chains = plan.execution_order(log);
    let total = chains.iter().map(|c| c.steps.len()).sum::<usize>() as u64;
    let mut outcomes = Vec::with_capacity(total as usize);
    let mut i = 0u64;

    for chain in chains {
        // The last step's source is overwritten by the first step, so its content
        // waits under a temporary name. With --no-clobber every step is skipped anyway.
        let mut aside = None;
        if chain.cycle && !dry_run && !options.no_clobber {
            if let Some(&(source, _)) = chain.steps.last() {
                let temp = aside_path(source);
                match fs::rename(source, &temp) {
                    Ok(()) => {
                        log.emit(
                            Level::Debug,
                            &format!("Set aside '{}' as '{}'", source.display(), temp.display()),
                        );
                        aside = Some(temp);
                    }
                    Err(err) => {
                        log.emit(
                            Level::Error,
                            &format!("Cannot set aside '{}': {}", source.display(), err),
                        );
                        for (source, destination) in chain.steps {
                            progress("transfer", i, total, verb);
                            i += 1;
                            outcomes.push(TransferOutcome {
                                source: source.clone(),
                                destination: destination.clone(),
                                status: TransferStatus::Failed {
                                    error: format!("circular rename not started: {}", err),
                                },
                            });
                        }
                        continue;
                    }
                }
            }
        }

        let last = chain.steps.len().saturating_sub(1);
        let mut chain_failed = false;
        for (pos, (source, destination)) in chain.steps.into_iter().enumerate() {
            progress("transfer", i, total, verb);
            i += 1;
            log.emit(
                Level::Info,
                &format!("{} image {}/{}: {} --> {}", verb, i, total, source.display(), destination.display()),
            );

            let status = match aside.as_deref().filter(|_| pos == last) {
                Some(temp) if chain_failed => {
                    log.emit(
                        Level::Error,
                        &format!(
                            "Circular rename interrupted, content of '{}' kept in '{}'",
                            source.display(),
                            temp.display()
                        ),
                    );
                    TransferStatus::Failed {
                        error: format!("circular rename interrupted, content kept in '{}'", temp.display()),
                    }
                }
                // Whatever the mode, the original path now holds another file
                Some(temp) => transfer_entry(temp, destination, TransferMode::Move, options, &broken_dirs, log),
                None => transfer_entry(source, destination, options.mode, options, &broken_dirs, log),
            };
            if matches!(status, TransferStatus::Failed { .. }) {
                chain_failed = true;
            }
            outcomes.push(TransferOutcome {
                source: source.clone(),
                destination: destination.clone(),
                status,
            });
        }
    }

    outcomes
}

fn transfer_entry(
    source: &Path,
    destination: &Path,
    mode: TransferMode,
    options: &TransferOptions,
    broken_dirs: &[(&Path, String)],
    log: &dyn LogSink,
) -> TransferStatus {
    if let Some((_, reason)) = broken_dirs
        .iter()
        .find(|(dir, _)| destination.parent() == Some(*dir))
    {
        return TransferStatus::Failed {
            error: format!("destination directory unavailable: {}", reason),
        };
    }
    if options.no_clobber && destination.exists() {
        log.emit(
            Level::Warn,
            &format!(
                "File '{}' already exists and --no-clobber is set, skipping '{}'",
                destination.display(),
                source.display()
            ),
        );
        return TransferStatus::Skipped;
    }

    let result = match mode {
        TransferMode::DryRun => {
            log.emit(Level::Info, "Dry run: no operation is done");
            Ok(TransferStatus::WouldTransfer)
        }
        TransferMode::Copy => copy_with_metadata(source, destination).map(|_| TransferStatus::Success),
        TransferMode::Move => move_file(source, destination).map(|_| TransferStatus::Success),
    };
    result.unwrap_or_else(|err| {
        log.emit(
            Level::Error,
            &format!("Cannot transfer '{}': {}", source.display(), err),
        );
        TransferStatus::Failed {
            error: err.to_string(),
        }
    })
}
