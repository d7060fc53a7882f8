use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::Level;
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::journal::LogSink;

/// Extensions matched when none are configured. Matching is case-sensitive.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "JPG"];

/// An image file found under one of the inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// The input entry this file was found under
    pub origin: PathBuf,
}

pub fn has_matching_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| extensions.iter().any(|x| x == ext))
}

/// Collect image files from files and directories given as inputs.
///
/// Directory entries are visited in file-name order, so the result is stable across runs.
pub fn discover(
    inputs: &[PathBuf],
    recursive: bool,
    extensions: &[String],
    log: &dyn LogSink,
) -> Result<Vec<DiscoveredFile>, ConfigError> {
    if inputs.is_empty() {
        return Err(ConfigError::NoInput);
    }
    if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
        return Err(ConfigError::InputNotFound(missing.clone()));
    }

    log.emit(
        Level::Debug,
        &format!("Looking for image files with extension in: {:?}", extensions),
    );

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            if has_matching_extension(input, extensions) && seen.insert(input.clone()) {
                files.push(DiscoveredFile {
                    path: input.clone(),
                    origin: input.clone(),
                });
            } else {
                log.emit(
                    Level::Debug,
                    &format!("'{}' is not a matching image file, skipping", input.display()),
                );
            }
            continue;
        }

        let walker = WalkDir::new(input)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log.emit(Level::Warn, &format!("Cannot read directory entry: {}", err));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if has_matching_extension(&path, extensions) && seen.insert(path.clone()) {
                files.push(DiscoveredFile {
                    path,
                    origin: input.clone(),
                });
            }
        }
    }

    log.emit(Level::Debug, &format!("{} images found", files.len()));
    Ok(files)
}
