use std::path::{Path, PathBuf};

use crate::timestamp::Timestamp;

/// One discovered image and its capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Path of the image file
    pub source: PathBuf,
    /// Input entry (directory or the file itself) the image was found under
    pub origin: PathBuf,
    /// Capture timestamp, if the metadata had a usable one
    pub timestamp: Option<Timestamp>,
}

impl ImageRecord {
    pub fn new(source: PathBuf, origin: PathBuf, timestamp: Option<Timestamp>) -> Self {
        Self {
            source,
            origin,
            timestamp,
        }
    }

    /// Directory that mirrored paths are computed relative to.
    ///
    /// A directory input is its own base; a file given directly on the command line
    /// is based at its parent, so it lands at the output root.
    pub fn base_directory(&self) -> &Path {
        if self.origin == self.source {
            self.source.parent().unwrap_or(Path::new(""))
        } else {
            self.origin.as_path()
        }
    }

    /// Parent directory of the source relative to [`base_directory`](Self::base_directory).
    pub fn relative_directory(&self) -> PathBuf {
        let parent = self.source.parent().unwrap_or(Path::new(""));
        pathdiff::diff_paths(parent, self.base_directory()).unwrap_or_default()
    }
}
