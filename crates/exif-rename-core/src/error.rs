use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems, detected before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no input file or directory was given")]
    NoInput,

    #[error("input '{}' does not exist", .0.display())]
    InputNotFound(PathBuf),

    #[error("directory '{}' given in --output-directory does not exist or is not a directory", .0.display())]
    OutputNotDirectory(PathBuf),

    #[error("--copy-directory-tree requires --output-directory")]
    MirrorTreeWithoutOutput,

    #[error("path '{}' cannot be written", .0.display())]
    NotWritable(PathBuf),

    #[error("--verbose and --silent cannot be used together")]
    ConflictingVerbosity,
}

impl ConfigError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConfigError::NoInput | ConfigError::InputNotFound(_) => 2,
            ConfigError::OutputNotDirectory(_) => 3,
            ConfigError::MirrorTreeWithoutOutput => 4,
            ConfigError::NotWritable(_) => 5,
            ConfigError::ConflictingVerbosity => 6,
        }
    }
}
