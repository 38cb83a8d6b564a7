use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BulkzError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("No valid files to process")]
    NoValidFiles,

    #[error("{0} codec is not available in this build")]
    CodecUnavailable(&'static str),

    #[error("{0} digest is not available in this build")]
    DigestUnavailable(&'static str),

    #[error("Interrupted after {completed} of {total} files")]
    Interrupted { completed: usize, total: usize },

    #[error("Worker pool error: {0}")]
    Pool(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, BulkzError>;
