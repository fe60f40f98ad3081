use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UmbraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("{path}: missing required header field {field}")]
    MissingHeaderField { path: PathBuf, field: &'static str },

    #[error("Input root not found: {0}")]
    InputRootMissing(PathBuf),

    #[error("Library root not writable: {0}")]
    LibraryNotWritable(PathBuf),

    #[error("Staging failed: {0}")]
    StagingFailed(String),

    #[error("Stacking engine not found: {0}")]
    EngineNotFound(String),

    #[error("Stacking engine exited with status {0}")]
    EngineFailed(i32),

    #[error("Engine succeeded but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("Failed to write master header: {0}")]
    HeaderWriteFailed(String),
}

pub type Result<T> = std::result::Result<T, UmbraError>;
