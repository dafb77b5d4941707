//! Error types for the copy engine.
//!
//! The primary error type is `EngineError`. Only a handful of variants stop a
//! job outright (`InvalidJob`, `JobAlreadyRunning`, `WorkerSpawnFailed`).
//! Per-file errors are reported as [`FileFailure`] diagnostics and the job
//! continues.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

/// Errors produced by the engine and its filesystem helpers.
///
/// EngineError wraps io::Error and is therefore not serializable. Per-file
/// failures are converted into [`FileFailure`] before they leave the worker.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The job request is malformed; nothing was touched
    #[error("Invalid job: {reason}")]
    InvalidJob { reason: String },

    /// Overwrite policy string did not name a known policy
    #[error("Invalid overwrite policy '{value}'. Must be 'none', 'larger', 'newer', or 'either'")]
    InvalidPolicy { value: String },

    /// Another job is still running on this engine instance
    #[error("A job is already running on this engine")]
    JobAlreadyRunning,

    /// The worker thread could not be started
    #[error("Failed to start copy worker: {source}")]
    WorkerSpawnFailed { source: io::Error },

    /// The worker thread panicked before finishing the job
    #[error("Copy worker terminated unexpectedly")]
    WorkerPanicked,

    /// A source entry could not be enumerated
    #[error("Failed to enumerate {}: {source}", path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Free space could not be queried for a path
    #[error("Filesystem unavailable for {}: {source}", path.display())]
    FilesystemUnavailable { path: PathBuf, source: io::Error },

    /// A destination directory could not be created
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to read from a source file
    #[error("Failed to read file {}: {source}", path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to a destination file
    #[error("Failed to write file {}: {source}", path.display())]
    WriteError { path: PathBuf, source: io::Error },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::WorkerSpawnFailed { source }
            | Self::EnumerationFailed { source, .. }
            | Self::FilesystemUnavailable { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    pub(crate) fn invalid_job(reason: impl Into<String>) -> Self {
        EngineError::InvalidJob {
            reason: reason.into(),
        }
    }
}

/// What went wrong with a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The destination's parent directory could not be created
    DestinationCreate,
    /// Reading the source or writing the destination failed
    CopyWrite,
}

/// A non-fatal, per-file failure reported on the diagnostic stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
    pub os_error: Option<i32>,
}

impl FileFailure {
    pub(crate) fn new(
        source_path: PathBuf,
        destination_path: PathBuf,
        error: &EngineError,
    ) -> Self {
        let kind = match error {
            EngineError::DirectoryCreationFailed { .. } => FailureKind::DestinationCreate,
            _ => FailureKind::CopyWrite,
        };

        FileFailure {
            source_path,
            destination_path,
            kind,
            message: error.to_string(),
            os_error: error.raw_os_error(),
        }
    }
}
