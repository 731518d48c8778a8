//! Error types for appforge
//!
//! Shared infrastructure error types using thiserror. Domain errors that
//! belong to a single module (resolve, build, pipeline stages) live next to
//! the code that produces them.

use std::path::PathBuf;
use thiserror::Error;

/// Subprocess invocation errors
///
/// A command that *ran* and exited non-zero is not a [`ProcessError`]; the
/// exit status is data and is reported by the caller. This type covers the
/// cases where no status could be observed at all.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The command could not be spawned
    #[error("Failed to spawn '{command}': {error}")]
    Spawn { command: String, error: String },

    /// The command produced output that was not valid UTF-8
    #[error("Output of '{command}' is not valid UTF-8")]
    InvalidOutput { command: String },
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// Checksum verification failed
    #[error("Checksum verification failed for '{file}'")]
    ChecksumFailed { file: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to copy a file or tree
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}
