//! Error types for dir-sizer
//!
//! This module defines the error hierarchy for a size run:
//! - Filesystem errors raised by a `FileSystem` view (listing, stat)
//! - Cancellation and deadline interrupts
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Every error that reaches the fault slot is terminal for the whole run.
//! There are no retries and no recoverable variants.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a size run
#[derive(Error, Debug)]
pub enum SizerError {
    /// Listing or stat failure reported by the filesystem view
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// The caller cancelled the run
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller-supplied deadline expired mid-run
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl SizerError {
    /// Returns true if this error came from a cancellation signal or deadline
    pub fn is_interrupt(&self) -> bool {
        matches!(self, SizerError::Cancelled | SizerError::DeadlineExceeded)
    }
}

/// Errors raised by a filesystem view
#[derive(Error, Debug)]
pub enum FsError {
    /// Directory listing failed
    #[error("Failed to read directory '{path}': {source}")]
    ListFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Stat operation failed
    #[error("Failed to stat '{path}': {source}")]
    StatFailed {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Build a listing failure for a path-like handle
    pub fn list(path: impl Into<String>, source: io::Error) -> Self {
        FsError::ListFailed {
            path: path.into(),
            source,
        }
    }

    /// Build a stat failure for a path-like handle
    pub fn stat(path: impl Into<String>, source: io::Error) -> Self {
        FsError::StatFailed {
            path: path.into(),
            source,
        }
    }

    /// Path of the entry that failed
    pub fn path(&self) -> &str {
        match self {
            FsError::ListFailed { path, .. } => path,
            FsError::StatFailed { path, .. } => path,
        }
    }

    /// Underlying I/O error kind
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::ListFailed { source, .. } => source.kind(),
            FsError::StatFailed { source, .. } => source.kind(),
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid concurrency budget
    #[error("Invalid concurrency budget {budget}: must be between 1 and {max}")]
    InvalidBudget { budget: usize, max: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Root path missing or not a directory
    #[error("Invalid root '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Timeout of zero seconds
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("{role} {id} panicked: {message}")]
    Panicked {
        role: &'static str,
        id: usize,
        message: String,
    },

    /// Thread could not be started
    #[error("Failed to start {role} {id}: {reason}")]
    InitFailed {
        role: &'static str,
        id: usize,
        reason: String,
    },
}

/// Result type alias for SizerError
pub type Result<T> = std::result::Result<T, SizerError>;

/// Result type alias for FsError
pub type FsResult<T> = std::result::Result<T, FsError>;
