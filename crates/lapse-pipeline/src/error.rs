//! Error types for the capture pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// A frame could not be produced.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture command could not be started.
    #[error("Capture command spawn failed: {0}")]
    Spawn(std::io::Error),

    /// The capture command exited unsuccessfully.
    #[error("Capture command failed ({status}): {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// The capture did not finish within its time budget.
    #[error("Capture timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The capture reported success but left no frame behind.
    #[error("Capture produced no output at {}", path.display())]
    NoOutput { path: PathBuf },

    /// In-process screen grab failed.
    #[error("Screen grab failed: {0}")]
    Screen(String),

    #[error("No monitor found")]
    NoMonitor,

    /// Staging directory or frame write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The remote store rejected a request or could not be reached.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No remote store credentials were configured.
    #[error("Remote store is not configured")]
    NotConfigured,

    #[error("Remote store unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected remote store response: {0}")]
    InvalidResponse(String),

    /// The staged file could not be read for upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The staging directory could not be purged or recreated.
#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to recreate {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure of a single capture-upload cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}
