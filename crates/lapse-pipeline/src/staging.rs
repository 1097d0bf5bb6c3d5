//! Local staging area for frames between grab and upload.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::{debug, warn};

/// The staging directory (`media/` by default).
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Path for a frame captured at `at`.
    pub fn artifact_path<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        self.dir.join(artifact_name(at))
    }
}

/// Timestamp-derived file name, microsecond resolution so tight intervals
/// never collide: `screenshot-20261015-234200-123456.png`.
pub fn artifact_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("screenshot-{}.png", at.format("%Y%m%d-%H%M%S-%6f"))
}

/// Owns one staged file and deletes it when dropped.
///
/// Deletion failures are logged, never propagated. A file that was never
/// written (or already wiped by retention) is not an error.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    removed: bool,
}

impl StagedFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file on the async runtime. `Drop` covers paths that never
    /// get here, such as a panic mid-cycle.
    pub async fn discard(mut self) {
        log_removal(&self.path, tokio::fs::remove_file(&self.path).await);
        self.removed = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        // Blocking, but a single small unlink on an unwinding path.
        log_removal(&self.path, std::fs::remove_file(&self.path));
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "staged file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged file"),
    }
}
