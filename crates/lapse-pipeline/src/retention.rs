//! Daily purge of the local staging directory.

use async_trait::async_trait;
use lapse_scheduler::{BoxError, JobAction};
use tracing::info;

use crate::{error::RetentionError, staging::Staging};

/// Wipes the staging directory and recreates it empty, reclaiming any frame
/// that escaped per-capture cleanup. Never touches remote assets.
pub struct RetentionTask {
    staging: Staging,
}

impl RetentionTask {
    pub fn new(staging: Staging) -> Self {
        Self { staging }
    }

    /// Purge staging. Returns how many top-level entries were removed.
    pub async fn purge(&self) -> Result<usize, RetentionError> {
        let dir = self.staging.dir();
        let removed = count_entries(dir).await;

        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RetentionError::Remove {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| RetentionError::Create {
                path: dir.to_path_buf(),
                source,
            })?;

        info!(dir = %dir.display(), removed, "staging directory purged");
        Ok(removed)
    }
}

async fn count_entries(dir: &std::path::Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut n = 0;
    while let Ok(Some(_)) = entries.next_entry().await {
        n += 1;
    }
    n
}

#[async_trait]
impl JobAction for RetentionTask {
    async fn run(&self) -> Result<(), BoxError> {
        self.purge().await?;
        Ok(())
    }
}
