//! One capture cycle: grab a frame into staging, upload it, drop the local copy.

use std::sync::Arc;

use async_trait::async_trait;
use lapse_scheduler::{BoxError, JobAction};
use tracing::info;

use crate::{
    error::{CaptureError, CycleError, UploadError},
    frame::FrameSource,
    staging::{StagedFile, Staging},
    upload::UploadSink,
};

pub struct CaptureTask {
    source: Arc<dyn FrameSource>,
    sink: Arc<dyn UploadSink>,
    staging: Staging,
    folder: String,
}

impl CaptureTask {
    pub fn new(
        source: Arc<dyn FrameSource>,
        sink: Arc<dyn UploadSink>,
        staging: Staging,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            source,
            sink,
            staging,
            folder: folder.into(),
        }
    }

    /// Run one capture-upload cycle and return the stored frame's locator.
    ///
    /// The staged file is removed on every exit path, including upload
    /// failure. There is no retry within a cycle.
    pub async fn capture_once(&self) -> Result<String, CycleError> {
        self.staging.ensure().await.map_err(CaptureError::Io)?;

        let staged = StagedFile::new(self.staging.artifact_path(&chrono::Local::now()));
        let outcome = self.deliver(staged.path()).await;
        staged.discard().await;
        let locator = outcome?;

        info!(
            source = self.source.name(),
            sink = self.sink.name(),
            %locator,
            "capture uploaded"
        );
        Ok(locator)
    }

    async fn deliver(&self, path: &std::path::Path) -> Result<String, CycleError> {
        self.source.capture_to(path).await?;
        Ok(self.sink.store(path, &self.folder).await?)
    }

    /// Read-through listing of every stored capture.
    pub async fn list_captures(&self) -> Result<Vec<String>, UploadError> {
        self.sink.list(&self.folder).await
    }
}

#[async_trait]
impl JobAction for CaptureTask {
    async fn run(&self) -> Result<(), BoxError> {
        self.capture_once().await?;
        Ok(())
    }
}
