//! The remote store seam.

use std::path::Path;

use async_trait::async_trait;

use crate::error::UploadError;

/// Stores blobs under a folder key and hands back durable locators (URLs).
#[async_trait]
pub trait UploadSink: Send + Sync {
    fn name(&self) -> &str;

    /// Upload the file at `local_path` under `folder`; returns its URL.
    async fn store(&self, local_path: &Path, folder: &str) -> Result<String, UploadError>;

    /// Every URL previously stored under `folder`, in store-defined order.
    async fn list(&self, folder: &str) -> Result<Vec<String>, UploadError>;
}

/// Placeholder sink when no remote store credentials are available.
pub struct NullSink;

#[async_trait]
impl UploadSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn store(&self, _local_path: &Path, _folder: &str) -> Result<String, UploadError> {
        Err(UploadError::NotConfigured)
    }

    async fn list(&self, _folder: &str) -> Result<Vec<String>, UploadError> {
        Err(UploadError::NotConfigured)
    }
}
