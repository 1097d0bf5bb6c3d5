//! Cloudinary-backed [`UploadSink`].
//!
//! Uploads use the signed upload API (`POST /v1_1/{cloud}/image/upload`) with a
//! SHA-256 request signature; listings use the Admin API
//! (`GET /v1_1/{cloud}/resources/image/upload`) with HTTP basic auth and follow
//! `next_cursor` until the full set has been read.

use std::path::Path;

use async_trait::async_trait;
use lapse_core::config::CloudinaryConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{error::UploadError, upload::UploadSink};

/// Admin API page size cap.
const PAGE_SIZE: u32 = 500;

pub struct CloudinarySink {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl CloudinarySink {
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1_1/{}/{}", self.base_url, self.cloud_name, path)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct ResourcePage {
    #[serde(default)]
    resources: Vec<Resource>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Resource {
    secure_url: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Deserialize)]
struct ApiErrorMessage {
    message: String,
}

#[async_trait]
impl UploadSink for CloudinarySink {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn store(&self, local_path: &Path, folder: &str) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture.png".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let file = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("folder", folder.to_string())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        debug!(path = %local_path.display(), %folder, "uploading to Cloudinary");
        let resp = self
            .client
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = read_json(resp).await?;
        Ok(uploaded.secure_url)
    }

    async fn list(&self, folder: &str) -> Result<Vec<String>, UploadError> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        let max_results = PAGE_SIZE.to_string();
        let mut urls = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> =
                vec![("prefix", prefix.as_str()), ("max_results", max_results.as_str())];
            if let Some(ref c) = cursor {
                query.push(("next_cursor", c.as_str()));
            }

            let resp = self
                .client
                .get(self.endpoint("resources/image/upload"))
                .basic_auth(&self.api_key, Some(&self.api_secret))
                .query(&query)
                .send()
                .await?;

            let page: ResourcePage = read_json(resp).await?;
            urls.extend(page.resources.into_iter().map(|r| r.secure_url));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(%folder, count = urls.len(), "listed Cloudinary resources");
        Ok(urls)
    }
}

/// Decode a success body, or turn an error status into [`UploadError::Rejected`].
async fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, UploadError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or(text);
        warn!(status = status.as_u16(), %message, "Cloudinary API error");
        return Err(UploadError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|e| UploadError::InvalidResponse(e.to_string()))
}

/// `key=value` pairs sorted by key and joined with `&`, the form Cloudinary signs.
fn string_to_sign(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex SHA-256 of the signing string with the API secret appended.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
