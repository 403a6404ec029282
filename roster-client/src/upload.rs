//! Blob host upload client
//!
//! Posts a multipart form (`file`, `upload_preset`, `cloud_name`, `folder`,
//! `tags`) and returns the host's permanent `secure_url`. No retries: a
//! failed upload is reported to the caller as-is.

use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;

use crate::config::BlobHostConfig;
use crate::error::UploadError;
use shared::models::PendingAsset;

/// Uploads binary assets and returns a stable retrieval URL
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, asset: &PendingAsset, tags: &[&str]) -> Result<String, UploadError>;
}

#[derive(Deserialize)]
struct UploadSuccess {
    secure_url: String,
}

#[derive(Deserialize)]
struct UploadFailure {
    error: UploadFailureDetail,
}

#[derive(Deserialize)]
struct UploadFailureDetail {
    message: String,
}

/// HTTP client for the blob host
#[derive(Debug, Clone)]
pub struct BlobHostClient {
    client: Client,
    config: BlobHostConfig,
}

impl BlobHostClient {
    pub fn new(config: BlobHostConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Reuse an existing reqwest client (shared connection pool)
    pub fn with_client(client: Client, config: BlobHostConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &BlobHostConfig {
        &self.config
    }

    fn form(&self, asset: &PendingAsset, tags: &[&str]) -> Result<multipart::Form, UploadError> {
        let file = multipart::Part::bytes(asset.bytes.clone())
            .file_name(asset.file_name.clone())
            .mime_str(&asset.content_type)
            .map_err(|e| UploadError::network(format!("invalid content type: {}", e)))?;

        Ok(multipart::Form::new()
            .part("file", file)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("cloud_name", self.config.cloud_name.clone())
            .text("folder", self.config.folder.clone())
            .text("tags", tags.join(",")))
    }

    /// Map the host response to a URL or an [`UploadError`]
    async fn handle_response(response: reqwest::Response) -> Result<String, UploadError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<UploadFailure>(&text)
                .map(|f| f.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("upload rejected")
                        .to_string()
                });
            return Err(UploadError::http(status.as_u16(), message));
        }

        serde_json::from_str::<UploadSuccess>(&text)
            .map(|s| s.secure_url)
            .map_err(|e| {
                UploadError::http(status.as_u16(), format!("missing secure_url in response: {}", e))
            })
    }
}

#[async_trait]
impl AssetUploader for BlobHostClient {
    async fn upload(&self, asset: &PendingAsset, tags: &[&str]) -> Result<String, UploadError> {
        let url = self.config.upload_url();
        let form = self.form(asset, tags)?;

        tracing::debug!(file = %asset.file_name, size = asset.bytes.len(), "Uploading asset");
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::network(e.to_string()))?;

        let result = Self::handle_response(response).await;
        match &result {
            Ok(secure_url) => tracing::info!(file = %asset.file_name, url = %secure_url, "Asset uploaded"),
            Err(e) => tracing::warn!(file = %asset.file_name, error = %e, "Asset upload failed"),
        }
        result
    }
}
