use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::link::extract_link;
use crate::config::UploadConfig;

/// Longest response body excerpt carried in an error
const MAX_BODY_EXCERPT: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload failed ({status}): {body}")]
    Status { status: StatusCode, body: String },

    #[error("upload rejected by host (status '{0}')")]
    Rejected(String),

    #[error("host returned an unparseable response: {0}")]
    InvalidResponse(String),

    #[error("host response has no link (tried {})", .tried.join(", "))]
    MissingLink { tried: Vec<String> },
}

/// Where the finished video ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub public_url: String,
}

/// A remote host that makes a local video publicly downloadable
#[async_trait::async_trait]
pub trait VideoHost: Send + Sync {
    /// Upload the file at `path` and return its public link
    async fn publish(&self, path: &Path) -> Result<UploadResult, UploadError>;

    /// Host name for logging
    fn name(&self) -> &str;
}

/// Multipart upload to a GoFile-style endpoint
#[derive(Debug, Clone)]
pub struct HttpFileHost {
    client: Client,
    endpoint: String,
    file_field: String,
    link_fields: Vec<String>,
}

impl HttpFileHost {
    pub fn new(client: Client, config: &UploadConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            file_field: config.file_field.clone(),
            link_fields: config.link_fields.clone(),
        }
    }

    fn parse_response(&self, body: &str) -> Result<UploadResult, UploadError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| UploadError::InvalidResponse(format!("{}: {}", e, excerpt(body))))?;

        if let Some(status) = value.get("status").and_then(Value::as_str) {
            if status != "ok" {
                return Err(UploadError::Rejected(status.to_string()));
            }
        }

        extract_link(&value, &self.link_fields)
            .map(|public_url| UploadResult { public_url })
            .ok_or_else(|| UploadError::MissingLink {
                tried: self.link_fields.clone(),
            })
    }
}

#[async_trait::async_trait]
impl VideoHost for HttpFileHost {
    async fn publish(&self, path: &Path) -> Result<UploadResult, UploadError> {
        let io_err = |source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        debug!("Uploading {} ({} bytes) to {}", path.display(), len, self.endpoint);

        let part = Part::stream_with_length(Body::from(file), len)
            .file_name(file_name)
            .mime_str("video/mp4")?;
        let form = Form::new().part(self.file_field.clone(), part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(UploadError::Status {
                status,
                body: excerpt(&body),
            });
        }

        let result = self.parse_response(&body)?;
        info!("Uploaded {} -> {}", path.display(), result.public_url);

        Ok(result)
    }

    fn name(&self) -> &str {
        "http-file-host"
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
