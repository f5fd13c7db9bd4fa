use super::request_id::RequestId;
use super::state::AppState;
use crate::error::PipelineError;
use crate::media::WorkDir;
use crate::pipeline::{RenderRequest, Stage};
use crate::upload::UploadResult;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Extension, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /render`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBody {
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    /// Caption; the configured default is used when absent
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenderResponse {
    pub status: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn respond(outcome: Result<UploadResult, PipelineError>) -> Response {
    debug!("{}", Stage::Responding);
    match outcome {
        Ok(result) => (
            StatusCode::OK,
            Json(RenderResponse {
                status: "ok".to_string(),
                url: result.public_url,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Run the pipeline on its own task so a client disconnect (which drops the
/// handler future) cannot abort a render halfway through.
async fn run_detached(
    state: &AppState,
    request_id: &RequestId,
    workdir: WorkDir,
    request: RenderRequest,
) -> Result<UploadResult, PipelineError> {
    info!("Request {} rendering in {}", request_id.0, workdir.id());
    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move { pipeline.run(workdir, request).await }).await?
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
/// Service status
pub async fn status() -> impl IntoResponse {
    Json(StatusResponse {
        status: "online".to_string(),
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// POST /render
/// Render a video from an audio URL and an image URL
pub async fn render(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<RenderBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected render body: {}", rejection.body_text());
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return error_response(status, rejection.body_text());
        }
    };

    let (audio_url, image_url) = match (non_blank(body.audio_url), non_blank(body.image_url)) {
        (Some(audio_url), Some(image_url)) => (audio_url, image_url),
        _ => {
            return PipelineError::validation("audioUrl and imageUrl are required").into_response()
        }
    };

    let request = RenderRequest::remote(audio_url, image_url).with_title(body.title);

    let workdir = match state.pipeline.open_workdir().await {
        Ok(dir) => dir,
        Err(e) => return e.into_response(),
    };

    respond(run_detached(&state, &request_id, workdir, request).await)
}

/// POST /render-upload (also /upload)
/// Render a video from an uploaded audio file and an image URL
pub async fn render_upload(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            warn!("Rejected multipart request: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let workdir = match state.pipeline.open_workdir().await {
        Ok(dir) => dir,
        Err(e) => return e.into_response(),
    };

    let form = match read_upload_form(&mut multipart, &workdir).await {
        Ok(form) => form,
        Err(e) => {
            workdir.close().await;
            return e.into_response();
        }
    };

    let (audio, image_url) = match (form.audio, non_blank(form.image_url)) {
        (Some(audio), Some(image_url)) => (audio, image_url),
        _ => {
            workdir.close().await;
            return PipelineError::validation("audio (file) and imageUrl are required")
                .into_response();
        }
    };

    let request = RenderRequest::uploaded(audio, image_url).with_title(form.title);

    respond(run_detached(&state, &request_id, workdir, request).await)
}

// ============================================================================
// Multipart
// ============================================================================

#[derive(Debug, Default)]
struct UploadForm {
    audio: Option<PathBuf>,
    image_url: Option<String>,
    title: Option<String>,
}

/// Read the upload form, streaming the `audio` part into the work directory
async fn read_upload_form(
    multipart: &mut Multipart,
    workdir: &WorkDir,
) -> Result<UploadForm, PipelineError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some("audio") => {
                if let Some(content_type) = field.content_type() {
                    if !is_accepted_audio_type(content_type) {
                        return Err(PipelineError::UnsupportedMedia(content_type.to_string()));
                    }
                }

                // A later `audio` part replaces an earlier one
                form.audio = None;
                let dest = workdir.audio_path();
                let io_err = |source| PipelineError::Workspace {
                    path: dest.clone(),
                    source,
                };

                let mut file = tokio::fs::File::create(&dest).await.map_err(io_err)?;
                let mut written: u64 = 0;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    written += chunk.len() as u64;
                    file.write_all(&chunk).await.map_err(io_err)?;
                }
                file.flush().await.map_err(io_err)?;

                debug!("Received audio upload ({} bytes)", written);
                if written > 0 {
                    form.audio = Some(dest);
                }
            }
            Some("imageUrl") => {
                form.image_url = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("title") => {
                form.title = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                debug!("Ignoring multipart field {:?}", other);
            }
        }
    }

    Ok(form)
}

fn is_accepted_audio_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("audio/")
        || essence.starts_with("video/")
        || essence == "application/octet-stream"
}

fn multipart_error(e: MultipartError) -> PipelineError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::PayloadTooLarge(e.body_text())
    } else {
        PipelineError::validation(format!("invalid multipart body: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_audio_types() {
        assert!(is_accepted_audio_type("audio/mpeg"));
        assert!(is_accepted_audio_type("Audio/Wav; charset=binary"));
        assert!(is_accepted_audio_type("video/mp4"));
        assert!(is_accepted_audio_type("application/octet-stream"));
        assert!(!is_accepted_audio_type("text/plain"));
        assert!(!is_accepted_audio_type("image/jpeg"));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some(" x ".into())), Some(" x ".into()));
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_render_body_uses_camel_case() {
        let body: RenderBody = serde_json::from_str(
            r#"{"audioUrl":"https://a/x.mp3","imageUrl":"https://a/y.jpg","title":"T"}"#,
        )
        .unwrap();
        assert_eq!(body.audio_url.as_deref(), Some("https://a/x.mp3"));
        assert_eq!(body.image_url.as_deref(), Some("https://a/y.jpg"));
        assert_eq!(body.title.as_deref(), Some("T"));
    }
}
