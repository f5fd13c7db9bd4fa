// Shared fixtures for integration tests
//
// - An in-process HTTP server standing in for both the media CDN and the
//   video host.
// - Stub encoder scripts standing in for ffmpeg.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Path as UrlPath, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use reel_render::config::{UploadConfig, DEFAULT_LINK_FIELDS};
use reel_render::{Compositor, CompositorSettings, Fetcher, HttpFileHost, RenderPipeline};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IMAGE_BYTES: &[u8] = b"IMG";

#[derive(Clone, Default)]
pub struct HostState {
    /// Bodies of every file received by the upload endpoint
    pub uploads: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Number of media downloads served
    pub downloads: Arc<AtomicUsize>,
}

pub struct FakeHost {
    pub base_url: String,
    pub state: HostState,
}

impl FakeHost {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> usize {
        self.state.downloads.load(Ordering::SeqCst)
    }

    pub fn upload_config(&self, path: &str) -> UploadConfig {
        UploadConfig {
            endpoint: self.url(path),
            file_field: "file".to_string(),
            link_fields: DEFAULT_LINK_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

async fn audio(State(state): State<HostState>, UrlPath(id): UrlPath<String>) -> impl IntoResponse {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    format!("audio-{}", id).into_bytes()
}

async fn image(State(state): State<HostState>) -> impl IntoResponse {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    IMAGE_BYTES.to_vec()
}

async fn missing(State(state): State<HostState>) -> impl IntoResponse {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "no such media")
}

async fn receive_file(state: &HostState, mut multipart: Multipart) -> Option<usize> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.ok()?;
            let mut uploads = state.uploads.lock().unwrap();
            uploads.push(bytes.to_vec());
            return Some(uploads.len());
        }
    }
    None
}

async fn upload_ok(State(state): State<HostState>, multipart: Multipart) -> impl IntoResponse {
    match receive_file(&state, multipart).await {
        Some(n) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "data": { "downloadPage": format!("https://files.example/d/{}", n), "code": n }
            })),
        ),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error-noFile" })),
        ),
    }
}

async fn upload_no_link(State(state): State<HostState>, multipart: Multipart) -> impl IntoResponse {
    receive_file(&state, multipart).await;
    Json(json!({ "status": "ok", "data": { "code": "abc" } }))
}

async fn upload_rejected(State(state): State<HostState>, multipart: Multipart) -> impl IntoResponse {
    receive_file(&state, multipart).await;
    Json(json!({ "status": "error-notPremium", "data": {} }))
}

async fn upload_unavailable() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "maintenance")
}

/// Start the fake CDN + host on an ephemeral port
pub async fn spawn_fake_host() -> FakeHost {
    let state = HostState::default();

    let app = Router::new()
        .route("/media/audio/:id", get(audio))
        .route("/media/image.jpg", get(image))
        .route("/media/missing.jpg", get(missing))
        .route("/uploadFile", post(upload_ok))
        .route("/upload-no-link", post(upload_no_link))
        .route("/upload-rejected", post(upload_rejected))
        .route("/upload-unavailable", post(upload_unavailable))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeHost {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// Write an executable `/bin/sh` script
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Encoder stub: concatenates its `-i` inputs into the output (last argument)
pub fn concat_encoder(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "concat-encoder.sh",
        r#"for out in "$@"; do :; done
: > "$out"
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then cat "$arg" >> "$out"; fi
  prev="$arg"
done"#,
    )
}

/// Encoder stub: prints a diagnostic and fails
pub fn failing_encoder(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "failing-encoder.sh",
        r#"echo "image.jpg: Invalid data found when processing input" >&2
exit 1"#,
    )
}

pub fn encoder_settings(program: &Path) -> CompositorSettings {
    CompositorSettings {
        ffmpeg_path: program.display().to_string(),
        timeout: Duration::from_secs(10),
        max_concurrent: 2,
        ..CompositorSettings::default()
    }
}

/// Pipeline wired to the fake host and a stub encoder
pub fn pipeline(host: &FakeHost, encoder: &Path, upload_path: &str, work_root: &Path) -> RenderPipeline {
    let client = reqwest::Client::new();
    RenderPipeline::new(
        Fetcher::new(client.clone(), 1024 * 1024),
        Compositor::new(encoder_settings(encoder)),
        Arc::new(HttpFileHost::new(client, &host.upload_config(upload_path))),
        work_root,
        "Notícia do Dia",
    )
}

/// Entries left under the work root (0 when it was never created)
pub fn leftover_entries(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
