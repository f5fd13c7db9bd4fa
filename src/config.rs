use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default GoFile-compatible upload endpoint
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://store1.gofile.io/uploadFile";

/// Response fields that have carried the public link across host API versions
pub const DEFAULT_LINK_FIELDS: &[&str] = &[
    "data.directLink",
    "data.downloadPage",
    "data.link",
    "data.url",
    "directLink",
    "downloadPage",
    "link",
    "url",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub render: RenderConfig,
    pub fetch: FetchConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Max body size for `POST /render` (JSON)
    pub json_body_bytes: usize,
    /// Max body size for multipart audio uploads
    pub upload_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub ffmpeg_path: String,
    pub font_file: String,
    pub timeout_secs: u64,
    pub max_concurrent_encodes: usize,
    /// Parent directory for per-request work directories
    pub work_dir: PathBuf,
    /// Caption used when a request has no title
    pub default_title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub max_download_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub endpoint: String,
    pub file_field: String,
    pub link_fields: Vec<String>,
}

impl Config {
    /// Load configuration from built-in defaults, an optional file at `path`,
    /// `REEL__*` environment variables, and finally `PORT`.
    pub fn load(path: &str) -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => Some(
                raw.parse::<u16>()
                    .with_context(|| format!("Invalid PORT value: {}", raw))?,
            ),
            Err(_) => None,
        };

        let mut builder = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("REEL").separator("__"));

        if let Some(port) = port {
            builder = builder.set_override("service.http.port", i64::from(port))?;
        }

        let settings = builder.build().context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Configuration built from defaults only (no file, no environment)
    pub fn from_defaults() -> Result<Self> {
        let settings = Self::defaults()?.build()?;
        Ok(settings.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let work_dir = std::env::temp_dir().join("reel-render");
        let link_fields: Vec<String> = DEFAULT_LINK_FIELDS.iter().map(|f| f.to_string()).collect();

        let builder = config::Config::builder()
            .set_default("service.name", "reel-render")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8080)?
            .set_default("service.limits.json_body_bytes", 20 * 1024 * 1024)?
            .set_default("service.limits.upload_body_bytes", 50 * 1024 * 1024)?
            .set_default("render.ffmpeg_path", "ffmpeg")?
            .set_default(
                "render.font_file",
                "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            )?
            .set_default("render.timeout_secs", 120)?
            .set_default("render.max_concurrent_encodes", 2)?
            .set_default("render.work_dir", work_dir.display().to_string())?
            .set_default("render.default_title", "Notícia do Dia")?
            .set_default("fetch.max_download_bytes", 100 * 1024 * 1024)?
            .set_default("upload.endpoint", DEFAULT_UPLOAD_ENDPOINT)?
            .set_default("upload.file_field", "file")?
            .set_default("upload.link_fields", link_fields)?;

        Ok(builder)
    }
}
