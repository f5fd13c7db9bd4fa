use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::request::{AudioSource, RenderRequest};
use crate::config::Config;
use crate::error::PipelineError;
use crate::media::{Compositor, CompositorSettings, Fetcher, RenderJob, WorkDir};
use crate::upload::{HttpFileHost, UploadResult, VideoHost};

/// Where a render request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Fetching,
    Rendering,
    Uploading,
    CleaningUp,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Fetching => "fetching",
            Stage::Rendering => "rendering",
            Stage::Uploading => "uploading",
            Stage::CleaningUp => "cleaning-up",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// Fetch -> render -> upload -> cleanup, shared by every route
pub struct RenderPipeline {
    fetcher: Fetcher,
    compositor: Compositor,
    host: Arc<dyn VideoHost>,
    work_root: PathBuf,
    default_title: String,
}

impl RenderPipeline {
    pub fn new(
        fetcher: Fetcher,
        compositor: Compositor,
        host: Arc<dyn VideoHost>,
        work_root: impl Into<PathBuf>,
        default_title: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            compositor,
            host,
            work_root: work_root.into(),
            default_title: default_title.into(),
        }
    }

    /// Wire up the pipeline with the HTTP file host from configuration
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let fetcher = Fetcher::new(client.clone(), cfg.fetch.max_download_bytes);
        let compositor = Compositor::new(CompositorSettings::from(&cfg.render));
        let host = Arc::new(HttpFileHost::new(client, &cfg.upload));

        Ok(Self::new(
            fetcher,
            compositor,
            host,
            cfg.render.work_dir.clone(),
            cfg.render.default_title.clone(),
        ))
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Create the scoped work directory for one request
    pub async fn open_workdir(&self) -> Result<WorkDir, PipelineError> {
        WorkDir::create(&self.work_root).await
    }

    /// Run `request` to completion inside `workdir`.
    ///
    /// The work directory is always removed before returning, whether or not
    /// the render succeeded.
    pub async fn run(
        &self,
        workdir: WorkDir,
        request: RenderRequest,
    ) -> Result<UploadResult, PipelineError> {
        let render_id = workdir.id().to_string();
        let mut stage = Stage::Validating;

        let outcome = self.execute(&workdir, &request, &mut stage).await;

        if let Err(e) = &outcome {
            warn!("Render {} failed while {}: {}", render_id, stage, e);
        }

        debug!("Render {}: {}", render_id, Stage::CleaningUp);
        workdir.close().await;

        if outcome.is_ok() {
            info!("Render {} complete", render_id);
        }
        outcome
    }

    async fn execute(
        &self,
        workdir: &WorkDir,
        request: &RenderRequest,
        stage: &mut Stage,
    ) -> Result<UploadResult, PipelineError> {
        let render_id = workdir.id();

        debug!("Render {}: {}", render_id, stage);
        request.validate()?;

        *stage = Stage::Fetching;
        debug!("Render {}: {}", render_id, stage);
        let audio = match &request.audio {
            AudioSource::Remote(url) => {
                let dest = workdir.audio_path();
                self.fetcher.fetch(url, &dest).await?;
                dest
            }
            AudioSource::Uploaded(path) => path.clone(),
        };
        let image = workdir.image_path();
        self.fetcher.fetch(&request.image_url, &image).await?;

        *stage = Stage::Rendering;
        debug!("Render {}: {}", render_id, stage);
        let job = RenderJob {
            image,
            audio,
            caption: request.caption(&self.default_title).to_string(),
            output: workdir.video_path(),
        };
        self.compositor.render(&job).await?;

        *stage = Stage::Uploading;
        debug!("Render {}: {} via {}", render_id, stage, self.host.name());
        let result = self.host.publish(&job.output).await?;

        Ok(result)
    }
}
