use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PipelineError;

const AUDIO_FILE: &str = "audio.mpga";
const IMAGE_FILE: &str = "image.jpg";
const VIDEO_FILE: &str = "video.mp4";

/// Scoped working directory for a single render request
///
/// Holds the audio, image and output video for one request. The directory is
/// removed by [`WorkDir::close`], or on drop if `close` was never reached.
#[derive(Debug)]
pub struct WorkDir {
    id: String,
    path: PathBuf,
    released: bool,
}

impl WorkDir {
    /// Create a fresh directory under `root`
    ///
    /// The leaf is created non-recursively, so an existing directory with the
    /// same name is an error rather than a shared workspace.
    pub async fn create(root: &Path) -> Result<Self, PipelineError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: root.to_path_buf(),
                source,
            })?;

        let id = format!(
            "render-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            uuid::Uuid::new_v4().simple()
        );
        let path = root.join(&id);

        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: path.clone(),
                source,
            })?;

        debug!("Created work directory {}", path.display());

        Ok(Self {
            id,
            path,
            released: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn audio_path(&self) -> PathBuf {
        self.path.join(AUDIO_FILE)
    }

    pub fn image_path(&self) -> PathBuf {
        self.path.join(IMAGE_FILE)
    }

    pub fn video_path(&self) -> PathBuf {
        self.path.join(VIDEO_FILE)
    }

    /// Remove the directory and everything in it. Errors are swallowed.
    pub async fn close(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            debug!("Failed to remove work directory {}: {}", self.path.display(), e);
        }
        self.released = true;
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            debug!("Failed to remove work directory {}: {}", self.path.display(), e);
        }
    }
}
