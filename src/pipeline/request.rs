use std::path::PathBuf;

use crate::error::PipelineError;

/// Where the audio track of a render comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Download from this URL
    Remote(String),
    /// Already written to this local path (inside the request's work directory)
    Uploaded(PathBuf),
}

/// One render: audio + still image + caption
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub audio: AudioSource,
    pub image_url: String,
    /// Caption text; `None` or blank uses the configured default
    pub title: Option<String>,
}

impl RenderRequest {
    pub fn remote(audio_url: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            audio: AudioSource::Remote(audio_url.into()),
            image_url: image_url.into(),
            title: None,
        }
    }

    pub fn uploaded(audio_path: impl Into<PathBuf>, image_url: impl Into<String>) -> Self {
        Self {
            audio: AudioSource::Uploaded(audio_path.into()),
            image_url: image_url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Check required inputs before any network or encoder work
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let AudioSource::Remote(url) = &self.audio {
            if url.trim().is_empty() {
                return Err(PipelineError::validation("audioUrl is required"));
            }
        }
        if self.image_url.trim().is_empty() {
            return Err(PipelineError::validation("imageUrl is required"));
        }
        if self.title.as_deref().is_some_and(|t| t.contains('\0')) {
            return Err(PipelineError::validation("title must not contain NUL characters"));
        }
        Ok(())
    }

    /// Caption to burn in, falling back to `default` when no title was given
    pub fn caption<'a>(&'a self, default: &'a str) -> &'a str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => default,
        }
    }
}
