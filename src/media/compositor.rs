use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;

/// Keep at most this much of the encoder's stderr in error reports
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to start encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder timed out after {}s", .limit.as_secs())]
    TimedOut { limit: Duration },

    #[error("encoder exited with {status}: {diagnostics}")]
    Failed {
        status: ExitStatus,
        diagnostics: String,
    },

    #[error("encoder produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("encoder admission closed")]
    Closed,
}

/// Fixed encoding settings for the vertical caption video
#[derive(Debug, Clone)]
pub struct CompositorSettings {
    pub ffmpeg_path: String,
    pub font_file: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
    pub audio_bitrate: String,
    pub font_size: u32,
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            font_file: "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string(),
            width: 1080,
            height: 1920,
            fps: 30,
            crf: 23,
            preset: "veryfast".to_string(),
            audio_bitrate: "128k".to_string(),
            font_size: 60,
            timeout: Duration::from_secs(120),
            max_concurrent: 2,
        }
    }
}

impl From<&RenderConfig> for CompositorSettings {
    fn from(cfg: &RenderConfig) -> Self {
        Self {
            ffmpeg_path: cfg.ffmpeg_path.clone(),
            font_file: cfg.font_file.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_concurrent: cfg.max_concurrent_encodes.max(1),
            ..Self::default()
        }
    }
}

/// Inputs and output of one encode
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub image: PathBuf,
    pub audio: PathBuf,
    pub caption: String,
    pub output: PathBuf,
}

/// Escape `text` for use as a drawtext option value inside a `-vf` filtergraph.
///
/// Two parsing levels apply. The drawtext option parser treats `\`, `'` and
/// `:` as special; the filtergraph parser additionally treats `,`, `;`, `[`
/// and `]` as special and sees the backslashes added by the first level.
/// Whitespace is escaped too so the token parser never trims it.
pub fn escape_caption(text: &str) -> String {
    let option_level = escape_with(text, |c| matches!(c, '\\' | '\'' | ':') || c.is_whitespace());
    escape_with(&option_level, |c| {
        matches!(c, '\\' | '\'' | ',' | ';' | '[' | ']') || c.is_whitespace()
    })
}

fn escape_with(text: &str, special: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        if special(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the `-vf` filtergraph: scale to the output size, then burn in the
/// caption centered near the bottom over a translucent box.
pub fn filter_graph(settings: &CompositorSettings, caption: &str) -> String {
    format!(
        "scale={w}:{h},drawtext=fontfile={font}:text={text}:expansion=none:fontcolor=white:fontsize={size}:x=(w-text_w)/2:y=h-text_h-80:box=1:boxcolor=0x000000AA:boxborderw=20",
        w = settings.width,
        h = settings.height,
        font = escape_caption(&settings.font_file),
        text = escape_caption(caption),
        size = settings.font_size,
    )
}

/// Full encoder argument list for `job`
pub fn encoder_args(settings: &CompositorSettings, job: &RenderJob) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y", "-loop", "1", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    args.push(job.image.display().to_string());
    args.push("-i".to_string());
    args.push(job.audio.display().to_string());
    args.push("-vf".to_string());
    args.push(filter_graph(settings, &job.caption));

    args.extend(
        [
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            settings.preset.clone(),
            "-crf".to_string(),
            settings.crf.to_string(),
            "-r".to_string(),
            settings.fps.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            settings.audio_bitrate.clone(),
            "-shortest".to_string(),
        ]
        .into_iter(),
    );

    args.push(job.output.display().to_string());
    args
}

/// Runs the external encoder with bounded concurrency and a hard timeout
#[derive(Debug, Clone)]
pub struct Compositor {
    settings: CompositorSettings,
    slots: Arc<Semaphore>,
}

impl Compositor {
    pub fn new(settings: CompositorSettings) -> Self {
        let slots = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self { settings, slots }
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Encodes that may start right now
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stop admitting encodes; queued and future renders fail with `Closed`
    pub fn close(&self) {
        self.slots.close();
    }

    pub async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        if self.slots.available_permits() == 0 {
            debug!("All encode slots busy, waiting for {}", job.output.display());
        }
        let _permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RenderError::Closed)?;

        let args = encoder_args(&self.settings, job);
        debug!("Running {} {:?}", self.settings.ffmpeg_path, args);

        let child = Command::new(&self.settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.settings.ffmpeg_path.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.settings.timeout, child.wait_with_output())
            .await
        {
            Ok(result) => result.map_err(|source| RenderError::Spawn {
                program: self.settings.ffmpeg_path.clone(),
                source,
            })?,
            Err(_) => {
                warn!(
                    "Encoder exceeded {}s for {}, killed",
                    self.settings.timeout.as_secs(),
                    job.output.display()
                );
                return Err(RenderError::TimedOut {
                    limit: self.settings.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status,
                diagnostics: diagnostics_tail(&output.stderr),
            });
        }

        match tokio::fs::metadata(&job.output).await {
            Ok(meta) if meta.len() > 0 => {
                info!("Rendered {} ({} bytes)", job.output.display(), meta.len());
                Ok(())
            }
            _ => Err(RenderError::MissingOutput(job.output.clone())),
        }
    }
}

fn diagnostics_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
