pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod pipeline;
pub mod upload;

pub use config::Config;
pub use error::PipelineError;
pub use http::{create_router, AppState};
pub use media::{Compositor, CompositorSettings, Fetcher, RenderJob, WorkDir};
pub use pipeline::{AudioSource, RenderPipeline, RenderRequest, Stage};
pub use upload::{HttpFileHost, UploadResult, VideoHost};
