use crate::config::LimitsConfig;
use crate::pipeline::RenderPipeline;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Render pipeline shared by all routes
    pub pipeline: Arc<RenderPipeline>,

    /// Request body limits
    pub limits: LimitsConfig,
}

impl AppState {
    pub fn new(pipeline: RenderPipeline, limits: LimitsConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limits,
        }
    }
}
