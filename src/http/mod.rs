//! HTTP API
//!
//! - GET / - Service status
//! - GET /health - Health check
//! - POST /render - Render from audio + image URLs (JSON)
//! - POST /render-upload, POST /upload - Render from an uploaded audio file (multipart)

mod handlers;
mod request_id;
mod routes;
mod state;

pub use handlers::{ErrorResponse, RenderBody, RenderResponse, StatusResponse};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use routes::create_router;
pub use state::AppState;
