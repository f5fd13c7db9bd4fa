//! Publishing rendered videos to a remote file host
//!
//! - `VideoHost` - trait seam for hosting providers
//! - `HttpFileHost` - multipart upload to a GoFile-compatible endpoint
//! - `extract_link` - tolerant lookup of the public link in host responses

mod host;
mod link;

pub use host::{HttpFileHost, UploadError, UploadResult, VideoHost};
pub use link::extract_link;
